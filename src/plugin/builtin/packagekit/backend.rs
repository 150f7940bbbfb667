//! Package backends
//!
//! The plugin talks to the package manager through [`PackageBackend`]. The
//! shipped [`JsonPackageBackend`] serves a package database file; its layout
//! is:
//!
//! ```json
//! {
//!   "repos": { "fedora": "Fedora 41 - x86_64" },
//!   "packages": [
//!     { "name": "gimp", "version": "2.10.38-1", "arch": "x86_64",
//!       "repo": "fedora", "info": "installed", "summary": "GNU Image Manipulation Program",
//!       "update": { "version": "2.10.38-2", "severity": "security", "text": "Fixes CVE-2025-1" } }
//!   ],
//!   "local_files": [ { "path": "/tmp/foo.rpm", "name": "foo", "version": "1.0", "info": "available" } ],
//!   "distro_upgrades": [ { "id": "fedora-42", "name": "Fedora 42", "version": "42" } ]
//! }
//! ```
//!
//! Package ids use the `name;version;arch;data` form, where `data` is
//! `installed:<repo>` for installed packages and the repo id otherwise.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::sync::{read_recover, write_recover};
use crate::plugin::error::{PluginError, PluginResult};

use super::PLUGIN_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageInfo {
    Installed,
    Available,
    Unavailable,
}

/// A pending update for an installed package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageUpdate {
    pub version: String,
    /// normal, enhancement, bugfix, low, important or security
    #[serde(default)]
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default = "default_arch")]
    pub arch: String,
    #[serde(default)]
    pub repo: String,
    pub info: PackageInfo,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<PackageUpdate>,
    /// Files owned by the package, for installed-file lookups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

fn default_arch() -> String {
    "noarch".to_string()
}

impl Package {
    pub fn package_id(&self) -> String {
        let data = match self.info {
            PackageInfo::Installed => format!("installed:{}", self.repo),
            _ => self.repo.clone(),
        };
        format!("{};{};{};{}", self.name, self.version, self.arch, data)
    }

    /// The available package an update would install
    fn update_package(&self) -> Option<Package> {
        let update = self.update.as_ref()?;
        Some(Package {
            version: update.version.clone(),
            info: PackageInfo::Available,
            update: None,
            files: Vec::new(),
            ..self.clone()
        })
    }
}

/// A package file on local disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPackage {
    pub path: String,
    #[serde(flatten)]
    pub package: Package,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistroUpgrade {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// Update text and severity for one update package id
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDetail {
    pub package_id: String,
    pub severity: String,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageDatabase {
    /// repo id -> human readable name
    #[serde(default)]
    pub repos: BTreeMap<String, String>,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_files: Vec<LocalPackage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distro_upgrades: Vec<DistroUpgrade>,
}

impl PackageDatabase {
    fn update_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .packages
            .iter()
            .filter(|p| p.info == PackageInfo::Installed)
            .filter_map(Package::update_package)
            .map(|p| p.package_id())
            .collect();
        ids.sort();
        ids
    }
}

/// Split a package id into name, version, arch and data
pub fn split_package_id(package_id: &str) -> Option<(&str, &str, &str, &str)> {
    let mut parts = package_id.splitn(4, ';');
    let name = parts.next()?;
    let version = parts.next()?;
    let arch = parts.next()?;
    let data = parts.next()?;
    Some((name, version, arch, data))
}

/// Whether two ids name the same build, ignoring where it came from
pub fn same_package(id1: &str, id2: &str) -> bool {
    match (split_package_id(id1), split_package_id(id2)) {
        (Some((n1, v1, a1, _)), Some((n2, v2, a2, _))) => n1 == n2 && v1 == v2 && a1 == a2,
        _ => false,
    }
}

/// Compare version strings segment by segment, numerically where possible
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.split(|c: char| c == '.' || c == '-' || c == '_' || c == '~')
            .map(str::to_string)
            .collect()
    };
    let (left, right) = (split(a), split(b));
    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

/// Access to the system package manager
#[async_trait]
pub trait PackageBackend: Send + Sync {
    /// Installed packages and the newest available build for each name
    async fn resolve(&self, names: &[String]) -> PluginResult<Vec<Package>>;

    /// Full package data for the given ids
    async fn details(&self, package_ids: &[String]) -> PluginResult<Vec<Package>>;

    async fn update_details(&self, package_ids: &[String]) -> PluginResult<Vec<UpdateDetail>>;

    /// Packages whose name or summary contain every term
    async fn search_names(&self, terms: &[String]) -> PluginResult<Vec<Package>>;

    /// Installed packages owning `filename`
    async fn search_files(&self, filename: &str) -> PluginResult<Vec<Package>>;

    /// Available packages that would update an installed one
    async fn get_updates(&self) -> PluginResult<Vec<Package>>;

    async fn get_distro_upgrades(&self) -> PluginResult<Vec<DistroUpgrade>>;

    /// repo id -> repo name
    async fn repo_list(&self) -> PluginResult<BTreeMap<String, String>>;

    /// Reload metadata older than `cache_age`
    ///
    /// Returns true when the repo list or the set of updates changed.
    async fn refresh(&self, cache_age: Duration) -> PluginResult<bool>;

    async fn install(&self, package_ids: &[String]) -> PluginResult<()>;

    async fn remove(&self, package_ids: &[String]) -> PluginResult<()>;

    /// The package contained in a local file, if the backend knows it
    async fn local_file(&self, path: &Path) -> PluginResult<Option<Package>>;
}

struct Snapshot {
    db: PackageDatabase,
    mtime: Option<SystemTime>,
    loaded_at: Instant,
}

/// Backend serving a JSON package database
///
/// Reads and writes go through `tokio::fs`. Changes are made on a copy of the
/// database, which replaces the served one only once it is on disk.
pub struct JsonPackageBackend {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
    /// Held across every load-modify-save cycle
    transaction: Mutex<()>,
}

impl JsonPackageBackend {
    pub async fn open(path: &Path) -> PluginResult<Self> {
        let (db, mtime) = Self::load(path).await?;
        log::debug!(
            "Loaded {} packages from {}",
            db.packages.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            snapshot: RwLock::new(Snapshot {
                db,
                mtime,
                loaded_at: Instant::now(),
            }),
            transaction: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn modified(path: &Path) -> Option<SystemTime> {
        tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .ok()
    }

    async fn load(path: &Path) -> PluginResult<(PackageDatabase, Option<SystemTime>)> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| PluginError::ExecutionError {
                    plugin_name: PLUGIN_NAME.to_string(),
                    operation: "load".to_string(),
                    cause: format!("cannot read {}: {}", path.display(), e),
                })?;
        let db: PackageDatabase =
            serde_json::from_str(&contents).map_err(|e| PluginError::Corrupt {
                plugin_name: PLUGIN_NAME.to_string(),
                cause: format!("{}: {}", path.display(), e),
            })?;
        Ok((db, Self::modified(path).await))
    }

    /// Write `db` to disk, then make it the served database
    async fn commit(&self, db: PackageDatabase) -> PluginResult<()> {
        let contents =
            serde_json::to_string_pretty(&db).map_err(|e| PluginError::ExecutionError {
                plugin_name: PLUGIN_NAME.to_string(),
                operation: "save".to_string(),
                cause: e.to_string(),
            })?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| PluginError::ExecutionError {
                plugin_name: PLUGIN_NAME.to_string(),
                operation: "save".to_string(),
                cause: format!("cannot write {}: {}", self.path.display(), e),
            })?;
        let mtime = Self::modified(&self.path).await;

        let mut snapshot = write_recover(self.snapshot.write(), "package database");
        snapshot.db = db;
        snapshot.mtime = mtime;
        snapshot.loaded_at = Instant::now();
        Ok(())
    }

    fn working_copy(&self) -> PackageDatabase {
        read_recover(self.snapshot.read(), "package database").db.clone()
    }

    fn install_into(db: &mut PackageDatabase, package_ids: &[String]) -> PluginResult<()> {
        for package_id in package_ids {
            let found = Self::find_package(db, package_id).cloned();
            let Some(mut package) = found else {
                Self::apply_update(db, package_id)?;
                continue;
            };
            db.packages.retain(|p| {
                !(p.name == package.name
                    && p.arch == package.arch
                    && p.info == PackageInfo::Installed)
            });
            db.local_files
                .retain(|local| !same_package(&local.package.package_id(), package_id));
            package.info = PackageInfo::Installed;
            log::info!("Installing package {}", package.package_id());
            db.packages.push(package);
        }
        Ok(())
    }

    fn remove_from(db: &mut PackageDatabase, package_ids: &[String]) -> PluginResult<()> {
        for package_id in package_ids {
            let package = db.packages.iter_mut().find(|p| {
                p.info == PackageInfo::Installed && same_package(&p.package_id(), package_id)
            });
            let Some(package) = package else {
                return Err(PluginError::not_found(format!(
                    "package {} is not installed",
                    package_id
                )));
            };
            package.update = None;
            package.info = if package.repo.is_empty() {
                PackageInfo::Unavailable
            } else {
                PackageInfo::Available
            };
            log::info!("Removing package {}", package_id);
        }
        Ok(())
    }

    fn find_package<'a>(db: &'a PackageDatabase, package_id: &str) -> Option<&'a Package> {
        db.packages
            .iter()
            .chain(db.local_files.iter().map(|local| &local.package))
            .find(|p| same_package(&p.package_id(), package_id))
    }

    /// Install the pending update named by `package_id` over its installed package
    fn apply_update(db: &mut PackageDatabase, package_id: &str) -> PluginResult<()> {
        let installed = db.packages.iter_mut().find(|p| {
            p.info == PackageInfo::Installed
                && p.update_package()
                    .is_some_and(|u| same_package(&u.package_id(), package_id))
        });
        match installed.and_then(|p| p.update.take().map(|u| (p, u))) {
            Some((package, update)) => {
                log::info!("Updated package {} to {}", package.name, update.version);
                package.version = update.version;
                Ok(())
            }
            None => Err(PluginError::not_found(format!("no package {}", package_id))),
        }
    }
}

#[async_trait]
impl PackageBackend for JsonPackageBackend {
    async fn resolve(&self, names: &[String]) -> PluginResult<Vec<Package>> {
        let snapshot = read_recover(self.snapshot.read(), "package database");
        let mut resolved = Vec::new();
        for name in names {
            let matching: Vec<&Package> =
                snapshot.db.packages.iter().filter(|p| &p.name == name).collect();

            let installed: Vec<&Package> = matching
                .iter()
                .copied()
                .filter(|p| p.info == PackageInfo::Installed)
                .collect();
            let newest_available = matching
                .iter()
                .copied()
                .filter(|p| p.info != PackageInfo::Installed)
                .max_by(|a, b| compare_versions(&a.version, &b.version));

            for package in &installed {
                resolved.push((*package).clone());
                if let Some(update) = package.update_package() {
                    resolved.push(update);
                }
            }
            if let Some(available) = newest_available {
                // an installed build at the same or a newer version shadows it
                let shadowed = installed.iter().any(|i| {
                    compare_versions(&i.version, &available.version) != Ordering::Less
                        || i.update.is_some()
                });
                if !shadowed {
                    resolved.push(available.clone());
                }
            }
        }
        Ok(resolved)
    }

    async fn details(&self, package_ids: &[String]) -> PluginResult<Vec<Package>> {
        let snapshot = read_recover(self.snapshot.read(), "package database");
        Ok(package_ids
            .iter()
            .filter_map(|id| Self::find_package(&snapshot.db, id))
            .cloned()
            .collect())
    }

    async fn update_details(&self, package_ids: &[String]) -> PluginResult<Vec<UpdateDetail>> {
        let snapshot = read_recover(self.snapshot.read(), "package database");
        let mut details = Vec::new();
        for package in snapshot
            .db
            .packages
            .iter()
            .filter(|p| p.info == PackageInfo::Installed)
        {
            let (Some(update), Some(update_package)) =
                (package.update.as_ref(), package.update_package())
            else {
                continue;
            };
            let update_id = update_package.package_id();
            if package_ids.iter().any(|id| same_package(id, &update_id)) {
                details.push(UpdateDetail {
                    package_id: update_id,
                    severity: update.severity.clone(),
                    text: update.text.clone(),
                });
            }
        }
        Ok(details)
    }

    async fn search_names(&self, terms: &[String]) -> PluginResult<Vec<Package>> {
        let terms: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
        let snapshot = read_recover(self.snapshot.read(), "package database");
        Ok(snapshot
            .db
            .packages
            .iter()
            .filter(|p| {
                let name = p.name.to_lowercase();
                let summary = p.summary.to_lowercase();
                terms
                    .iter()
                    .all(|term| name.contains(term) || summary.contains(term))
            })
            .cloned()
            .collect())
    }

    async fn search_files(&self, filename: &str) -> PluginResult<Vec<Package>> {
        let snapshot = read_recover(self.snapshot.read(), "package database");
        Ok(snapshot
            .db
            .packages
            .iter()
            .filter(|p| p.info == PackageInfo::Installed)
            .filter(|p| p.files.iter().any(|f| f == filename))
            .cloned()
            .collect())
    }

    async fn get_updates(&self) -> PluginResult<Vec<Package>> {
        let snapshot = read_recover(self.snapshot.read(), "package database");
        Ok(snapshot
            .db
            .packages
            .iter()
            .filter(|p| p.info == PackageInfo::Installed)
            .filter_map(Package::update_package)
            .collect())
    }

    async fn get_distro_upgrades(&self) -> PluginResult<Vec<DistroUpgrade>> {
        let snapshot = read_recover(self.snapshot.read(), "package database");
        Ok(snapshot.db.distro_upgrades.clone())
    }

    async fn repo_list(&self) -> PluginResult<BTreeMap<String, String>> {
        let snapshot = read_recover(self.snapshot.read(), "package database");
        Ok(snapshot.db.repos.clone())
    }

    async fn refresh(&self, cache_age: Duration) -> PluginResult<bool> {
        let _transaction = self.transaction.lock().await;
        let on_disk = Self::modified(&self.path).await;
        {
            let snapshot = read_recover(self.snapshot.read(), "package database");
            let stale = snapshot.loaded_at.elapsed() >= cache_age;
            if !stale && on_disk == snapshot.mtime {
                log::debug!("Package database is fresh, not reloading");
                return Ok(false);
            }
        }

        let (db, mtime) = Self::load(&self.path).await?;
        let mut snapshot = write_recover(self.snapshot.write(), "package database");
        let changed =
            db.repos != snapshot.db.repos || db.update_ids() != snapshot.db.update_ids();
        snapshot.db = db;
        snapshot.mtime = mtime;
        snapshot.loaded_at = Instant::now();
        Ok(changed)
    }

    async fn install(&self, package_ids: &[String]) -> PluginResult<()> {
        let _transaction = self.transaction.lock().await;
        let mut db = self.working_copy();
        Self::install_into(&mut db, package_ids)?;
        self.commit(db).await
    }

    async fn remove(&self, package_ids: &[String]) -> PluginResult<()> {
        let _transaction = self.transaction.lock().await;
        let mut db = self.working_copy();
        Self::remove_from(&mut db, package_ids)?;
        self.commit(db).await
    }

    async fn local_file(&self, path: &Path) -> PluginResult<Option<Package>> {
        let snapshot = read_recover(self.snapshot.read(), "package database");
        Ok(snapshot
            .db
            .local_files
            .iter()
            .find(|local| Path::new(&local.path) == path)
            .map(|local| local.package.clone()))
    }
}
