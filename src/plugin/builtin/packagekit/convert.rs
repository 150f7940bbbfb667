//! Applying package data to application records

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::record::api::{App, AppKind, AppState, Quality, UpdateSeverity, UrlKind, SIZE_MISSING, SIZE_UNKNOWN};

use super::backend::{same_package, Package, PackageInfo, UpdateDetail};
use super::PLUGIN_NAME;

/// Metadata key marking a record built from a local package file
pub const LOCAL_FILENAME_KEY: &str = "packagekit::local-filename";

/// Package descriptions wrap at fixed width; rejoin lines and keep paragraphs
pub fn format_description(text: &str) -> String {
    text.replace('\n', " ").replace(".  ", ".\n\n")
}

pub fn severity_from_str(value: &str) -> UpdateSeverity {
    match value {
        "normal" | "enhancement" | "bugfix" | "low" => UpdateSeverity::Normal,
        "important" => UpdateSeverity::Important,
        "security" => UpdateSeverity::Security,
        other => {
            log::warn!("Unhandled update severity '{}'", other);
            UpdateSeverity::Unknown
        }
    }
}

fn origin_for(repos: &BTreeMap<String, String>, repo: &str) -> String {
    repos.get(repo).cloned().unwrap_or_else(|| repo.to_string())
}

/// Copy what a package says about itself onto `app`
pub fn set_metadata_from_package(app: &App, package: &Package, repos: &BTreeMap<String, String>) {
    app.set_management_plugin(PLUGIN_NAME);
    app.add_source(package.name.clone());
    app.add_source_id(package.package_id());
    match package.info {
        PackageInfo::Installed => {
            if !package.repo.is_empty() {
                app.set_origin(origin_for(repos, &package.repo));
            }
        }
        PackageInfo::Unavailable => {
            app.set_origin(origin_for(repos, &package.repo));
            app.set_state(AppState::Unavailable);
            app.set_size(SIZE_MISSING);
        }
        PackageInfo::Available => {}
    }
    if app.version().is_none() {
        app.set_version(package.version.clone());
    }
    app.set_name(Quality::Lowest, package.name.clone());
    app.set_summary(Quality::Lowest, package.summary.clone());
}

/// Match resolved packages against the record's sources and settle its state
///
/// All sources installed makes the record installed; every source found
/// makes it available; more packages than sources means an update is
/// pending; fewer means something is missing.
pub fn apply_resolved(app: &App, packages: &[Package], repos: &BTreeMap<String, String>) {
    let sources = app.sources();
    let mut installed = 0;
    let mut available = 0;
    for source in &sources {
        for package in packages.iter().filter(|p| &p.name == source) {
            set_metadata_from_package(app, package, repos);
            match package.info {
                PackageInfo::Installed => installed += 1,
                PackageInfo::Available | PackageInfo::Unavailable => available += 1,
            }
        }
    }

    let found = installed + available;
    if installed == sources.len() && available == 0 {
        if app.state() == AppState::Unknown {
            app.set_state(AppState::Installed);
        }
    } else if found == sources.len() {
        if app.state() == AppState::Unknown {
            app.set_state(AppState::Available);
        }
    } else if found > sources.len() {
        app.set_state(AppState::Unknown);
        app.set_state(AppState::Updatable);
    } else {
        log::debug!(
            "Failed to find all packages for {} ({} of {})",
            app.id(),
            found,
            sources.len()
        );
        app.set_kind(AppKind::Unknown);
        app.set_state(AppState::Unavailable);
    }
}

/// Licence, homepage, size and description from package details
pub fn apply_details(app: &App, details: &[Package]) {
    let mut size = 0;
    for package_id in app.source_ids() {
        let Some(package) = details
            .iter()
            .find(|d| same_package(&package_id, &d.package_id()))
        else {
            continue;
        };
        if let Some(license) = &package.license {
            app.set_licence(Quality::Lowest, license.clone());
        }
        if app.url(UrlKind::Homepage).is_none() {
            if let Some(url) = &package.url {
                app.set_url(UrlKind::Homepage, url.clone());
            }
        }
        size += package.size;
        if let Some(description) = &package.description {
            app.set_description(Quality::Lowest, format_description(description));
        }
        app.set_summary(Quality::Lowest, package.summary.clone());
    }
    if size > 0 && app.size() == SIZE_UNKNOWN {
        app.set_size(size);
    }
}

pub fn apply_update_detail(app: &App, details: &[UpdateDetail]) {
    let Some(package_id) = app.source_id_default() else {
        return;
    };
    if let Some(detail) = details
        .iter()
        .find(|d| same_package(&d.package_id, &package_id))
    {
        if let Some(text) = &detail.text {
            app.set_update_details(text.clone());
        }
        app.set_update_severity(severity_from_str(&detail.severity));
    }
}

/// Collapse search hits into records, one per package name
///
/// A name with an installed build hides its available duplicates.
pub fn packages_to_apps(packages: Vec<Package>, repos: &BTreeMap<String, String>) -> Vec<Arc<App>> {
    let installed: Vec<String> = packages
        .iter()
        .filter(|p| p.info == PackageInfo::Installed)
        .map(|p| p.name.clone())
        .collect();

    let mut apps: Vec<Arc<App>> = Vec::new();
    for package in packages {
        if package.info != PackageInfo::Installed && installed.contains(&package.name) {
            continue;
        }
        if apps.iter().any(|a| a.id() == package.name) {
            continue;
        }
        let app = App::with_kind(package.name.clone(), AppKind::Package);
        set_metadata_from_package(&app, &package, repos);
        match package.info {
            PackageInfo::Installed => app.set_state(AppState::Installed),
            PackageInfo::Available => app.set_state(AppState::Available),
            PackageInfo::Unavailable => false,
        };
        apps.push(app);
    }
    apps
}

/// Sort key favouring name matches over summary matches
pub fn search_sort_key(package: &Package, terms: &[String]) -> String {
    let name = package.name.to_lowercase();
    let score = if terms.len() == 1 && name == terms[0] {
        100
    } else if terms.iter().all(|t| name.starts_with(t.as_str())) {
        80
    } else if terms.iter().all(|t| name.contains(t.as_str())) {
        60
    } else {
        40
    };
    format!("{:03}", score)
}
