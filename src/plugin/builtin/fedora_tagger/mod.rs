//! Fedora Tagger Plugin
//!
//! Ratings service for Fedora packages. The full ratings dump is downloaded
//! at most every three months and cached on disk; refine looks ratings up by
//! package name and set-rating submits the user's rating back to the service.

mod cache;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::builtin;
use crate::core::cancel::CancellationToken;
use crate::core::retry::{retry_async, RetryPolicy};
use crate::core::sync::{read_recover, write_recover};
use crate::core::version::{api_major, get_api_version};
use crate::plugin::args::PluginConfig;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::{AppManager, Plugin, Refiner};
use crate::plugin::types::{AppAction, PluginInfo};
use crate::record::api::{App, RatingKind, RefineFlags, RATING_UNSET};

use cache::{parse_dump, Rating, RatingsCache};

pub const PLUGIN_NAME: &str = "fedora-tagger";

const DEFAULT_SERVER: &str = "https://apps.fedoraproject.org/tagger";
const DEFAULT_OS_RELEASE: &str = "/etc/os-release";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const ACTIONS: &[AppAction] = &[AppAction::SetRating];

builtin!(|| Box::new(FedoraTaggerPlugin::new()));

pub struct FedoraTaggerPlugin {
    server: String,
    cache_path: PathBuf,
    retry: RetryPolicy,
    client: Option<reqwest::Client>,
    ratings: RwLock<BTreeMap<String, Rating>>,
    /// Set once a load has been attempted; a failed download is not retried per refine
    load_attempted: Mutex<bool>,
}

impl Default for FedoraTaggerPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl FedoraTaggerPlugin {
    pub fn new() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            cache_path: Self::default_cache_path(),
            retry: RetryPolicy::default(),
            client: None,
            ratings: RwLock::new(BTreeMap::new()),
            load_attempted: Mutex::new(false),
        }
    }

    pub fn default_cache_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("softcenter")
            .join("fedora-tagger.json")
    }

    /// `ID=` value from an os-release file
    fn distro_id(os_release: &str) -> Option<String> {
        os_release.lines().find_map(|line| {
            line.strip_prefix("ID=")
                .map(|id| id.trim().trim_matches('"').to_string())
        })
    }

    async fn check_distro(config: &PluginConfig) -> PluginResult<()> {
        let distro = match config.get_optional_string("distro_id") {
            Some(id) => Some(id),
            None => {
                let path = config.get_path("os_release", PathBuf::from(DEFAULT_OS_RELEASE));
                tokio::fs::read_to_string(&path)
                    .await
                    .ok()
                    .and_then(|contents| Self::distro_id(&contents))
            }
        };
        match distro.as_deref() {
            Some("fedora") => Ok(()),
            other => Err(PluginError::Disabled {
                plugin_name: PLUGIN_NAME.to_string(),
                reason: format!("not running on Fedora (distribution: {})", other.unwrap_or("unknown")),
            }),
        }
    }

    fn client(&self) -> PluginResult<&reqwest::Client> {
        self.client.as_ref().ok_or_else(|| PluginError::SetupFailed {
            plugin_name: PLUGIN_NAME.to_string(),
            cause: "HTTP client not initialized".to_string(),
        })
    }

    fn transport_error(operation: &str, error: reqwest::Error) -> PluginError {
        PluginError::TransportFailed {
            plugin_name: PLUGIN_NAME.to_string(),
            operation: operation.to_string(),
            cause: if error.is_timeout() {
                format!("timed out after {:?}", REQUEST_TIMEOUT)
            } else {
                error.to_string()
            },
        }
    }

    async fn fetch_dump(&self) -> PluginResult<String> {
        let url = format!("{}/api/v1/rating/dump/", self.server);
        log::debug!("Downloading ratings from {}", url);
        let response = self
            .client()?
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::transport_error("download", e))?;
        response
            .text()
            .await
            .map_err(|e| Self::transport_error("download", e))
    }

    async fn download(&self) -> PluginResult<RatingsCache> {
        let body = retry_async(
            "fedora-tagger download",
            self.retry.clone(),
            PluginError::is_transient,
            || self.fetch_dump(),
        )
        .await?;
        let cache = RatingsCache::new(parse_dump(&body)?);
        if let Err(e) = cache.save(&self.cache_path).await {
            log::warn!("Could not save ratings cache: {}", e);
        }
        Ok(cache)
    }

    /// Use the on-disk cache if it is fresh, otherwise download a new dump
    ///
    /// A corrupt cache file is removed and replaced.
    async fn load(&self) -> PluginResult<()> {
        let now = chrono::Utc::now().timestamp();
        let cached = match RatingsCache::load(&self.cache_path).await {
            Ok(cached) => cached,
            Err(e @ PluginError::Corrupt { .. }) => {
                log::warn!("Discarding ratings cache: {}", e);
                if let Err(e) = tokio::fs::remove_file(&self.cache_path).await {
                    log::debug!("Could not remove {}: {}", self.cache_path.display(), e);
                }
                None
            }
            Err(e) => return Err(e),
        };

        let cache = match cached {
            Some(cache) if !cache.is_stale(now) => cache,
            _ => self.download().await?,
        };
        log::debug!("Loaded {} ratings", cache.ratings.len());
        *write_recover(self.ratings.write(), "fedora-tagger ratings") = cache.ratings;
        Ok(())
    }

    async fn ensure_loaded(&self) {
        let mut attempted = self.load_attempted.lock().await;
        if *attempted {
            return;
        }
        *attempted = true;
        if let Err(e) = self.load().await {
            log::warn!("Ratings unavailable: {}", e);
        }
    }

    fn lookup(&self, pkgname: &str) -> Option<Rating> {
        read_recover(self.ratings.read(), "fedora-tagger ratings")
            .get(pkgname)
            .cloned()
    }

    async fn submit_rating(&self, pkgname: &str, rating: i32) -> PluginResult<()> {
        let url = format!("{}/api/v1/rating/{}/{}/", self.server, pkgname, rating);
        let rating = rating.to_string();
        let response = self
            .client()?
            .put(&url)
            .form(&[("pkgname", pkgname), ("rating", rating.as_str())])
            .send()
            .await
            .map_err(|e| Self::transport_error("set-rating", e))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PluginError::ExecutionError {
                plugin_name: PLUGIN_NAME.to_string(),
                operation: "set-rating".to_string(),
                cause: format!("server returned {}: {}", status, body),
            });
        }
        log::debug!("Submitted rating {} for {}", rating, pkgname);
        Ok(())
    }
}

#[async_trait]
impl Plugin for FedoraTaggerPlugin {
    fn plugin_info(&self) -> PluginInfo {
        PluginInfo::builtin(PLUGIN_NAME, 1.2, &[], "Package ratings from Fedora Tagger")
    }

    fn is_compatible(&self, system_api_version: u32) -> bool {
        api_major(system_api_version) == api_major(get_api_version())
    }

    async fn initialize(&mut self, config: &PluginConfig) -> PluginResult<()> {
        Self::check_distro(config).await?;

        self.server = config
            .get_string("server", DEFAULT_SERVER)
            .trim_end_matches('/')
            .to_string();
        self.cache_path = config.get_path("cache", Self::default_cache_path());
        let attempts = config.get_integer("retries", self.retry.max_attempts as i64);
        self.retry.max_attempts = attempts.max(1) as usize;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("softcenter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PluginError::SetupFailed {
                plugin_name: PLUGIN_NAME.to_string(),
                cause: e.to_string(),
            })?;
        self.client = Some(client);

        self.ensure_loaded().await;
        Ok(())
    }

    async fn destroy(&mut self) -> PluginResult<()> {
        self.client = None;
        Ok(())
    }

    fn as_refiner(&self) -> Option<&dyn Refiner> {
        Some(self)
    }

    fn as_app_manager(&self) -> Option<&dyn AppManager> {
        Some(self)
    }
}

#[async_trait]
impl Refiner for FedoraTaggerPlugin {
    async fn refine(
        &self,
        apps: &[Arc<App>],
        flags: RefineFlags,
        _cancel: &CancellationToken,
    ) -> PluginResult<()> {
        if !flags.contains(RefineFlags::REQUIRE_RATING) {
            return Ok(());
        }
        self.ensure_loaded().await;

        for app in apps {
            if app.rating() != RATING_UNSET {
                continue;
            }
            for pkgname in app.sources() {
                if let Some(rating) = self.lookup(&pkgname) {
                    log::debug!(
                        "Setting rating on {} to {}% [{}]",
                        pkgname,
                        rating.rating,
                        rating.confidence
                    );
                    app.set_rating(rating.rating);
                    app.set_rating_confidence(rating.confidence);
                    app.set_rating_kind(RatingKind::System);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AppManager for FedoraTaggerPlugin {
    fn manager_name(&self) -> &str {
        PLUGIN_NAME
    }

    fn supported_actions(&self) -> &[AppAction] {
        ACTIONS
    }

    async fn app_set_rating(&self, app: &Arc<App>, cancel: &CancellationToken) -> PluginResult<()> {
        let rating = app.rating();
        if rating == RATING_UNSET {
            return Err(PluginError::not_found(format!("{} has no rating to submit", app.id())));
        }
        for pkgname in app.sources() {
            cancel
                .run_until_cancelled(self.submit_rating(&pkgname, rating))
                .await
                .ok_or(PluginError::Cancelled)??;
        }
        Ok(())
    }
}
