//! Ubuntu Reviews Plugin
//!
//! Ratings and reviews from the Ubuntu reviews service. Per-package review
//! statistics are downloaded at most every three months and cached on disk.
//! Reviews themselves are fetched on demand for records that ask for them.

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
use crate::plugin::traits::{Plugin, Refiner};
use crate::plugin::types::PluginInfo;
use crate::record::api::{App, RatingKind, RefineFlags, Review, RATING_UNSET};

use cache::{parse_reviews, parse_stats, ReviewStats, StatsCache};

pub const PLUGIN_NAME: &str = "ubuntu-reviews";

const DEFAULT_SERVER: &str = "https://reviews.ubuntu.com/reviews";
const DEFAULT_OS_RELEASE: &str = "/etc/os-release";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

builtin!(|| Box::new(UbuntuReviewsPlugin::new()));

pub struct UbuntuReviewsPlugin {
    server: String,
    cache_path: PathBuf,
    retry: RetryPolicy,
    client: Option<reqwest::Client>,
    stats: RwLock<BTreeMap<String, ReviewStats>>,
    load_attempted: Mutex<bool>,
}

impl Default for UbuntuReviewsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl UbuntuReviewsPlugin {
    pub fn new() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            cache_path: Self::default_cache_path(),
            retry: RetryPolicy::default(),
            client: None,
            stats: RwLock::new(BTreeMap::new()),
            load_attempted: Mutex::new(false),
        }
    }

    pub fn default_cache_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("softcenter")
            .join("ubuntu-reviews.json")
    }

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
            Some("ubuntu") => Ok(()),
            other => Err(PluginError::Disabled {
                plugin_name: PLUGIN_NAME.to_string(),
                reason: format!("not running on Ubuntu (distribution: {})", other.unwrap_or("unknown")),
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

    async fn get(&self, operation: &str, url: &str) -> PluginResult<String> {
        log::debug!("Fetching {}", url);
        let response = self
            .client()?
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::transport_error(operation, e))?;
        response
            .text()
            .await
            .map_err(|e| Self::transport_error(operation, e))
    }

    async fn download(&self) -> PluginResult<StatsCache> {
        let url = format!("{}/api/1.0/review-stats/any/any/", self.server);
        let body = retry_async(
            "ubuntu-reviews download",
            self.retry.clone(),
            PluginError::is_transient,
            || self.get("download", &url),
        )
        .await?;
        let cache = StatsCache::new(parse_stats(&body)?);
        if let Err(e) = cache.save(&self.cache_path).await {
            log::warn!("Could not save review statistics cache: {}", e);
        }
        Ok(cache)
    }

    /// Use the on-disk cache if it is fresh, otherwise download new statistics
    async fn load(&self) -> PluginResult<()> {
        let now = chrono::Utc::now().timestamp();
        let cached = match StatsCache::load(&self.cache_path).await {
            Ok(cached) => cached,
            Err(e @ PluginError::Corrupt { .. }) => {
                log::warn!("Discarding review statistics cache: {}", e);
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
        log::debug!("Loaded review statistics for {} packages", cache.stats.len());
        *write_recover(self.stats.write(), "ubuntu-reviews stats") = cache.stats;
        Ok(())
    }

    async fn ensure_loaded(&self) {
        let mut attempted = self.load_attempted.lock().await;
        if *attempted {
            return;
        }
        *attempted = true;
        if let Err(e) = self.load().await {
            log::warn!("Review statistics unavailable: {}", e);
        }
    }

    fn lookup(&self, pkgname: &str) -> Option<ReviewStats> {
        read_recover(self.stats.read(), "ubuntu-reviews stats")
            .get(pkgname)
            .cloned()
    }

    async fn fetch_reviews(&self, pkgname: &str) -> PluginResult<Vec<Review>> {
        let url = format!(
            "{}/api/1.0/reviews/filter/any/any/any/any/{}/",
            self.server, pkgname
        );
        let body = self.get("reviews", &url).await?;
        parse_reviews(&body)
    }

    fn refine_rating(&self, app: &App) {
        if app.rating() != RATING_UNSET {
            return;
        }
        for pkgname in app.sources() {
            if let Some(stats) = self.lookup(&pkgname) {
                log::debug!("Setting rating on {} to {}%", pkgname, stats.rating);
                app.set_rating(stats.rating);
                app.set_rating_kind(RatingKind::System);
                return;
            }
        }
    }

    /// Failures are logged per package; a missing review list never fails the refine
    async fn refine_reviews(&self, app: &App, cancel: &CancellationToken) -> PluginResult<()> {
        if !app.reviews().is_empty() {
            return Ok(());
        }
        for pkgname in app.sources() {
            let fetched = cancel
                .run_until_cancelled(self.fetch_reviews(&pkgname))
                .await
                .ok_or(PluginError::Cancelled)?;
            match fetched {
                Ok(reviews) => {
                    for review in reviews {
                        app.add_review(review);
                    }
                }
                Err(e) => log::warn!("No reviews for {}: {}", pkgname, e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for UbuntuReviewsPlugin {
    fn plugin_info(&self) -> PluginInfo {
        PluginInfo::builtin(PLUGIN_NAME, 1.2, &[], "Ratings and reviews from Ubuntu Reviews")
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
}

#[async_trait]
impl Refiner for UbuntuReviewsPlugin {
    async fn refine(
        &self,
        apps: &[Arc<App>],
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let wants_rating = flags.contains(RefineFlags::REQUIRE_RATING);
        let wants_reviews = flags.contains(RefineFlags::REQUIRE_REVIEWS);
        if !wants_rating && !wants_reviews {
            return Ok(());
        }
        self.ensure_loaded().await;

        for app in apps {
            if wants_rating {
                self.refine_rating(app);
            }
            if wants_reviews {
                self.refine_reviews(app, cancel).await?;
            }
        }
        Ok(())
    }
}
