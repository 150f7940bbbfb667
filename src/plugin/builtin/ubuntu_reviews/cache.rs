//! Review statistics and review parsing for the ubuntu-reviews plugin
//!
//! The service publishes one statistics entry per package. The star averages
//! are converted to percentages and kept on disk as JSON together with the
//! time they were fetched.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plugin::error::{PluginError, PluginResult};
use crate::record::api::Review;

use super::PLUGIN_NAME;

/// Refetch the statistics after three months
pub const MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 7 * 4 * 3);

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    /// 0-100
    pub rating: i32,
    pub review_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsCache {
    /// Unix time the statistics were downloaded
    pub mtime: i64,
    pub stats: BTreeMap<String, ReviewStats>,
}

impl StatsCache {
    pub fn new(stats: BTreeMap<String, ReviewStats>) -> Self {
        Self {
            mtime: chrono::Utc::now().timestamp(),
            stats,
        }
    }

    pub fn is_stale(&self, now: i64) -> bool {
        now.saturating_sub(self.mtime) > MAX_AGE.as_secs() as i64
    }

    /// Read the cache; `Ok(None)` when there is none yet
    pub async fn load(path: &Path) -> PluginResult<Option<Self>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PluginError::ExecutionError {
                    plugin_name: PLUGIN_NAME.to_string(),
                    operation: "load cache".to_string(),
                    cause: format!("{}: {}", path.display(), e),
                })
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| PluginError::Corrupt {
                plugin_name: PLUGIN_NAME.to_string(),
                cause: format!("{}: {}", path.display(), e),
            })
    }

    pub async fn save(&self, path: &Path) -> PluginResult<()> {
        let write = async {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let contents = serde_json::to_string(self).map_err(std::io::Error::other)?;
            tokio::fs::write(path, contents).await
        };
        write.await.map_err(|e| PluginError::ExecutionError {
            plugin_name: PLUGIN_NAME.to_string(),
            operation: "save cache".to_string(),
            cause: format!("{}: {}", path.display(), e),
        })
    }
}

/// Stars (1-5) to a percentage, so one star is 10% and five stars 90%
pub fn stars_to_percent(stars: f64) -> i32 {
    (20.0 * stars - 10.0).round().clamp(0.0, 100.0) as i32
}

/// The service sends numbers both bare and quoted
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Deserialize)]
struct StatsEntry {
    package_name: Option<String>,
    #[serde(default)]
    ratings_average: Value,
    #[serde(default)]
    ratings_total: Value,
}

/// Parse the `review-stats` array
///
/// Entries without a package name or average are logged and skipped. A
/// payload that is not an array is corrupt.
pub fn parse_stats(text: &str) -> PluginResult<BTreeMap<String, ReviewStats>> {
    let entries: Vec<StatsEntry> =
        serde_json::from_str(text).map_err(|e| PluginError::Corrupt {
            plugin_name: PLUGIN_NAME.to_string(),
            cause: format!("review statistics: {}", e),
        })?;

    let mut stats = BTreeMap::new();
    for entry in entries {
        let (Some(name), Some(average)) = (entry.package_name, number(&entry.ratings_average))
        else {
            log::warn!("Skipping review statistics entry without package_name or ratings_average");
            continue;
        };
        let review_count = number(&entry.ratings_total).unwrap_or(0.0).max(0.0) as u64;
        stats.insert(
            name,
            ReviewStats {
                rating: stars_to_percent(average),
                review_count,
            },
        );
    }
    Ok(stats)
}

#[derive(Deserialize)]
struct ReviewEntry {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    review_text: String,
    #[serde(default)]
    reviewer_displayname: Option<String>,
    #[serde(default)]
    reviewer_username: Option<String>,
    #[serde(default)]
    rating: Value,
    #[serde(default)]
    date_created: Option<String>,
}

/// Parse the reviews listed for one package
pub fn parse_reviews(text: &str) -> PluginResult<Vec<Review>> {
    let entries: Vec<ReviewEntry> =
        serde_json::from_str(text).map_err(|e| PluginError::Corrupt {
            plugin_name: PLUGIN_NAME.to_string(),
            cause: format!("reviews: {}", e),
        })?;

    Ok(entries
        .into_iter()
        .map(|entry| Review {
            summary: entry.summary,
            text: entry.review_text,
            author: entry
                .reviewer_displayname
                .or(entry.reviewer_username)
                .unwrap_or_default(),
            rating: number(&entry.rating).map(stars_to_percent).unwrap_or(-1),
            date: entry
                .date_created
                .and_then(|d| NaiveDateTime::parse_from_str(&d, DATE_FORMAT).ok())
                .map(|d| d.and_utc().timestamp())
                .unwrap_or(0),
        })
        .collect())
}
