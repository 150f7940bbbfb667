//! Ratings cache for the fedora-tagger plugin
//!
//! The service publishes a tab-separated dump of every package rating. The
//! parsed dump is kept on disk as JSON together with the time it was fetched.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::plugin::error::{PluginError, PluginResult};

use super::PLUGIN_NAME;

/// Refetch the dump after three months
pub const MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 7 * 4 * 3);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// 0-100
    pub rating: i32,
    pub vote_count: f64,
    pub user_count: f64,
    /// 0-100, relative to the average vote count
    pub confidence: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingsCache {
    /// Unix time the dump was downloaded
    pub mtime: i64,
    pub ratings: BTreeMap<String, Rating>,
}

impl RatingsCache {
    pub fn new(ratings: BTreeMap<String, Rating>) -> Self {
        Self {
            mtime: chrono::Utc::now().timestamp(),
            ratings,
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

/// Parse `pkgname\trating\tvote_count\tuser_count` lines
///
/// Blank lines and `#` comments are skipped; malformed lines are logged and
/// skipped. An empty dump, or one without any votes, is an error.
pub fn parse_dump(text: &str) -> PluginResult<BTreeMap<String, Rating>> {
    let corrupt = |cause: &str| PluginError::Corrupt {
        plugin_name: PLUGIN_NAME.to_string(),
        cause: cause.to_string(),
    };

    let mut items: Vec<(String, f64, f64, f64)> = Vec::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [name, rating, votes, users] = fields.as_slice() else {
            log::warn!(
                "Unexpected line in ratings dump, expected 'pkgname\\trating\\tvote_count\\tuser_count': '{}'",
                line
            );
            continue;
        };
        let number = |s: &str| s.trim().parse::<f64>().unwrap_or(0.0);
        items.push((name.to_string(), number(*rating), number(*votes), number(*users)));
    }

    if items.is_empty() {
        return Err(corrupt("no ratings in dump"));
    }
    let total_votes: f64 = items.iter().map(|(_, _, votes, _)| votes).sum();
    if total_votes == 0.0 {
        return Err(corrupt("no votes in dump"));
    }
    let average = total_votes / items.len() as f64;
    log::debug!("Ratings vote_count average is {:.2}", average);

    Ok(items
        .into_iter()
        .map(|(name, rating, vote_count, user_count)| {
            let confidence = (100.0 * vote_count / average).min(100.0);
            (
                name,
                Rating {
                    rating: rating.round().clamp(0.0, 100.0) as i32,
                    vote_count,
                    user_count,
                    confidence: confidence.round() as i32,
                },
            )
        })
        .collect())
}
