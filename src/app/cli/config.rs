//! TOML configuration file loading
//!
//! The file is optional unless named with `--config-file`. Values from the
//! command line win over values from the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error_handling::ContextualError;

use super::args::Args;

/// Default metadata cache age for `refresh` when nothing else is configured
pub const DEFAULT_CACHE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file does not exist: {path}")]
    Missing { path: PathBuf },

    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for '{key}' in {path}: {message}")]
    InvalidValue {
        path: PathBuf,
        key: String,
        message: String,
    },
}

// The display text already names the file and key, so it is logged whole.
impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

/// Values read from `softcenter.toml`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: Option<bool>,
    pub exclude_plugins: Vec<String>,
    pub cache_age: Option<Duration>,
    pub plugins: HashMap<String, toml::Table>,
}

/// `~/.config/Softcenter/softcenter.toml` on Linux
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("Softcenter").join("softcenter.toml"))
}

impl FileConfig {
    /// Load the explicit file, or the default one when it exists
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::Missing {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No configuration file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        let table = toml::from_str::<toml::Table>(&contents).map_err(|source| {
            ConfigError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_table(path, &table)
    }

    /// Interpret a parsed configuration table
    pub fn from_table(path: PathBuf, table: &toml::Table) -> Result<Self, ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            path: path.clone(),
            key: key.to_string(),
            message: message.to_string(),
        };

        let string = |key: &str| -> Result<Option<String>, ConfigError> {
            match table.get(key) {
                None => Ok(None),
                Some(toml::Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(invalid(key, "expected a string")),
            }
        };

        let color = match table.get("color") {
            None => None,
            Some(toml::Value::Boolean(b)) => Some(*b),
            Some(_) => return Err(invalid("color", "expected true or false")),
        };

        let exclude_plugins = match table.get("exclude-plugin") {
            None => Vec::new(),
            Some(toml::Value::String(s)) => split_names(std::slice::from_ref(s)),
            Some(toml::Value::Array(items)) => {
                let names: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect();
                if names.len() != items.len() {
                    return Err(invalid("exclude-plugin", "expected plugin names"));
                }
                split_names(&names)
            }
            Some(_) => return Err(invalid("exclude-plugin", "expected a string or array")),
        };

        let cache_age = match table.get("cache-age") {
            None => None,
            Some(toml::Value::Integer(secs)) if *secs >= 0 => {
                Some(Duration::from_secs(*secs as u64))
            }
            Some(_) => return Err(invalid("cache-age", "expected a non-negative number of seconds")),
        };

        let plugins = match table.get("plugins") {
            None => HashMap::new(),
            Some(toml::Value::Table(plugins)) => {
                let mut tables = HashMap::new();
                for (name, value) in plugins {
                    match value {
                        toml::Value::Table(settings) => {
                            tables.insert(name.clone(), settings.clone());
                        }
                        _ => {
                            return Err(invalid(
                                &format!("plugins.{}", name),
                                "expected a table",
                            ))
                        }
                    }
                }
                tables
            }
            Some(_) => return Err(invalid("plugins", "expected a table of plugin tables")),
        };

        Ok(Self {
            log_level: string("log-level")?,
            log_format: string("log-format")?,
            log_file: string("log-file")?.map(PathBuf::from),
            color,
            exclude_plugins,
            cache_age,
            plugins,
            path: Some(path),
        })
    }
}

/// Split comma-separated names, dropping blanks and duplicates
fn split_names(values: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in values.iter().flat_map(|v| v.split(',')).map(str::trim) {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Effective settings after the command line is layered over the file
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: Option<bool>,
    pub exclude_plugins: Vec<String>,
    pub cache_age: Duration,
    pub plugins: HashMap<String, toml::Table>,
}

impl Settings {
    pub fn merge(args: &Args, file: FileConfig) -> Self {
        let log_file = match &args.log_file {
            Some(_) => args.effective_log_file(),
            None => file
                .log_file
                .filter(|p| !(p.as_os_str() == "-" || p.to_string_lossy().eq_ignore_ascii_case("none"))),
        };

        let mut exclude_plugins = file.exclude_plugins;
        exclude_plugins.extend(split_names(&args.plugin_exclusions));
        let exclude_plugins = split_names(&exclude_plugins);

        let cache_age = match &args.command {
            super::args::Command::Refresh {
                cache_age: Some(secs),
            } => Duration::from_secs(*secs),
            _ => file.cache_age.unwrap_or(DEFAULT_CACHE_AGE),
        };

        Self {
            log_level: args.log_level.clone().or(file.log_level),
            log_format: args.log_format.clone().or(file.log_format),
            log_file,
            color: args.color.or(file.color),
            exclude_plugins,
            cache_age,
            plugins: file.plugins,
        }
    }
}
