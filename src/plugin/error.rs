//! Plugin Error Handling
//!
//! Error types shared by plugins, the registry and the loader.

use thiserror::Error;

use crate::core::error_handling::ContextualError;

/// Result type alias for plugin operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PluginError {
    /// Plugin could not be set up and has been disabled
    #[error("Plugin '{plugin_name}' failed to set up: {cause}")]
    SetupFailed { plugin_name: String, cause: String },

    /// Plugin opted out during setup, e.g. wrong distribution
    #[error("Plugin '{plugin_name}' disabled: {reason}")]
    Disabled { plugin_name: String, reason: String },

    /// Network or IPC failure; worth retrying
    #[error("Plugin '{plugin_name}' failed during '{operation}': {cause}")]
    TransportFailed {
        plugin_name: String,
        operation: String,
        cause: String,
    },

    #[error("{message}")]
    NotFound { message: String },

    #[error("Operation was cancelled")]
    Cancelled,

    /// Cached or downloaded data could not be parsed
    #[error("Plugin '{plugin_name}' has corrupt data: {cause}")]
    Corrupt { plugin_name: String, cause: String },

    #[error("No management plugin for application '{app_id}'")]
    NoManagementPlugin { app_id: String },

    #[error("Plugin '{plugin_name}' does not support '{operation}'")]
    NotSupported {
        plugin_name: String,
        operation: String,
    },

    #[error("Plugin not found: {plugin_name}")]
    PluginNotFound { plugin_name: String },

    #[error("Plugin dependency cycle between: {}", .plugins.join(", "))]
    DependencyCycle { plugins: Vec<String> },

    #[error("Version incompatible: {message}")]
    VersionIncompatible { message: String },

    #[error("Plugin '{plugin_name}' failed during '{operation}': {cause}")]
    ExecutionError {
        plugin_name: String,
        operation: String,
        cause: String,
    },
}

impl PluginError {
    pub fn not_found(message: impl Into<String>) -> Self {
        PluginError::NotFound {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PluginError::Cancelled)
    }

    /// Errors a retry may resolve
    pub fn is_transient(&self) -> bool {
        matches!(self, PluginError::TransportFailed { .. })
    }
}

impl ContextualError for PluginError {
    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            PluginError::NotFound { .. }
                | PluginError::NoManagementPlugin { .. }
                | PluginError::NotSupported { .. }
                | PluginError::PluginNotFound { .. }
                | PluginError::DependencyCycle { .. }
                | PluginError::Cancelled
        )
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            PluginError::NotFound { message } => Some(message),
            PluginError::NoManagementPlugin { .. } => {
                Some("Application has no plugin able to manage it")
            }
            PluginError::NotSupported { .. } => Some("Action not supported for this application"),
            PluginError::PluginNotFound { .. } => Some("Requested plugin is not available"),
            PluginError::DependencyCycle { .. } => {
                Some("Plugin dependencies form a cycle; check plugin configuration")
            }
            PluginError::Cancelled => Some("Operation was cancelled"),
            _ => None,
        }
    }
}

/// Log a per-plugin failure with its context
///
/// Cancellation is expected and never logged; a missing item is routine and
/// goes to debug.
pub fn log_plugin_error(error: &PluginError, plugin_name: &str, operation: &str) {
    match error {
        PluginError::Cancelled => {}
        PluginError::NotFound { .. } => {
            log::debug!("{} {}: {}", plugin_name, operation, error)
        }
        _ => log::warn!("{} {} failed: {}", plugin_name, operation, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginError::NotSupported {
            plugin_name: "steam".to_string(),
            operation: "set-rating".to_string(),
        };
        assert_eq!(err.to_string(), "Plugin 'steam' does not support 'set-rating'");

        let err = PluginError::DependencyCycle {
            plugins: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Plugin dependency cycle between: a, b");
    }

    #[test]
    fn test_transient_classification() {
        let transport = PluginError::TransportFailed {
            plugin_name: "fedora-tagger".to_string(),
            operation: "download".to_string(),
            cause: "timed out".to_string(),
        };
        assert!(transport.is_transient());
        assert!(!PluginError::Cancelled.is_transient());
        assert!(PluginError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_user_actionable_errors_have_messages() {
        let errors = vec![
            PluginError::not_found("no such desktop file"),
            PluginError::NoManagementPlugin {
                app_id: "foo".to_string(),
            },
            PluginError::Cancelled,
            PluginError::SetupFailed {
                plugin_name: "x".to_string(),
                cause: "y".to_string(),
            },
        ];
        for err in errors {
            assert_eq!(err.is_user_actionable(), err.user_message().is_some());
        }
        assert_eq!(
            PluginError::not_found("no such desktop file").user_message(),
            Some("no such desktop file")
        );
    }

    #[test]
    fn test_log_plugin_error_accepts_every_kind() {
        log_plugin_error(&PluginError::Cancelled, "p", "search");
        log_plugin_error(&PluginError::not_found("nothing"), "p", "search");
        log_plugin_error(
            &PluginError::Corrupt {
                plugin_name: "p".to_string(),
                cause: "bad json".to_string(),
            },
            "p",
            "refine",
        );
    }
}
