//! Application module: the `softcenter` command-line front end

pub mod cli;
pub mod startup;

use crate::app::cli::ConfigError;
use crate::core::error_handling::ContextualError;
use crate::plugin::api::PluginError;

/// Errors that end a command
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot initialise logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("cannot format output: {0}")]
    Output(#[from] serde_json::Error),
}

impl AppError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Logging(_) => 2,
            AppError::Plugin(PluginError::NotFound { .. }) => 3,
            AppError::Plugin(
                PluginError::NoManagementPlugin { .. }
                | PluginError::NotSupported { .. }
                | PluginError::PluginNotFound { .. },
            ) => 4,
            AppError::Plugin(PluginError::Cancelled) => 130,
            _ => 1,
        }
    }
}

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        match self {
            AppError::Plugin(error) => error.is_user_actionable(),
            _ => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            AppError::Plugin(error) => error.user_message(),
            _ => None,
        }
    }
}
