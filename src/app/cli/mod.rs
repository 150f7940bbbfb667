//! CLI argument parsing, configuration loading and output formatting

pub mod args;
pub mod config;
pub mod display;

pub use args::{Args, Command, RefineArgs};
pub use config::{ConfigError, FileConfig, Settings};
