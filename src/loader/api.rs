//! Public API for the plugin loader

pub use crate::loader::facade::{PluginLoader, MIN_QUERY_LENGTH};
