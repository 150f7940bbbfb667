//! Built-in Plugin Implementations
//!
//! Every data source shipped with the crate. Each registers itself with the
//! `builtin!` macro and is found by `PluginManager::discover_plugins`.

pub mod api;
pub mod desktop;
pub mod fedora_tagger;
pub mod packagekit;
pub mod steam;
pub mod ubuntu_reviews;
