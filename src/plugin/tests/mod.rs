//! Shared test support for the plugin system

pub(crate) mod utils;
