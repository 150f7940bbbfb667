//! Plugin loader façade
//!
//! Callers drive everything through [`api::PluginLoader`]: search, updates,
//! refresh, refine, local files and app actions.

pub(crate) mod facade;
pub(crate) mod fanout;
pub(crate) mod search;

pub mod api;
