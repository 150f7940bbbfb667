//! Plugin System Module
//!
//! Data sources are plugins. Each declares its priority and dependencies and
//! exposes the capabilities it serves; the manager orders, initializes and
//! tears them down, and the registry hands the loader the enabled plugins for
//! each operation in execution order.

// Internal modules - all access should go through api module
pub(crate) mod args;
pub(crate) mod builtin;
pub(crate) mod error;
pub(crate) mod initialization;
pub(crate) mod manager;
pub(crate) mod ordering;
pub(crate) mod registry;
pub(crate) mod traits;
pub(crate) mod types;

// Public API module - the only public interface for the plugin system
pub mod api;

#[cfg(test)]
pub(crate) mod tests;
