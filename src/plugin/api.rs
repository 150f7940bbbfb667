//! Public API for the plugin system
//!
//! External modules should import from here rather than directly from internal modules.

// Core plugin management
pub use crate::plugin::manager::PluginManager;

// Error handling
pub use crate::plugin::error::{log_plugin_error, PluginError, PluginResult};

// Plugin metadata and capabilities
pub use crate::plugin::traits::{
    AppManager, DistroUpgradeProvider, FileResolver, Plugin, Refiner, Refresher, Searcher,
    UpdateProvider,
};
pub use crate::plugin::types::{AppAction, Capability, PluginInfo, PluginSummary};

// Plugin configuration
pub use crate::plugin::args::PluginConfig;

// Plugin registry for management
pub use crate::plugin::registry::{PluginRegistry, SharedPluginRegistry};

// Ordering
pub use crate::plugin::ordering::compute_order;
