//! API for builtin plugin registration and discovery
//!
//! Plugins use the `builtin!` macro to register a factory for automatic discovery.

use crate::plugin::traits::Plugin;

/// Entry for a builtin plugin in the dynamic registry
pub struct BuiltinPluginEntry {
    pub factory: fn() -> Box<dyn Plugin>,
}

// Collect all builtin plugin entries
inventory::collect!(BuiltinPluginEntry);

/// Macro for registering builtin plugins
#[macro_export]
macro_rules! builtin {
    ($factory_expr:expr) => {
        inventory::submit!($crate::plugin::builtin::api::BuiltinPluginEntry {
            factory: $factory_expr
        });
    };
}

/// Instantiate every registered builtin plugin
pub fn get_all_builtin_plugins() -> Vec<Box<dyn Plugin>> {
    inventory::iter::<BuiltinPluginEntry>()
        .map(|entry| (entry.factory)())
        .collect()
}
