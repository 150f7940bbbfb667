//! Plugin execution order
//!
//! Plugins run in dependency order. Among plugins whose dependencies are all
//! satisfied, higher priority runs first and the name breaks remaining ties,
//! so the order is fully deterministic.

use std::collections::{HashMap, HashSet};

use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::types::PluginInfo;

/// Compute the execution order of `plugins`
///
/// Dependencies on plugins that are not present are ignored.
pub fn compute_order(plugins: &[PluginInfo]) -> PluginResult<Vec<String>> {
    let known: HashSet<&str> = plugins.iter().map(|p| p.name.as_str()).collect();

    // name -> unresolved dependency count; dep -> dependents
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for plugin in plugins {
        let mut deps: Vec<&str> = Vec::new();
        for dep in &plugin.deps {
            if !known.contains(dep.as_str()) {
                log::debug!(
                    "Plugin '{}' depends on '{}' which is not loaded; ignoring",
                    plugin.name,
                    dep
                );
                continue;
            }
            if dep == &plugin.name {
                return Err(PluginError::DependencyCycle {
                    plugins: vec![plugin.name.clone()],
                });
            }
            if deps.contains(&dep.as_str()) {
                continue;
            }
            deps.push(dep.as_str());
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(plugin.name.as_str());
        }
        pending.insert(plugin.name.as_str(), deps.len());
    }

    let by_name: HashMap<&str, &PluginInfo> =
        plugins.iter().map(|p| (p.name.as_str(), p)).collect();

    let mut ready: Vec<&PluginInfo> = plugins
        .iter()
        .filter(|p| pending.get(p.name.as_str()) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(plugins.len());

    while !ready.is_empty() {
        // Highest priority first, then name
        ready.sort_by(|a, b| {
            b.priority
                .total_cmp(&a.priority)
                .then_with(|| a.name.cmp(&b.name))
        });
        let next = ready.remove(0);
        order.push(next.name.clone());

        if let Some(children) = dependents.get(next.name.as_str()) {
            for child in children {
                if let Some(count) = pending.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        if let Some(info) = by_name.get(child) {
                            ready.push(info);
                        }
                    }
                }
            }
        }
    }

    if order.len() < plugins.len() {
        let ordered: HashSet<&str> = order.iter().map(String::as_str).collect();
        let mut stuck: Vec<String> = plugins
            .iter()
            .filter(|p| !ordered.contains(p.name.as_str()))
            .map(|p| p.name.clone())
            .collect();
        stuck.sort();
        return Err(PluginError::DependencyCycle { plugins: stuck });
    }

    Ok(order)
}
