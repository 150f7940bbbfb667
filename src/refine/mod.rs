//! Record refinement
//!
//! Callers state which fields they need through [`RefineFlags`]; the
//! orchestrator asks the plugins to fill in whatever is still missing.
//!
//! [`RefineFlags`]: crate::record::api::RefineFlags

pub(crate) mod needs;
pub(crate) mod orchestrator;

pub mod api;
