//! Public API for record refinement

pub use crate::refine::needs::{missing, needs_refine};
pub use crate::refine::orchestrator::RefineOrchestrator;
