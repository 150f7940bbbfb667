//! Public API for record deduplication

pub use crate::dedup::engine::DedupEngine;
