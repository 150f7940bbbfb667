//! Record deduplication
//!
//! Several plugins may describe the same software. The engine folds their
//! records into one canonical record per piece of software.

pub(crate) mod engine;

pub mod api;
