//! Application records and the value types they carry

pub(crate) mod app;
pub(crate) mod flags;
pub(crate) mod media;
pub(crate) mod quality;
pub(crate) mod types;

pub mod api;
