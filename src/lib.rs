pub mod app;
pub mod core;
pub mod dedup;
pub mod loader;
pub mod notifications;
pub mod plugin;
pub mod record;
pub mod refine;
