//! Shared error reporting
//!
//! Errors from different subsystems implement [`ContextualError`] so the binary
//! can decide between showing the user a specific message and a generic line
//! with the details pushed down to debug level.

/// Errors that know whether their message is meant for the user
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(..)` with a message the user can act on. System errors return `false`
/// and `None`.
pub trait ContextualError: std::error::Error {
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// Log an error that ends the current command
///
/// User-actionable errors print their own message; system errors print the
/// operation context and leave the detail to debug output.
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("{}", user_msg),
        _ => log::error!("{} failed: {}", operation_context, error),
    }
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
