//! Poison-tolerant lock helpers
//!
//! Application records are shared between plugins through `std::sync::RwLock`.
//! A panic inside one plugin must not make the record unreadable for the rest
//! of the process, so these helpers recover the guard from a poisoned lock and
//! log that it happened.

use std::sync::{LockResult, MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};

fn recover<G>(result: LockResult<G>, what: &str, context: &str) -> G {
    result.unwrap_or_else(|poison_err: PoisonError<G>| {
        log::warn!(
            "Recovered poisoned {} in {} (a panic occurred while it was held)",
            what,
            context
        );
        poison_err.into_inner()
    })
}

/// Acquire a mutex guard, recovering from poisoning
pub fn lock_recover<'a, T>(
    result: LockResult<MutexGuard<'a, T>>,
    context: &str,
) -> MutexGuard<'a, T> {
    recover(result, "mutex", context)
}

/// Acquire an RwLock read guard, recovering from poisoning
pub fn read_recover<'a, T>(
    result: LockResult<RwLockReadGuard<'a, T>>,
    context: &str,
) -> RwLockReadGuard<'a, T> {
    recover(result, "RwLock (read)", context)
}

/// Acquire an RwLock write guard, recovering from poisoning
pub fn write_recover<'a, T>(
    result: LockResult<RwLockWriteGuard<'a, T>>,
    context: &str,
) -> RwLockWriteGuard<'a, T> {
    recover(result, "RwLock (write)", context)
}
