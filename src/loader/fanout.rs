//! Concurrent dispatch of one operation to several plugins
//!
//! Every plugin call is raced against the cancellation token and guarded
//! against panics, so one misbehaving plugin only costs its own result.

use std::panic::AssertUnwindSafe;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use crate::core::cancel::CancellationToken;
use crate::plugin::api::{log_plugin_error, PluginError, PluginResult};

/// A pending plugin call, labelled with the plugin's name
pub(crate) type PluginCall<'a, T> = (&'a str, BoxFuture<'a, PluginResult<T>>);

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run `calls` concurrently and collect the successful results
///
/// Failures are logged per plugin. The operation only fails when every
/// plugin failed and at least one failure was not a cancellation; it then
/// returns the first such error. A cancelled token always yields
/// [`PluginError::Cancelled`].
pub(crate) async fn fan_out<'a, T>(
    operation: &str,
    calls: Vec<PluginCall<'a, T>>,
    cancel: &CancellationToken,
) -> PluginResult<Vec<T>> {
    if cancel.is_cancelled() {
        return Err(PluginError::Cancelled);
    }

    let participants = calls.len();
    let outcomes = join_all(calls.into_iter().map(|(name, call)| async move {
        let guarded = AssertUnwindSafe(call).catch_unwind();
        let outcome = match cancel.run_until_cancelled(guarded).await {
            None => Err(PluginError::Cancelled),
            Some(Ok(result)) => result,
            Some(Err(payload)) => Err(PluginError::ExecutionError {
                plugin_name: name.to_string(),
                operation: operation.to_string(),
                cause: format!("panicked: {}", panic_message(payload.as_ref())),
            }),
        };
        (name, outcome)
    }))
    .await;

    if cancel.is_cancelled() {
        return Err(PluginError::Cancelled);
    }

    let mut values = Vec::with_capacity(participants);
    let mut first_error: Option<PluginError> = None;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(value) => values.push(value),
            Err(error) => {
                log_plugin_error(&error, name, operation);
                if first_error.is_none() && !error.is_cancelled() {
                    first_error = Some(error);
                }
            }
        }
    }

    match first_error {
        Some(error) if values.is_empty() => Err(error),
        _ => Ok(values),
    }
}
