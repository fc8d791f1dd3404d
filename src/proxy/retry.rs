//! Retry policy for non-streaming upstream calls
//!
//! A request that never reached the provider (connect failure, reset before a
//! response) is sent once more. Anything the provider answered, including error
//! statuses, is final.

use std::future::Future;

use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::routes::metrics::record_upstream_retry;

/// Whether a failed attempt may be repeated
pub fn is_retryable(err: &AppError) -> bool {
    matches!(err, AppError::UpstreamUnreachable { .. })
}

/// Run `attempt`, and run it exactly once more if the first try was retryable
pub async fn retry_once<T, F, Fut>(alias: &str, mut attempt: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    match attempt().await {
        Err(err) if is_retryable(&err) => {
            warn!(alias = %alias, error = %err, "Upstream unreachable, retrying once");
            record_upstream_retry(alias);
            attempt().await
        }
        other => other,
    }
}
