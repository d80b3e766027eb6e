//! Retry utilities for the ad-library client.
//!
//! Provides exponential backoff retry logic for transient HTTP errors such as
//! 429 Rate Limited responses. Non-retriable errors (parse failures, 404s) are
//! propagated immediately without retrying.

use std::future::Future;
use std::time::Duration;

use crate::error::LibraryError;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Retriable errors:
/// - [`LibraryError::RateLimited`] — HTTP 429; the server has asked us to back off.
/// - [`LibraryError::Http`] — network-level failure (connection reset, timeout, etc.).
///
/// Non-retriable errors (propagated immediately):
/// - [`LibraryError::NotFound`] — 404; retrying would return the same result.
/// - [`LibraryError::UnexpectedStatus`] — non-retriable HTTP status (e.g., 403, 500).
/// - [`LibraryError::Deserialize`] — response body does not parse; retrying won't fix it.
/// - [`LibraryError::InvalidBaseUrl`] — configuration problem; retrying won't fix it.
fn is_retriable(err: &LibraryError) -> bool {
    matches!(
        err,
        LibraryError::RateLimited { .. } | LibraryError::Http(_)
    )
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// On success the result is returned immediately.
///
/// On a retriable error, the function sleeps for `backoff_base_secs *
/// 2^attempt` seconds and tries again, up to `max_retries` additional attempts
/// after the first try. If all retries are exhausted the last error is
/// returned. Non-retriable errors are returned immediately without sleeping.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, LibraryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LibraryError>>,
{
    let mut last_err;
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                last_err = err;
            }
        }

        // Exponential backoff: base * 2^attempt seconds, capped to avoid overflow.
        let delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %last_err,
            "transient library error — retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}
