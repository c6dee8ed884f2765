//! Retry with exponential backoff for transient storage failures.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::StoreError;

/// Execute a storage operation with automatic retry on transient
/// failures.
///
/// # Example
/// ```ignore
/// let team = execute_with_retry(
///     || store.team_by_external_id("ibl", "7"),
///     3, // max attempts
/// )
/// .await?;
/// ```
pub async fn execute_with_retry<F, Fut, T>(mut f: F, max_attempts: u32) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_attempts && is_retriable_error(&e) => {
                let backoff_ms = 100_u64 * 2_u64.pow(attempt - 1);
                warn!(
                    "Storage operation failed (attempt {}/{}): {}. Retrying in {}ms",
                    attempt, max_attempts, e, backoff_ms
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Check if a storage error is retriable. Constraint violations and
/// missing rows never are; backend errors are matched on the usual
/// transient signatures.
fn is_retriable_error(e: &StoreError) -> bool {
    let message = match e {
        StoreError::Backend(msg) => msg.to_lowercase(),
        StoreError::UniqueViolation(_) | StoreError::NotFound(_) => return false,
    };

    message.contains("connection")
        || message.contains("timeout")
        || message.contains("broken pipe")
        || message.contains("connection reset")
        || message.contains("connection refused")
        || message.contains("connection closed")
        // PostgreSQL specific transient errors
        || message.contains("could not serialize")
        || message.contains("deadlock detected")
        || message.contains("too many clients")
        || message.contains("server closed the connection")
}
