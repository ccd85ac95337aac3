use std::future::Future;
use std::time::Duration;

use crate::errors::DigestError;

/// Runs `fut` with a deadline. Expiry becomes `DigestError::Timeout`, which
/// callers re-tag into whatever category the wrapped call belongs to.
///
/// # Errors
///
/// Returns the future's own error, or `Timeout` when the deadline passes first.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T, DigestError>
where
    F: Future<Output = Result<T, DigestError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DigestError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}
