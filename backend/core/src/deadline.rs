//! Timeout plus cancellation around a single suspension point.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Why a guarded future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Await `fut`, giving up when `limit` elapses or `cancel` fires.
///
/// Cancellation wins over completion when both are ready.
pub async fn guarded<F, T>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> Result<T, Interrupted>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        res = tokio::time::timeout(limit, fut) => res.map_err(|_| Interrupted::TimedOut(limit)),
    }
}
