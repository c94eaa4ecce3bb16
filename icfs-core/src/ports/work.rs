use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{LedgerError, Result};

/// Handle to one open transaction.
///
/// Dropping a context without calling [`WorkContext::commit`] abandons it and
/// the backend rolls the transaction back, so early returns via `?` never
/// leave partial effects behind.
#[async_trait]
pub trait WorkContext: Send + Sized {
    /// Make every change made through this context durable. Consumes the
    /// context, so a second commit cannot be expressed.
    async fn commit(self) -> Result<()>;

    /// Discard every change made through this context.
    async fn rollback(self) -> Result<()>;
}

/// Produces work contexts. No nesting: each logical operation begins exactly
/// one context and threads it through every store call.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Context: WorkContext + 'static;

    async fn begin(&self) -> Result<Self::Context>;
}

/// Run one logical operation under `limit`. On expiry the future is
/// dropped, taking any open context with it uncommitted.
pub async fn bounded<T>(
    limit: Duration,
    operation: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, ?limit, "unit of work timed out");
            Err(LedgerError::Internal(format!(
                "{operation} timed out after {}ms",
                limit.as_millis()
            )))
        }
    }
}
