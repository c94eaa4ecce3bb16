use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Key/value store with per-key expiry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// `None` for missing or expired keys.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
