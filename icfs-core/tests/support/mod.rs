//! Shared harness for service-level tests over the in-memory backend.
#![allow(dead_code)]

pub mod faults;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use icfs_core::auth::{AuthCrypto, AuthService, AuthSettings};
use icfs_core::infrastructure::memory::{
    MemoryAccountStore, MemoryContentStore, MemorySessionStore,
    MemoryUnitOfWork, MemoryWorkContext,
};
use icfs_core::ledger::{LedgerService, LedgerSettings};
use icfs_core::model::{AccountId, ContentId, FileType, NewAccount, NewContent};
use icfs_core::ports::{AccountStore, ContentStore};

pub const TEST_PASSWORD: &str = "StrongPassword123!";

/// Argon2 at its cheapest so tests stay fast.
pub fn test_crypto() -> Arc<AuthCrypto> {
    Arc::new(
        AuthCrypto::with_cost("test-pepper", "test-token-key", 1024, 1)
            .expect("valid test crypto"),
    )
}

pub struct Harness {
    pub work: Arc<MemoryUnitOfWork>,
    pub sessions: Arc<MemorySessionStore>,
    pub auth: AuthService<MemoryUnitOfWork>,
    pub ledger: LedgerService<MemoryUnitOfWork>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_content_store(Arc::new(MemoryContentStore))
    }

    pub fn with_content_store(
        contents: Arc<dyn ContentStore<MemoryWorkContext>>,
    ) -> Self {
        Self::build(contents, Duration::from_secs(30))
    }

    pub fn build(
        contents: Arc<dyn ContentStore<MemoryWorkContext>>,
        work_timeout: Duration,
    ) -> Self {
        let work = Arc::new(MemoryUnitOfWork::new());
        let accounts: Arc<dyn AccountStore<MemoryWorkContext>> =
            Arc::new(MemoryAccountStore);
        let sessions = Arc::new(MemorySessionStore::new());

        let auth = AuthService::new(
            work.clone(),
            accounts.clone(),
            sessions.clone(),
            test_crypto(),
            AuthSettings {
                session_ttl: Duration::from_secs(24 * 60 * 60),
                work_timeout,
            },
        );
        let ledger = LedgerService::new(
            work.clone(),
            accounts,
            contents,
            LedgerSettings { work_timeout },
        );

        Self {
            work,
            sessions,
            auth,
            ledger,
        }
    }

    pub async fn account(&self, username: &str) -> Result<AccountId> {
        let id = self
            .auth
            .register(NewAccount {
                username: username.to_string(),
                password: TEST_PASSWORD.to_string(),
                email: format!("{username}@example.com"),
            })
            .await?;
        Ok(id)
    }

    pub async fn upload(
        &self,
        owner: AccountId,
        cid: &str,
        size: i64,
    ) -> Result<ContentId> {
        let id = self
            .ledger
            .register_content(owner, upload(cid, size))
            .await?;
        Ok(id)
    }

    pub async fn credit(&self, id: AccountId) -> Result<i64> {
        Ok(self.auth.get_account(id).await?.credit)
    }

    pub async fn downloads(&self, id: ContentId) -> Result<i64> {
        Ok(self.ledger.get_content(id).await?.downloads)
    }
}

pub fn upload(cid: &str, size: i64) -> NewContent {
    NewContent {
        cid: cid.to_string(),
        name: format!("{cid} notes"),
        description: format!("lecture notes stored under {cid}"),
        extension: "pdf".to_string(),
        file_type: FileType::Document,
        size,
    }
}
