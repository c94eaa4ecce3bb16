use async_trait::async_trait;
use icfs_model::{Account, AccountId};

use crate::error::Result;
use crate::ports::WorkContext;

/// Allow-listed account columns, already prepared for persistence.
#[derive(Clone, Default, PartialEq)]
pub struct AccountFields {
    pub password_hash: Option<String>,
    pub email: Option<String>,
}

impl AccountFields {
    pub fn is_empty(&self) -> bool {
        self.password_hash.is_none() && self.email.is_none()
    }
}

impl std::fmt::Debug for AccountFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountFields")
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "<redacted>"),
            )
            .field("email", &self.email)
            .finish()
    }
}

// Durable account records and the atomic credit primitive
#[async_trait]
pub trait AccountStore<C: WorkContext>: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn insert(
        &self,
        cx: &mut C,
        account: &Account,
        password_hash: &str,
    ) -> Result<()>;

    /// Loaded accounts carry their password hash.
    async fn get_by_id(&self, cx: &mut C, id: AccountId) -> Result<Option<Account>>;
    async fn get_by_username(
        &self,
        cx: &mut C,
        username: &str,
    ) -> Result<Option<Account>>;

    /// Lock the given rows for the rest of the transaction, in ascending id
    /// order, and return their current state. Missing ids are omitted.
    async fn lock_for_update(
        &self,
        cx: &mut C,
        ids: &[AccountId],
    ) -> Result<Vec<Account>>;

    /// Returns `false` when no such account exists. Fails with `Conflict`
    /// while the account still owns content.
    async fn delete(&self, cx: &mut C, id: AccountId) -> Result<bool>;

    /// Returns `false` when no such account exists.
    async fn update_fields(
        &self,
        cx: &mut C,
        id: AccountId,
        fields: &AccountFields,
    ) -> Result<bool>;

    /// `credit += delta` as a single statement. Returns `false` when no such
    /// account exists.
    async fn adjust_credit(&self, cx: &mut C, id: AccountId, delta: i64) -> Result<bool>;
}
