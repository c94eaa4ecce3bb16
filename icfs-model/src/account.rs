use std::fmt;

use chrono::{DateTime, Utc};

use crate::ids::AccountId;

/// A registered account and its credit balance.
///
/// `password_hash` is only populated when an account is loaded for
/// credential checks; every value handed back to callers has it stripped.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub password_hash: Option<String>,
    pub email: String,
    /// Download entitlement. May go negative; no floor is enforced.
    pub credit: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Drop the stored password hash.
    pub fn without_secret(mut self) -> Self {
        self.password_hash = None;
        self
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "<redacted>"),
            )
            .field("email", &self.email)
            .field("credit", &self.credit)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Registration candidate carrying the plaintext password.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}
