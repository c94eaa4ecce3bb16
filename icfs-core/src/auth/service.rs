use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use icfs_model::{Account, AccountId, AccountPatch, NewAccount};
use tracing::{debug, info, warn};

use crate::auth::{AuthCrypto, SessionToken};
use crate::error::{LedgerError, Result, ResultExt};
use crate::ports::{
    AccountFields, AccountStore, SessionStore, UnitOfWork, WorkContext, bounded,
};

/// Longest accepted username, in characters.
pub const USERNAME_MAX_CHARS: usize = 40;

const SESSION_KEY_PREFIX: &str = "session:";

#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    /// Lifetime of an issued session token.
    pub session_ttl: Duration,
    /// Upper bound on each operation, store round-trips included.
    pub work_timeout: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(24 * 60 * 60),
            work_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a successful login.
#[derive(Debug)]
pub struct Authenticated {
    /// The account, without its password hash.
    pub account: Account,
    pub token: SessionToken,
}

/// Account registration, credential checks and session lifecycle.
///
/// The session key is owned by the injected [`AuthCrypto`]; two services
/// built with different keys never accept each other's tokens.
pub struct AuthService<U: UnitOfWork> {
    work: Arc<U>,
    accounts: Arc<dyn AccountStore<U::Context>>,
    sessions: Arc<dyn SessionStore>,
    crypto: Arc<AuthCrypto>,
    settings: AuthSettings,
}

impl<U: UnitOfWork> fmt::Debug for AuthService<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("accounts_refs", &Arc::strong_count(&self.accounts))
            .field("sessions_refs", &Arc::strong_count(&self.sessions))
            .field("settings", &self.settings)
            .finish()
    }
}

impl<U: UnitOfWork> Clone for AuthService<U> {
    fn clone(&self) -> Self {
        Self {
            work: Arc::clone(&self.work),
            accounts: Arc::clone(&self.accounts),
            sessions: Arc::clone(&self.sessions),
            crypto: Arc::clone(&self.crypto),
            settings: self.settings,
        }
    }
}

impl<U: UnitOfWork> AuthService<U> {
    pub fn new(
        work: Arc<U>,
        accounts: Arc<dyn AccountStore<U::Context>>,
        sessions: Arc<dyn SessionStore>,
        crypto: Arc<AuthCrypto>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            work,
            accounts,
            sessions,
            crypto,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Create an account with a zero balance and return its id.
    pub async fn register(&self, candidate: NewAccount) -> Result<AccountId> {
        bounded(
            self.settings.work_timeout,
            "register",
            self.register_inner(candidate),
        )
        .await
    }

    async fn register_inner(&self, candidate: NewAccount) -> Result<AccountId> {
        validate_candidate(&candidate)?;

        let password_hash = self.crypto.hash_password(&candidate.password)?;
        let now = Utc::now();
        let account = Account {
            id: AccountId::new(),
            username: candidate.username,
            password_hash: None,
            email: candidate.email,
            credit: 0,
            created_at: now,
            updated_at: now,
        };

        let mut cx = self.work.begin().await?;
        self.accounts
            .insert(&mut cx, &account, &password_hash)
            .await
            .context("failed to register account")?;
        cx.commit().await.context("failed to register account")?;

        info!(account_id = %account.id, username = %account.username, "account registered");
        Ok(account.id)
    }

    /// Check credentials and open a session.
    ///
    /// An unknown username and a wrong password fail identically.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Authenticated> {
        bounded(
            self.settings.work_timeout,
            "authenticate",
            self.authenticate_inner(username, password),
        )
        .await
    }

    async fn authenticate_inner(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Authenticated> {
        let mut cx = self.work.begin().await?;
        let found = self
            .accounts
            .get_by_username(&mut cx, username)
            .await
            .context("failed to load account")?;
        drop(cx);

        let verified = match &found {
            Some(Account {
                password_hash: Some(hash),
                ..
            }) => self.crypto.verify_password(password, hash)?,
            _ => self.crypto.verify_dummy(password),
        };

        let account = match found {
            Some(account) if verified => account,
            _ => {
                debug!("rejected login attempt");
                return Err(LedgerError::Unauthorized(
                    "invalid username or password".into(),
                ));
            }
        };

        let token = SessionToken::generate()?;
        let key = self.session_key(&token)?;
        self.sessions
            .set_with_expiry(&key, &account.id.to_string(), self.settings.session_ttl)
            .await
            .context("failed to store session")?;

        info!(account_id = %account.id, "session opened");
        Ok(Authenticated {
            account: account.without_secret(),
            token,
        })
    }

    /// Resolve a bearer token to its account.
    pub async fn validate(&self, token: &str) -> Result<AccountId> {
        bounded(self.settings.work_timeout, "validate", self.validate_inner(token))
            .await
    }

    async fn validate_inner(&self, token: &str) -> Result<AccountId> {
        let token = SessionToken::parse(token)?;
        let key = self.session_key(&token)?;

        let Some(value) = self
            .sessions
            .get(&key)
            .await
            .context("failed to read session")?
        else {
            return Err(LedgerError::Unauthorized(
                "session missing or expired".into(),
            ));
        };

        value.parse::<AccountId>().map_err(|err| {
            warn!("session store holds a malformed account id");
            LedgerError::Internal(format!("corrupt session entry: {err}"))
        })
    }

    /// Revoke a token. Revoking an unknown or expired token succeeds.
    pub async fn logout(&self, token: &str) -> Result<()> {
        bounded(self.settings.work_timeout, "logout", self.logout_inner(token))
            .await
    }

    async fn logout_inner(&self, token: &str) -> Result<()> {
        // A token that could never have been issued has no session to remove
        let Ok(token) = SessionToken::parse(token) else {
            return Ok(());
        };
        let key = self.session_key(&token)?;
        self.sessions
            .delete(&key)
            .await
            .context("failed to delete session")?;
        debug!("session closed");
        Ok(())
    }

    /// Apply an allow-listed patch. A new password is hashed before it is
    /// stored.
    pub async fn update_account(
        &self,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<()> {
        bounded(
            self.settings.work_timeout,
            "update_account",
            self.update_account_inner(id, patch),
        )
        .await
    }

    async fn update_account_inner(
        &self,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<()> {
        if patch.is_empty() {
            return Err(LedgerError::BadRequest("nothing to update".into()));
        }
        if patch.password.as_deref().is_some_and(str::is_empty) {
            return Err(LedgerError::BadRequest("password must not be empty".into()));
        }
        if patch.email.as_deref().is_some_and(|email| email.trim().is_empty()) {
            return Err(LedgerError::BadRequest("email must not be empty".into()));
        }

        let password_hash = match patch.password.as_deref() {
            Some(password) => Some(self.crypto.hash_password(password)?),
            None => None,
        };
        let fields = AccountFields {
            password_hash,
            email: patch.email,
        };

        let mut cx = self.work.begin().await?;
        let updated = self
            .accounts
            .update_fields(&mut cx, id, &fields)
            .await
            .context("failed to update account")?;
        if !updated {
            return Err(LedgerError::NotFound(format!("account {id}")));
        }
        cx.commit().await.context("failed to update account")?;

        info!(
            account_id = %id,
            password_changed = fields.password_hash.is_some(),
            "account updated"
        );
        Ok(())
    }

    /// Load an account without its password hash.
    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        bounded(
            self.settings.work_timeout,
            "get_account",
            self.get_account_inner(id),
        )
        .await
    }

    async fn get_account_inner(&self, id: AccountId) -> Result<Account> {
        let mut cx = self.work.begin().await?;
        let account = self
            .accounts
            .get_by_id(&mut cx, id)
            .await
            .context("failed to load account")?
            .ok_or_else(|| LedgerError::NotFound(format!("account {id}")))?;
        Ok(account.without_secret())
    }

    pub async fn get_account_by_username(&self, username: &str) -> Result<Account> {
        bounded(self.settings.work_timeout, "get_account_by_username", async {
            let mut cx = self.work.begin().await?;
            let account = self
                .accounts
                .get_by_username(&mut cx, username)
                .await
                .context("failed to load account")?
                .ok_or_else(|| LedgerError::NotFound(format!("account {username}")))?;
            Ok(account.without_secret())
        })
        .await
    }

    /// Remove an account. Accounts that still own content cannot be removed.
    pub async fn delete_account(&self, id: AccountId) -> Result<()> {
        bounded(
            self.settings.work_timeout,
            "delete_account",
            self.delete_account_inner(id),
        )
        .await
    }

    async fn delete_account_inner(&self, id: AccountId) -> Result<()> {
        let mut cx = self.work.begin().await?;
        let deleted = self
            .accounts
            .delete(&mut cx, id)
            .await
            .context("failed to delete account")?;
        if !deleted {
            return Err(LedgerError::NotFound(format!("account {id}")));
        }
        cx.commit().await.context("failed to delete account")?;

        info!(account_id = %id, "account deleted");
        Ok(())
    }

    fn session_key(&self, token: &SessionToken) -> Result<String> {
        let digest = self.crypto.hash_token(token.as_str())?;
        Ok(format!("{SESSION_KEY_PREFIX}{digest}"))
    }
}

fn validate_candidate(candidate: &NewAccount) -> Result<()> {
    let username_len = candidate.username.chars().count();
    if username_len == 0 || candidate.username.trim().is_empty() {
        return Err(LedgerError::BadRequest("username must not be empty".into()));
    }
    if username_len > USERNAME_MAX_CHARS {
        return Err(LedgerError::BadRequest(format!(
            "username must be at most {USERNAME_MAX_CHARS} characters"
        )));
    }
    if candidate.password.is_empty() {
        return Err(LedgerError::BadRequest("password must not be empty".into()));
    }
    if candidate.email.trim().is_empty() {
        return Err(LedgerError::BadRequest("email must not be empty".into()));
    }
    Ok(())
}
