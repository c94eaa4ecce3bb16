use async_trait::async_trait;
use chrono::{DateTime, Utc};
use icfs_model::{Account, AccountId};
use uuid::Uuid;

use super::{PgWorkContext, db_error};
use crate::error::{LedgerError, Result};
use crate::ports::{AccountFields, AccountStore};

const ACCOUNT_COLUMNS: &str =
    "id, username, password_hash, email, credit, created_at, updated_at";

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresAccountStore;

impl PostgresAccountStore {
    pub fn new() -> Self {
        Self
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    username: String,
    password_hash: String,
    email: String,
    credit: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId(row.id),
            username: row.username,
            password_hash: Some(row.password_hash),
            email: row.email,
            credit: row.credit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl AccountStore<PgWorkContext> for PostgresAccountStore {
    async fn insert(
        &self,
        cx: &mut PgWorkContext,
        account: &Account,
        password_hash: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, username, password_hash, email, credit, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.username)
        .bind(password_hash)
        .bind(&account.email)
        .bind(account.credit)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(cx.conn())
        .await
        .map_err(|err| match LedgerError::from(err) {
            LedgerError::Conflict(_) => LedgerError::Conflict(format!(
                "username {} already taken",
                account.username
            )),
            other => other.context("Failed to insert account"),
        })?;

        Ok(())
    }

    async fn get_by_id(
        &self,
        cx: &mut PgWorkContext,
        id: AccountId,
    ) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(cx.conn())
        .await
        .map_err(db_error("Failed to load account"))?;

        Ok(row.map(Account::from))
    }

    async fn get_by_username(
        &self,
        cx: &mut PgWorkContext,
        username: &str,
    ) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(cx.conn())
        .await
        .map_err(db_error("Failed to load account by username"))?;

        Ok(row.map(Account::from))
    }

    async fn lock_for_update(
        &self,
        cx: &mut PgWorkContext,
        ids: &[AccountId],
    ) -> Result<Vec<Account>> {
        let ids: Vec<Uuid> = ids.iter().map(AccountId::to_uuid).collect();

        // Rows are locked in output order
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids)
        .fetch_all(cx.conn())
        .await
        .map_err(db_error("Failed to lock accounts"))?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn delete(&self, cx: &mut PgWorkContext, id: AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(cx.conn())
            .await
            .map_err(|err| match LedgerError::from(err) {
                LedgerError::Conflict(_) => {
                    LedgerError::Conflict(format!("account {id} still owns content"))
                }
                other => other.context("Failed to delete account"),
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_fields(
        &self,
        cx: &mut PgWorkContext,
        id: AccountId,
        fields: &AccountFields,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = COALESCE($2, password_hash),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(fields.password_hash.as_deref())
        .bind(fields.email.as_deref())
        .execute(cx.conn())
        .await
        .map_err(db_error("Failed to update account"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn adjust_credit(
        &self,
        cx: &mut PgWorkContext,
        id: AccountId,
        delta: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET credit = credit + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(delta)
        .execute(cx.conn())
        .await
        .map_err(db_error("Failed to adjust credit"))?;

        Ok(result.rows_affected() > 0)
    }
}
