//! PostgreSQL unit of work and stores.
//!
//! A [`PgWorkContext`] owns one `sqlx` transaction. Every store call made
//! with it runs on that transaction's connection; dropping the context
//! without committing rolls the transaction back.

mod accounts;
mod contents;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::ports::{UnitOfWork, WorkContext};

pub use accounts::PostgresAccountStore;
pub use contents::PostgresContentStore;

/// Wrap a `sqlx` error with the failing step.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> LedgerError {
    move |err| LedgerError::from(err).context(context)
}

#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
    statement_timeout: Duration,
}

impl fmt::Debug for PgUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgUnitOfWork")
            .field("pool_size", &self.pool.size())
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

impl PgUnitOfWork {
    /// `statement_timeout` is applied to every transaction with
    /// `SET LOCAL` semantics, so it never leaks onto pooled connections.
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    type Context = PgWorkContext;

    async fn begin(&self) -> Result<PgWorkContext> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        sqlx::query("SELECT set_config('statement_timeout', $1, true)")
            .bind(format!("{}ms", self.statement_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to set statement timeout"))?;

        Ok(PgWorkContext { tx })
    }
}

pub struct PgWorkContext {
    tx: Transaction<'static, Postgres>,
}

impl fmt::Debug for PgWorkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgWorkContext").finish_non_exhaustive()
    }
}

impl PgWorkContext {
    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

#[async_trait]
impl WorkContext for PgWorkContext {
    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| LedgerError::Internal(format!("Failed to commit transaction: {}", e)))
    }

    async fn rollback(self) -> Result<()> {
        debug!("rolling back unit of work");
        self.tx
            .rollback()
            .await
            .map_err(|e| LedgerError::Internal(format!("Failed to roll back transaction: {}", e)))
    }
}
