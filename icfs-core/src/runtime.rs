use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use icfs_config::Config;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::{info, warn};

use crate::MIGRATOR;
use crate::auth::{AuthCrypto, AuthCryptoError, AuthService, AuthSettings};
use crate::error::LedgerError;
use crate::infrastructure::memory::MemorySessionStore;
use crate::infrastructure::postgres::{
    PgUnitOfWork, PgWorkContext, PostgresAccountStore, PostgresContentStore,
};
use crate::infrastructure::redis::RedisSessionStore;
use crate::ledger::{LedgerService, LedgerSettings};
use crate::ports::{AccountStore, ContentStore, SessionStore};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("DATABASE_URL is not configured")]
    MissingDatabaseUrl,
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("invalid auth configuration: {0}")]
    Crypto(#[from] AuthCryptoError),
    #[error("session store unavailable: {0}")]
    Sessions(LedgerError),
}

/// Where sessions live for this process.
#[derive(Debug, Clone)]
pub enum SessionBackend {
    Redis(Arc<RedisSessionStore>),
    Memory(Arc<MemorySessionStore>),
}

impl SessionBackend {
    fn store(&self) -> Arc<dyn SessionStore> {
        match self {
            SessionBackend::Redis(store) => Arc::clone(store) as Arc<dyn SessionStore>,
            SessionBackend::Memory(store) => Arc::clone(store) as Arc<dyn SessionStore>,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SessionBackend::Redis(_) => "redis",
            SessionBackend::Memory(_) => "memory",
        }
    }
}

/// Connected services built from one [`Config`].
pub struct LedgerRuntime {
    pool: PgPool,
    sessions: SessionBackend,
    auth: AuthService<PgUnitOfWork>,
    ledger: LedgerService<PgUnitOfWork>,
}

impl fmt::Debug for LedgerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerRuntime")
            .field("pool_size", &self.pool.size())
            .field("sessions", &self.sessions.describe())
            .finish()
    }
}

/// Open the configured Postgres pool without touching the schema.
pub async fn connect_pool(config: &Config) -> Result<PgPool, RuntimeError> {
    let url = config
        .database
        .url
        .as_deref()
        .ok_or(RuntimeError::MissingDatabaseUrl)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.work_timeout)
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(url)
        .await?;

    info!(
        "Database pool initialized with max_connections={}",
        config.database.max_connections
    );
    Ok(pool)
}

/// Apply the embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), RuntimeError> {
    MIGRATOR.run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

async fn connect_sessions(config: &Config) -> Result<SessionBackend, RuntimeError> {
    match &config.redis {
        Some(redis) => {
            let store = RedisSessionStore::connect(&redis.url)
                .await
                .map_err(RuntimeError::Sessions)?;
            Ok(SessionBackend::Redis(Arc::new(store)))
        }
        None => {
            warn!("No Redis configured; sessions will not survive a restart");
            Ok(SessionBackend::Memory(Arc::new(MemorySessionStore::new())))
        }
    }
}

impl LedgerRuntime {
    /// Connect, migrate and wire both services.
    pub async fn connect(config: &Config) -> Result<Self, RuntimeError> {
        let pool = connect_pool(config).await?;
        migrate(&pool).await?;
        let sessions = connect_sessions(config).await?;

        let crypto = Arc::new(AuthCrypto::with_cost(
            &config.auth.password_pepper,
            &config.auth.token_key,
            config.auth.hash_memory_kib,
            config.auth.hash_iterations,
        )?);

        let work = Arc::new(PgUnitOfWork::new(
            pool.clone(),
            config.database.work_timeout,
        ));
        let accounts: Arc<dyn AccountStore<PgWorkContext>> =
            Arc::new(PostgresAccountStore::new());
        let contents: Arc<dyn ContentStore<PgWorkContext>> =
            Arc::new(PostgresContentStore::new());

        let auth = AuthService::new(
            work.clone(),
            accounts.clone(),
            sessions.store(),
            crypto,
            AuthSettings {
                session_ttl: config.auth.session_ttl,
                work_timeout: config.database.work_timeout,
            },
        );
        let ledger = LedgerService::new(
            work,
            accounts,
            contents,
            LedgerSettings {
                work_timeout: config.database.work_timeout,
            },
        );

        info!(sessions = sessions.describe(), "ledger runtime ready");
        Ok(Self {
            pool,
            sessions,
            auth,
            ledger,
        })
    }

    pub fn auth(&self) -> &AuthService<PgUnitOfWork> {
        &self.auth
    }

    pub fn ledger(&self) -> &LedgerService<PgUnitOfWork> {
        &self.ledger
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn sessions(&self) -> &SessionBackend {
        &self.sessions
    }

    /// Round-trip both the database and the session store.
    pub async fn check(&self) -> Result<(), RuntimeError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        if let SessionBackend::Redis(store) = &self.sessions {
            store.ping().await.map_err(RuntimeError::Sessions)?;
        }
        Ok(())
    }

    pub async fn shutdown(self) {
        self.pool.close().await;
        info!("ledger runtime stopped");
    }
}
