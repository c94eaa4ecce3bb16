pub mod error;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::constants::{
    DEFAULT_HASH_ITERATIONS, DEFAULT_HASH_MEMORY_KIB, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_PASSWORD_PEPPER, DEFAULT_SESSION_TTL, DEFAULT_TOKEN_KEY,
    DEFAULT_WORK_TIMEOUT,
};
use crate::models::sources::{EnvConfig, FileConfig};
use crate::models::{
    AuthConfig, Config, ConfigMetadata, DatabaseConfig, RedisConfig,
};
use crate::util::{parse_duration, parse_number};
use crate::validation::{ConfigWarnings, validate};

use error::ConfigLoadError;

/// Result of a successful load: the effective config plus soft warnings.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

/// Composes a [`Config`] from env, `.env`, TOML and defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
    skip_env_file: bool,
    env: Option<EnvConfig>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit TOML path; wins over `ICFS_CONFIG`.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Load this `.env` file instead of searching the working directory.
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn without_env_file(mut self) -> Self {
        self.skip_env_file = true;
        self
    }

    /// Use a prepared environment snapshot instead of the process env.
    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.env = Some(env);
        self
    }

    pub fn load(self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        let env = self.env.clone().unwrap_or_else(EnvConfig::gather);

        let config_path = self.config_path.clone().or(env.config_path.clone());
        let file = match config_path.as_deref() {
            Some(path) => read_file_config(path)?,
            None => FileConfig::default(),
        };

        let config = compose(
            &env,
            &file,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )?;
        let warnings = validate(&config)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        if self.skip_env_file {
            return Ok(false);
        }
        match self.env_file.as_ref() {
            Some(path) => dotenvy::from_path(path)
                .map(|_| true)
                .map_err(|source| ConfigLoadError::EnvFile {
                    path: path.clone(),
                    source,
                }),
            None => Ok(dotenvy::dotenv().is_ok()),
        }
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    debug!("reading config file {}", path.display());
    let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigLoadError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge one env snapshot over one file config, falling back to defaults.
pub fn compose(
    env: &EnvConfig,
    file: &FileConfig,
    metadata: ConfigMetadata,
) -> Result<Config, ConfigLoadError> {
    let database_url = env
        .database_url
        .clone()
        .or_else(|| file.database.url.clone())
        .map(|url| check_url("DATABASE_URL", &url, &["postgres", "postgresql"]))
        .transpose()?;

    let max_connections = match env.database_max_connections.as_deref() {
        Some(raw) => parse_number("ICFS_DB_MAX_CONNECTIONS", raw)?,
        None => file
            .database
            .max_connections
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    };

    let work_timeout = match env
        .work_timeout
        .as_deref()
        .or(file.database.work_timeout.as_deref())
    {
        Some(raw) => parse_duration("ICFS_WORK_TIMEOUT", raw)?,
        None => DEFAULT_WORK_TIMEOUT,
    };

    let redis = env
        .redis_url
        .clone()
        .or_else(|| file.redis.as_ref().map(|r| r.url.clone()))
        .map(|url| check_url("REDIS_URL", &url, &["redis", "rediss"]))
        .transpose()?
        .map(|url| RedisConfig { url });

    let session_ttl = match env
        .session_ttl
        .as_deref()
        .or(file.auth.session_ttl.as_deref())
    {
        Some(raw) => parse_duration("ICFS_SESSION_TTL", raw)?,
        None => DEFAULT_SESSION_TTL,
    };

    let hash_memory_kib = match env.hash_memory_kib.as_deref() {
        Some(raw) => parse_number("ICFS_HASH_MEMORY_KIB", raw)?,
        None => file.auth.hash_memory_kib.unwrap_or(DEFAULT_HASH_MEMORY_KIB),
    };
    let hash_iterations = match env.hash_iterations.as_deref() {
        Some(raw) => parse_number("ICFS_HASH_ITERATIONS", raw)?,
        None => file.auth.hash_iterations.unwrap_or(DEFAULT_HASH_ITERATIONS),
    };

    let auth = AuthConfig {
        password_pepper: env
            .auth_password_pepper
            .clone()
            .or_else(|| file.auth.password_pepper.clone())
            .unwrap_or_else(|| DEFAULT_PASSWORD_PEPPER.to_string()),
        token_key: env
            .auth_token_key
            .clone()
            .or_else(|| file.auth.token_key.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_KEY.to_string()),
        session_ttl,
        hash_memory_kib,
        hash_iterations,
    };

    Ok(Config {
        database: DatabaseConfig {
            url: database_url,
            max_connections,
            work_timeout,
        },
        redis,
        auth,
        metadata,
    })
}

fn check_url(
    key: &'static str,
    raw: &str,
    expected: &'static [&'static str],
) -> Result<String, ConfigLoadError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|source| ConfigLoadError::InvalidUrl { key, source })?;
    if !expected.contains(&parsed.scheme()) {
        return Err(ConfigLoadError::UnsupportedScheme {
            key,
            scheme: parsed.scheme().to_string(),
            expected,
        });
    }
    Ok(trimmed.to_string())
}
