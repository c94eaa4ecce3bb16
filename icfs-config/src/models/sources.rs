use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::non_empty;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub database: FileDatabaseConfig,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub auth: FileAuthConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    /// Humantime duration, e.g. `"30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_pepper: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_memory_kib: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_iterations: Option<u32>,
}

/// Environment-derived configuration values, still unparsed.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<String>,
    pub work_timeout: Option<String>,
    pub redis_url: Option<String>,
    pub auth_password_pepper: Option<String>,
    pub auth_token_key: Option<String>,
    pub session_ttl: Option<String>,
    pub hash_memory_kib: Option<String>,
    pub hash_iterations: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary lookup, e.g. a fixed map in tests.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(lookup(name));
        Self {
            config_path: var(crate::constants::CONFIG_PATH_VAR)
                .map(PathBuf::from),
            database_url: var("DATABASE_URL"),
            database_max_connections: var("ICFS_DB_MAX_CONNECTIONS"),
            work_timeout: var("ICFS_WORK_TIMEOUT"),
            redis_url: var("REDIS_URL"),
            auth_password_pepper: var("AUTH_PASSWORD_PEPPER"),
            auth_token_key: var("AUTH_TOKEN_KEY"),
            session_ttl: var("ICFS_SESSION_TTL"),
            hash_memory_kib: var("ICFS_HASH_MEMORY_KIB"),
            hash_iterations: var("ICFS_HASH_ITERATIONS"),
        }
    }
}
