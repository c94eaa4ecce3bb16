use std::fmt;

use thiserror::Error;

use crate::models::Config;

/// Hard failures: the configuration cannot be used as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("AUTH_PASSWORD_PEPPER must not be empty")]
    EmptyPasswordPepper,
    #[error("AUTH_TOKEN_KEY must not be empty")]
    EmptyTokenKey,
    #[error("session TTL must be greater than zero")]
    ZeroSessionTtl,
    #[error("work timeout must be greater than zero")]
    ZeroWorkTimeout,
    #[error("database pool needs at least one connection")]
    ZeroMaxConnections,
    #[error("password hashing needs at least one iteration")]
    ZeroHashIterations,
}

/// Soft findings surfaced to operators at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    DefaultPasswordPepper,
    DefaultTokenKey,
    MissingDatabaseUrl,
    InMemorySessions,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::DefaultPasswordPepper => {
                f.write_str("using the default password pepper")
            }
            ConfigWarning::DefaultTokenKey => {
                f.write_str("using the default session token key")
            }
            ConfigWarning::MissingDatabaseUrl => {
                f.write_str("no DATABASE_URL configured")
            }
            ConfigWarning::InMemorySessions => f.write_str(
                "REDIS_URL unset; sessions are kept in process memory",
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings(Vec<ConfigWarning>);

impl ConfigWarnings {
    pub fn push(&mut self, warning: ConfigWarning) {
        self.0.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, warning: &ConfigWarning) -> bool {
        self.0.contains(warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.0.iter()
    }
}

pub fn validate(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let auth = &config.auth;
    if auth.password_pepper.trim().is_empty() {
        return Err(ConfigGuardRailError::EmptyPasswordPepper);
    }
    if auth.token_key.trim().is_empty() {
        return Err(ConfigGuardRailError::EmptyTokenKey);
    }
    if auth.session_ttl.is_zero() {
        return Err(ConfigGuardRailError::ZeroSessionTtl);
    }
    if auth.hash_iterations == 0 {
        return Err(ConfigGuardRailError::ZeroHashIterations);
    }
    if config.database.work_timeout.is_zero() {
        return Err(ConfigGuardRailError::ZeroWorkTimeout);
    }
    if config.database.max_connections == 0 {
        return Err(ConfigGuardRailError::ZeroMaxConnections);
    }

    let mut warnings = ConfigWarnings::default();
    if auth.is_default_pepper() {
        warnings.push(ConfigWarning::DefaultPasswordPepper);
    }
    if auth.is_default_token_key() {
        warnings.push(ConfigWarning::DefaultTokenKey);
    }
    if config.database.url.is_none() {
        warnings.push(ConfigWarning::MissingDatabaseUrl);
    }
    if config.redis.is_none() {
        warnings.push(ConfigWarning::InMemorySessions);
    }
    Ok(warnings)
}
