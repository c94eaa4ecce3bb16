use std::time::Duration;

/// Placeholder pepper shipped for local development only.
pub const DEFAULT_PASSWORD_PEPPER: &str = "change-me-password-pepper";

/// Placeholder HMAC key for session tokens, local development only.
pub const DEFAULT_TOKEN_KEY: &str = "change-me-hmac-key";

/// Lifetime of a session token.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a single unit of work.
pub const DEFAULT_WORK_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Argon2id memory cost in KiB (64 MiB).
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 64 * 1024;

pub const DEFAULT_HASH_ITERATIONS: u32 = 3;

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_VAR: &str = "ICFS_CONFIG";
