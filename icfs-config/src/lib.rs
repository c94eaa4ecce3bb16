//! Shared configuration library for icfs.
//!
//! Configuration is composed from, highest precedence first: the process
//! environment, an optional `.env` file, an optional TOML file, and the
//! built-in defaults in [`constants`]. Loading validates the result and
//! reports non-fatal concerns (such as default secrets) as
//! [`ConfigWarnings`].

pub mod constants;
pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    AuthConfig, Config, ConfigMetadata, DatabaseConfig, RedisConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
