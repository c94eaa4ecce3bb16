use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use icfs_config::{
    ConfigGuardRailError, ConfigLoadError, ConfigLoader, ConfigWarning,
    EnvConfig,
};
use tempfile::NamedTempFile;

fn env_from(pairs: &[(&str, &str)]) -> EnvConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvConfig::from_lookup(|name| map.get(name).cloned())
}

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write toml");
    file
}

#[test]
fn file_values_are_used_when_env_is_silent() {
    let file = toml_file(
        r#"
        [database]
        url = "postgres://icfs:secret@db:5432/icfs"
        max_connections = 4
        work_timeout = "5s"

        [redis]
        url = "redis://cache:6379"

        [auth]
        password_pepper = "file-pepper"
        token_key = "file-token-key"
        session_ttl = "2h"
        "#,
    );

    let load = ConfigLoader::new()
        .without_env_file()
        .with_env(env_from(&[]))
        .with_config_path(file.path())
        .load()
        .expect("config loads");

    let config = load.config;
    assert_eq!(
        config.database.url.as_deref(),
        Some("postgres://icfs:secret@db:5432/icfs")
    );
    assert_eq!(config.database.max_connections, 4);
    assert_eq!(config.database.work_timeout, Duration::from_secs(5));
    assert_eq!(config.redis.unwrap().url, "redis://cache:6379");
    assert_eq!(config.auth.session_ttl, Duration::from_secs(7200));
    assert_eq!(config.metadata.config_path.as_deref(), Some(file.path()));
    assert!(load.warnings.is_empty());
}

#[test]
fn environment_overrides_the_file() {
    let file = toml_file(
        r#"
        [auth]
        password_pepper = "file-pepper"
        token_key = "file-token-key"
        session_ttl = "2h"
        "#,
    );

    let load = ConfigLoader::new()
        .without_env_file()
        .with_env(env_from(&[
            ("AUTH_TOKEN_KEY", "env-token-key"),
            ("ICFS_SESSION_TTL", "30m"),
            ("DATABASE_URL", "postgresql://localhost/icfs"),
        ]))
        .with_config_path(file.path())
        .load()
        .expect("config loads");

    assert_eq!(load.config.auth.token_key, "env-token-key");
    assert_eq!(load.config.auth.password_pepper, "file-pepper");
    assert_eq!(load.config.auth.session_ttl, Duration::from_secs(1800));
}

#[test]
fn default_secrets_only_warn() {
    let load = ConfigLoader::new()
        .without_env_file()
        .with_env(env_from(&[]))
        .load()
        .expect("defaults are loadable");

    assert!(load.warnings.contains(&ConfigWarning::DefaultPasswordPepper));
    assert!(load.warnings.contains(&ConfigWarning::DefaultTokenKey));
    assert!(load.warnings.contains(&ConfigWarning::MissingDatabaseUrl));
    assert!(load.warnings.contains(&ConfigWarning::InMemorySessions));
}

#[test]
fn empty_pepper_in_file_is_a_hard_error() {
    let file = toml_file(
        r#"
        [auth]
        password_pepper = ""
        "#,
    );

    let err = ConfigLoader::new()
        .without_env_file()
        .with_env(env_from(&[]))
        .with_config_path(file.path())
        .load()
        .unwrap_err();

    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::EmptyPasswordPepper)
    ));
}

#[test]
fn zero_ttl_is_rejected() {
    let err = ConfigLoader::new()
        .without_env_file()
        .with_env(env_from(&[("ICFS_SESSION_TTL", "0s")]))
        .load()
        .unwrap_err();

    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::ZeroSessionTtl)
    ));
}

#[test]
fn non_postgres_database_urls_are_rejected() {
    let err = ConfigLoader::new()
        .without_env_file()
        .with_env(env_from(&[("DATABASE_URL", "mysql://localhost/icfs")]))
        .load()
        .unwrap_err();

    assert!(matches!(err, ConfigLoadError::UnsupportedScheme { .. }));
}

#[test]
fn missing_config_file_reports_its_path() {
    let err = ConfigLoader::new()
        .without_env_file()
        .with_env(env_from(&[]))
        .with_config_path("/definitely/not/here/icfs.toml")
        .load()
        .unwrap_err();

    assert!(err.to_string().contains("/definitely/not/here/icfs.toml"));
}
