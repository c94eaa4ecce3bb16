use std::time::Duration;

use crate::loader::error::ConfigLoadError;

/// Parse a human readable duration such as `24h` or `500ms`.
pub fn parse_duration(
    key: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|source| {
        ConfigLoadError::InvalidDuration {
            key,
            value: raw.to_string(),
            source,
        }
    })
}

pub fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    raw: &str,
) -> Result<T, ConfigLoadError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigLoadError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}

/// Mask the password of a connection URL for display.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable>".to_string(),
    }
}

/// Treat empty and whitespace-only values as unset.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
