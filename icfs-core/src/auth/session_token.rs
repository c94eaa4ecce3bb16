use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::LedgerError;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum SessionTokenError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Token generation failed")]
    GenerationFailed,
}

impl From<SessionTokenError> for LedgerError {
    fn from(err: SessionTokenError) -> Self {
        match err {
            SessionTokenError::InvalidFormat => {
                LedgerError::Unauthorized("invalid session".into())
            }
            SessionTokenError::GenerationFailed => {
                LedgerError::Internal(err.to_string())
            }
        }
    }
}

/// Opaque bearer credential: 256 random bits, URL-safe base64 without
/// padding. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionToken {
    value: String,
}

impl SessionToken {
    pub fn generate() -> Result<Self, SessionTokenError> {
        let mut token_bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut token_bytes)
            .map_err(|_| SessionTokenError::GenerationFailed)?;

        let value = URL_SAFE_NO_PAD.encode(token_bytes);
        token_bytes.zeroize();
        Ok(Self { value })
    }

    /// Parse a token presented by a client. Anything that is not a
    /// 32-byte URL-safe base64 string is rejected before touching the store.
    pub fn parse(value: &str) -> Result<Self, SessionTokenError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| SessionTokenError::InvalidFormat)?;
        if decoded.len() != TOKEN_BYTES {
            return Err(SessionTokenError::InvalidFormat);
        }
        Ok(Self {
            value: value.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only show first 8 chars
        let preview = self.value.get(..8).unwrap_or(&self.value);
        write!(f, "{}...", preview)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&self.to_string()).finish()
    }
}
