//! Password hashing, session tokens, and the account/session service.

pub mod crypto;
pub mod service;
pub mod session_token;

pub use crypto::{AuthCrypto, AuthCryptoError};
pub use service::{AuthService, AuthSettings, Authenticated};
pub use session_token::{SessionToken, SessionTokenError};
