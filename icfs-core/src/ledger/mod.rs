//! Credit ledger: uploads earn credit, downloads move it from the
//! downloader to the uploader, at most once per (account, content) pair.

mod service;
mod validation;

pub use service::{LedgerService, LedgerSettings};
pub use validation::{EXTENSION_MAX_CHARS, NAME_MAX_CHARS, RATING_MAX, RATING_MIN};
