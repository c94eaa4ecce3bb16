//! Core data model definitions shared across icfs crates.
#![allow(missing_docs)]

pub mod account;
pub mod content;
pub mod error;
pub mod ids;
pub mod patch;

// Intentionally curated re-exports for downstream consumers.
pub use account::{Account, NewAccount};
pub use content::{Comment, Content, DownloadRecord, FileType, NewContent};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{AccountId, ContentId};
pub use patch::{AccountPatch, ContentPatch, ReviewPatch};

/// Maximum number of characters kept from a content description.
pub const DESCRIPTION_MAX_CHARS: usize = 200;

/// Truncate a description to [`DESCRIPTION_MAX_CHARS`] characters.
///
/// Truncation counts Unicode scalar values, never splitting a character.
pub fn truncate_description(description: &str) -> String {
    match description.char_indices().nth(DESCRIPTION_MAX_CHARS) {
        Some((byte_idx, _)) => description[..byte_idx].to_string(),
        None => description.to_string(),
    }
}
