//! Explicit field patches for partial updates.
//!
//! Each patch lists exactly the fields a caller may change. Decoding a
//! payload into a patch ignores every other key, so attempts to smuggle in
//! fields such as `credit` or `uploader_id` are dropped at the boundary.

use std::fmt;

/// Mutable account fields.
#[derive(Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct AccountPatch {
    #[cfg_attr(feature = "serde", serde(default))]
    pub password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub email: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.email.is_none()
    }
}

impl fmt::Debug for AccountPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountPatch")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("email", &self.email)
            .finish()
    }
}

/// Mutable content fields.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct ContentPatch {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Rating and/or comment left on a downloaded item.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct ReviewPatch {
    #[cfg_attr(feature = "serde", serde(default))]
    pub rating: Option<f32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub comment: Option<String>,
}

impl ReviewPatch {
    pub fn rating(rating: f32) -> Self {
        Self {
            rating: Some(rating),
            comment: None,
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            rating: None,
            comment: Some(text.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.comment.is_none()
    }
}
