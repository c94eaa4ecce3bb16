use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ModelError;
use crate::ids::{AccountId, ContentId};

/// Category of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FileType {
    Font,
    Text,
    Image,
    Audio,
    Video,
    Spreadsheet,
    Presentation,
    Document,
    Archive,
    Application,
}

impl FileType {
    pub const ALL: [FileType; 10] = [
        FileType::Font,
        FileType::Text,
        FileType::Image,
        FileType::Audio,
        FileType::Video,
        FileType::Spreadsheet,
        FileType::Presentation,
        FileType::Document,
        FileType::Archive,
        FileType::Application,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Font => "font",
            FileType::Text => "text",
            FileType::Image => "image",
            FileType::Audio => "audio",
            FileType::Video => "video",
            FileType::Spreadsheet => "spreadsheet",
            FileType::Presentation => "presentation",
            FileType::Document => "document",
            FileType::Archive => "archive",
            FileType::Application => "application",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::UnknownFileType(s.to_string()))
    }
}

/// Metadata for a shared file. The bytes themselves live in the external
/// object store under `cid`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Content {
    pub id: ContentId,
    pub cid: String,
    pub name: String,
    pub description: String,
    pub extension: String,
    pub file_type: FileType,
    pub uploader_id: AccountId,
    pub downloads: i64,
    /// Average of per-download ratings, maintained by the store.
    pub rating: f32,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Upload request. The owner is always the authenticated actor.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct NewContent {
    pub cid: String,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
    pub extension: String,
    pub file_type: FileType,
    pub size: i64,
}

/// Proof that `account_id` has paid for `content_id`, plus the optional
/// review left afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DownloadRecord {
    pub account_id: AccountId,
    pub content_id: ContentId,
    pub comment: Option<String>,
    pub rating: Option<f32>,
    pub comment_time: Option<DateTime<Utc>>,
    pub downloaded_at: DateTime<Utc>,
}

impl DownloadRecord {
    pub fn new(account_id: AccountId, content_id: ContentId) -> Self {
        Self {
            account_id,
            content_id,
            comment: None,
            rating: None,
            comment_time: None,
            downloaded_at: Utc::now(),
        }
    }

    pub fn has_review(&self) -> bool {
        self.comment.is_some() || self.rating.is_some()
    }
}

/// Public view of a review, joined with the reviewer's username.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Comment {
    pub username: String,
    pub rating: Option<f32>,
    pub comment_text: Option<String>,
    pub comment_time: Option<DateTime<Utc>>,
}
