use async_trait::async_trait;
use chrono::{DateTime, Utc};
use icfs_model::{
    AccountId, Comment, Content, ContentId, ContentPatch, DownloadRecord,
};

use crate::error::Result;
use crate::ports::WorkContext;

/// Review columns written onto an existing download record. `None` leaves
/// the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewUpdate {
    pub rating: Option<f32>,
    pub comment: Option<String>,
    pub comment_time: Option<DateTime<Utc>>,
}

// Content metadata, download records and reviews
#[async_trait]
pub trait ContentStore<C: WorkContext>: Send + Sync {
    /// Fails with `Conflict` when the CID is already registered.
    async fn insert(&self, cx: &mut C, content: &Content) -> Result<()>;
    async fn get_by_id(&self, cx: &mut C, id: ContentId) -> Result<Option<Content>>;

    /// Returns `false` when no such content exists. Download records of the
    /// content go with it.
    async fn delete(&self, cx: &mut C, id: ContentId) -> Result<bool>;

    /// Apply the patch and stamp `last_modified`. Returns `false` when no
    /// such content exists.
    async fn update_fields(
        &self,
        cx: &mut C,
        id: ContentId,
        patch: &ContentPatch,
        modified_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn increment_downloads(&self, cx: &mut C, id: ContentId) -> Result<bool>;

    async fn get_download_record(
        &self,
        cx: &mut C,
        account: AccountId,
        content: ContentId,
    ) -> Result<Option<DownloadRecord>>;

    /// Idempotent per (account, content): returns `false` instead of
    /// inserting a second record.
    async fn insert_download_record(
        &self,
        cx: &mut C,
        record: &DownloadRecord,
    ) -> Result<bool>;

    /// Returns `false` when the pair has no download record. The store keeps
    /// the content's average rating in step with per-record ratings.
    async fn update_download_record(
        &self,
        cx: &mut C,
        account: AccountId,
        content: ContentId,
        update: &ReviewUpdate,
    ) -> Result<bool>;

    async fn text_search(&self, cx: &mut C, term: &str) -> Result<Vec<Content>>;
    async fn list_all(&self, cx: &mut C) -> Result<Vec<Content>>;
    async fn list_by_uploader(
        &self,
        cx: &mut C,
        uploader: AccountId,
    ) -> Result<Vec<Content>>;

    /// Contents the account holds a download record for.
    async fn list_downloads(
        &self,
        cx: &mut C,
        account: AccountId,
    ) -> Result<Vec<Content>>;

    /// Reviews on the content, newest first.
    async fn list_comments(&self, cx: &mut C, content: ContentId) -> Result<Vec<Comment>>;
}
