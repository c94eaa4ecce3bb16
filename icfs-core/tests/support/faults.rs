//! Content store wrappers that misbehave on request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use icfs_core::error::{LedgerError, Result};
use icfs_core::infrastructure::memory::{MemoryContentStore, MemoryWorkContext};
use icfs_core::model::{
    AccountId, Comment, Content, ContentId, ContentPatch, DownloadRecord,
};
use icfs_core::ports::{ContentStore, ReviewUpdate};

/// Which step should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Insert,
    Delete,
    IncrementDownloads,
    InsertDownloadRecord,
    /// Report the download record as already present on insert.
    DuplicateDownloadRecord,
    /// Stall every content lookup.
    SlowLookup(Duration),
}

#[derive(Debug)]
pub struct FaultyContentStore {
    inner: MemoryContentStore,
    fault: Fault,
    armed: AtomicBool,
}

impl FaultyContentStore {
    pub fn new(fault: Fault) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryContentStore,
            fault,
            armed: AtomicBool::new(false),
        })
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn trips(&self, fault: Fault) -> bool {
        self.fault == fault && self.armed.load(Ordering::SeqCst)
    }
}

fn injected() -> LedgerError {
    LedgerError::Internal("injected failure".into())
}

#[async_trait]
impl ContentStore<MemoryWorkContext> for FaultyContentStore {
    async fn insert(&self, cx: &mut MemoryWorkContext, content: &Content) -> Result<()> {
        self.inner.insert(cx, content).await?;
        if self.trips(Fault::Insert) {
            return Err(injected());
        }
        Ok(())
    }

    async fn get_by_id(
        &self,
        cx: &mut MemoryWorkContext,
        id: ContentId,
    ) -> Result<Option<Content>> {
        if let Fault::SlowLookup(delay) = self.fault
            && self.armed.load(Ordering::SeqCst)
        {
            tokio::time::sleep(delay).await;
        }
        self.inner.get_by_id(cx, id).await
    }

    async fn delete(&self, cx: &mut MemoryWorkContext, id: ContentId) -> Result<bool> {
        if self.trips(Fault::Delete) {
            return Err(injected());
        }
        self.inner.delete(cx, id).await
    }

    async fn update_fields(
        &self,
        cx: &mut MemoryWorkContext,
        id: ContentId,
        patch: &ContentPatch,
        modified_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.update_fields(cx, id, patch, modified_at).await
    }

    async fn increment_downloads(
        &self,
        cx: &mut MemoryWorkContext,
        id: ContentId,
    ) -> Result<bool> {
        if self.trips(Fault::IncrementDownloads) {
            return Err(injected());
        }
        self.inner.increment_downloads(cx, id).await
    }

    async fn get_download_record(
        &self,
        cx: &mut MemoryWorkContext,
        account: AccountId,
        content: ContentId,
    ) -> Result<Option<DownloadRecord>> {
        self.inner.get_download_record(cx, account, content).await
    }

    async fn insert_download_record(
        &self,
        cx: &mut MemoryWorkContext,
        record: &DownloadRecord,
    ) -> Result<bool> {
        if self.trips(Fault::InsertDownloadRecord) {
            return Err(injected());
        }
        if self.trips(Fault::DuplicateDownloadRecord) {
            return Ok(false);
        }
        self.inner.insert_download_record(cx, record).await
    }

    async fn update_download_record(
        &self,
        cx: &mut MemoryWorkContext,
        account: AccountId,
        content: ContentId,
        update: &ReviewUpdate,
    ) -> Result<bool> {
        self.inner
            .update_download_record(cx, account, content, update)
            .await
    }

    async fn text_search(&self, cx: &mut MemoryWorkContext, term: &str) -> Result<Vec<Content>> {
        self.inner.text_search(cx, term).await
    }

    async fn list_all(&self, cx: &mut MemoryWorkContext) -> Result<Vec<Content>> {
        self.inner.list_all(cx).await
    }

    async fn list_by_uploader(
        &self,
        cx: &mut MemoryWorkContext,
        uploader: AccountId,
    ) -> Result<Vec<Content>> {
        self.inner.list_by_uploader(cx, uploader).await
    }

    async fn list_downloads(
        &self,
        cx: &mut MemoryWorkContext,
        account: AccountId,
    ) -> Result<Vec<Content>> {
        self.inner.list_downloads(cx, account).await
    }

    async fn list_comments(
        &self,
        cx: &mut MemoryWorkContext,
        content: ContentId,
    ) -> Result<Vec<Comment>> {
        self.inner.list_comments(cx, content).await
    }
}
