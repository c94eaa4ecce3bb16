use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use icfs_model::{
    AccountId, Comment, Content, ContentId, ContentPatch, DownloadRecord,
    NewContent, ReviewPatch, truncate_description,
};
use tracing::{debug, info, warn};

use super::validation::{check_content_patch, check_new_content, check_review};
use crate::error::{LedgerError, Result, ResultExt};
use crate::ports::{
    AccountStore, ContentStore, ReviewUpdate, UnitOfWork, WorkContext, bounded,
};

#[derive(Debug, Clone, Copy)]
pub struct LedgerSettings {
    /// Upper bound on each operation, store round-trips included.
    pub work_timeout: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            work_timeout: Duration::from_secs(30),
        }
    }
}

/// Content registration, access grants, ownership-gated edits and reviews.
///
/// Callers pass an actor id that has already been resolved through
/// [`crate::auth::AuthService::validate`]. Each mutating operation runs in
/// one unit of work and commits only once every step has succeeded.
pub struct LedgerService<U: UnitOfWork> {
    work: Arc<U>,
    accounts: Arc<dyn AccountStore<U::Context>>,
    contents: Arc<dyn ContentStore<U::Context>>,
    settings: LedgerSettings,
}

impl<U: UnitOfWork> fmt::Debug for LedgerService<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerService")
            .field("accounts_refs", &Arc::strong_count(&self.accounts))
            .field("contents_refs", &Arc::strong_count(&self.contents))
            .field("settings", &self.settings)
            .finish()
    }
}

impl<U: UnitOfWork> Clone for LedgerService<U> {
    fn clone(&self) -> Self {
        Self {
            work: Arc::clone(&self.work),
            accounts: Arc::clone(&self.accounts),
            contents: Arc::clone(&self.contents),
            settings: self.settings,
        }
    }
}

impl<U: UnitOfWork> LedgerService<U> {
    pub fn new(
        work: Arc<U>,
        accounts: Arc<dyn AccountStore<U::Context>>,
        contents: Arc<dyn ContentStore<U::Context>>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            work,
            accounts,
            contents,
            settings,
        }
    }

    /// Record an upload owned by `actor` and credit the actor with its size.
    pub async fn register_content(
        &self,
        actor: AccountId,
        upload: NewContent,
    ) -> Result<ContentId> {
        bounded(
            self.settings.work_timeout,
            "register_content",
            self.register_content_inner(actor, upload),
        )
        .await
    }

    async fn register_content_inner(
        &self,
        actor: AccountId,
        upload: NewContent,
    ) -> Result<ContentId> {
        check_new_content(&upload)?;

        let now = Utc::now();
        let content = Content {
            id: ContentId::new(),
            cid: upload.cid,
            name: upload.name,
            description: truncate_description(&upload.description),
            extension: upload.extension,
            file_type: upload.file_type,
            uploader_id: actor,
            downloads: 0,
            rating: 0.0,
            size: upload.size,
            uploaded_at: now,
            last_modified: now,
        };

        let mut cx = self.work.begin().await?;
        // Holding the uploader's row keeps it alive until the credit lands
        if self
            .accounts
            .lock_for_update(&mut cx, &[actor])
            .await
            .context("failed to lock uploader")?
            .is_empty()
        {
            debug!(account_id = %actor, "upload by unknown account rejected");
            return Err(LedgerError::NotFound(format!("account {actor}")));
        }

        self.contents
            .insert(&mut cx, &content)
            .await
            .context("failed to register content")?;
        // Uploads are credited here and again on every download
        if !self
            .accounts
            .adjust_credit(&mut cx, actor, content.size)
            .await
            .context("failed to credit uploader")?
        {
            return Err(LedgerError::Internal(format!(
                "account {actor} vanished during upload"
            )));
        }
        cx.commit().await.context("failed to register content")?;

        info!(
            content_id = %content.id,
            uploader_id = %actor,
            size = content.size,
            "content registered, uploader credited"
        );
        Ok(content.id)
    }

    /// Charge `downloader` for `content_id` and pay its uploader.
    ///
    /// A pair that has already been granted is not charged again; the
    /// content is returned as is.
    pub async fn grant_access(
        &self,
        downloader: AccountId,
        content_id: ContentId,
    ) -> Result<Content> {
        bounded(
            self.settings.work_timeout,
            "grant_access",
            self.grant_access_inner(downloader, content_id),
        )
        .await
    }

    async fn grant_access_inner(
        &self,
        downloader: AccountId,
        content_id: ContentId,
    ) -> Result<Content> {
        let mut cx = self.work.begin().await?;

        if self
            .accounts
            .get_by_id(&mut cx, downloader)
            .await
            .context("failed to load downloader")?
            .is_none()
        {
            return Err(LedgerError::NotFound(format!("account {downloader}")));
        }

        let content = self
            .contents
            .get_by_id(&mut cx, content_id)
            .await
            .context("failed to load content")?
            .ok_or_else(|| LedgerError::NotFound(format!("content {content_id}")))?;

        let uploader = content.uploader_id;
        if uploader == downloader {
            debug!(account_id = %downloader, %content_id, "self download rejected");
            return Err(LedgerError::Forbidden(
                "uploaders cannot download their own content".into(),
            ));
        }

        // Both balances are read and written under row locks taken in id
        // order, so concurrent grants touching either account serialize
        let locked = self
            .accounts
            .lock_for_update(&mut cx, &[downloader, uploader])
            .await
            .context("failed to lock accounts")?;
        let balance = locked
            .iter()
            .find(|account| account.id == downloader)
            .map(|account| account.credit)
            .ok_or_else(|| LedgerError::NotFound(format!("account {downloader}")))?;
        if !locked.iter().any(|account| account.id == uploader) {
            return Err(LedgerError::Internal(format!(
                "uploader {uploader} of content {content_id} is missing"
            )));
        }

        if self
            .contents
            .get_download_record(&mut cx, downloader, content_id)
            .await
            .context("failed to check download record")?
            .is_some()
        {
            debug!(account_id = %downloader, %content_id, "access already granted");
            cx.rollback().await?;
            return Ok(content);
        }

        if balance < content.size {
            debug!(
                account_id = %downloader,
                %content_id,
                balance,
                price = content.size,
                "insufficient credit"
            );
            return Err(LedgerError::PaymentRequired(format!(
                "content costs {} credit, balance is {}",
                content.size, balance
            )));
        }

        let price = content.size;
        let credited = self
            .accounts
            .adjust_credit(&mut cx, uploader, price)
            .await
            .context("failed to credit uploader")?;
        let debited = self
            .accounts
            .adjust_credit(&mut cx, downloader, -price)
            .await
            .context("failed to debit downloader")?;
        if !(credited && debited) {
            return Err(LedgerError::Internal(
                "account vanished during access grant".into(),
            ));
        }

        if !self
            .contents
            .increment_downloads(&mut cx, content_id)
            .await
            .context("failed to count download")?
        {
            return Err(LedgerError::NotFound(format!("content {content_id}")));
        }

        let record = DownloadRecord::new(downloader, content_id);
        if !self
            .contents
            .insert_download_record(&mut cx, &record)
            .await
            .context("failed to record download")?
        {
            warn!(
                account_id = %downloader,
                %content_id,
                "concurrent grant detected, rolling back"
            );
            cx.rollback().await?;
            return Err(LedgerError::Conflict(format!(
                "access to content {content_id} was granted concurrently"
            )));
        }

        // The counter row is locked by the increment, so this read sees
        // every grant committed before ours
        let granted = self
            .contents
            .get_by_id(&mut cx, content_id)
            .await
            .context("failed to reload content")?
            .ok_or_else(|| LedgerError::NotFound(format!("content {content_id}")))?;

        cx.commit().await.context("failed to grant access")?;

        info!(
            downloader_id = %downloader,
            uploader_id = %uploader,
            %content_id,
            amount = price,
            "access granted"
        );
        Ok(granted)
    }

    /// Remove content owned by `actor`, reversing the upload credit.
    pub async fn delete_content(
        &self,
        actor: AccountId,
        content_id: ContentId,
    ) -> Result<()> {
        bounded(
            self.settings.work_timeout,
            "delete_content",
            self.delete_content_inner(actor, content_id),
        )
        .await
    }

    async fn delete_content_inner(
        &self,
        actor: AccountId,
        content_id: ContentId,
    ) -> Result<()> {
        let mut cx = self.work.begin().await?;
        let content = self.owned_content(&mut cx, actor, content_id).await?;

        if !self
            .accounts
            .adjust_credit(&mut cx, actor, -content.size)
            .await
            .context("failed to debit uploader")?
        {
            return Err(LedgerError::NotFound(format!("account {actor}")));
        }
        if !self
            .contents
            .delete(&mut cx, content_id)
            .await
            .context("failed to delete content")?
        {
            return Err(LedgerError::NotFound(format!("content {content_id}")));
        }
        cx.commit().await.context("failed to delete content")?;

        info!(
            %content_id,
            uploader_id = %actor,
            size = content.size,
            "content deleted, upload credit reversed"
        );
        Ok(())
    }

    /// Apply an allow-listed patch to content owned by `actor`.
    pub async fn update_content(
        &self,
        actor: AccountId,
        content_id: ContentId,
        patch: ContentPatch,
    ) -> Result<Content> {
        bounded(
            self.settings.work_timeout,
            "update_content",
            self.update_content_inner(actor, content_id, patch),
        )
        .await
    }

    async fn update_content_inner(
        &self,
        actor: AccountId,
        content_id: ContentId,
        mut patch: ContentPatch,
    ) -> Result<Content> {
        check_content_patch(&patch)?;
        patch.description = patch.description.as_deref().map(truncate_description);

        let mut cx = self.work.begin().await?;
        self.owned_content(&mut cx, actor, content_id).await?;

        if !self
            .contents
            .update_fields(&mut cx, content_id, &patch, Utc::now())
            .await
            .context("failed to update content")?
        {
            return Err(LedgerError::NotFound(format!("content {content_id}")));
        }
        let updated = self
            .contents
            .get_by_id(&mut cx, content_id)
            .await
            .context("failed to reload content")?
            .ok_or_else(|| LedgerError::NotFound(format!("content {content_id}")))?;
        cx.commit().await.context("failed to update content")?;

        info!(%content_id, "content updated");
        Ok(updated)
    }

    /// Write a rating and/or comment onto the actor's download record.
    /// Only accounts that were granted access may review.
    pub async fn review(
        &self,
        actor: AccountId,
        content_id: ContentId,
        review: ReviewPatch,
    ) -> Result<()> {
        bounded(
            self.settings.work_timeout,
            "review",
            self.review_inner(actor, content_id, review),
        )
        .await
    }

    pub async fn rate(
        &self,
        actor: AccountId,
        content_id: ContentId,
        rating: f32,
    ) -> Result<()> {
        self.review(actor, content_id, ReviewPatch::rating(rating)).await
    }

    pub async fn comment(
        &self,
        actor: AccountId,
        content_id: ContentId,
        text: impl Into<String>,
    ) -> Result<()> {
        self.review(actor, content_id, ReviewPatch::comment(text)).await
    }

    async fn review_inner(
        &self,
        actor: AccountId,
        content_id: ContentId,
        review: ReviewPatch,
    ) -> Result<()> {
        check_review(&review)?;

        let mut cx = self.work.begin().await?;
        if self
            .contents
            .get_by_id(&mut cx, content_id)
            .await
            .context("failed to load content")?
            .is_none()
        {
            return Err(LedgerError::NotFound(format!("content {content_id}")));
        }

        let not_downloaded = || {
            debug!(account_id = %actor, %content_id, "review without download rejected");
            LedgerError::Forbidden(
                "only accounts that downloaded this content may review it".into(),
            )
        };
        if self
            .contents
            .get_download_record(&mut cx, actor, content_id)
            .await
            .context("failed to load download record")?
            .is_none()
        {
            return Err(not_downloaded());
        }

        let comment_time = review.comment.as_ref().map(|_| Utc::now());
        let update = ReviewUpdate {
            rating: review.rating,
            comment: review.comment,
            comment_time,
        };
        if !self
            .contents
            .update_download_record(&mut cx, actor, content_id, &update)
            .await
            .context("failed to save review")?
        {
            return Err(not_downloaded());
        }
        cx.commit().await.context("failed to save review")?;

        info!(
            account_id = %actor,
            %content_id,
            rating = ?update.rating,
            commented = update.comment.is_some(),
            "review saved"
        );
        Ok(())
    }

    pub async fn get_content(&self, content_id: ContentId) -> Result<Content> {
        bounded(self.settings.work_timeout, "get_content", async {
            let mut cx = self.work.begin().await?;
            self.contents
                .get_by_id(&mut cx, content_id)
                .await
                .context("failed to load content")?
                .ok_or_else(|| LedgerError::NotFound(format!("content {content_id}")))
        })
        .await
    }

    /// Full-text search over names and descriptions. A blank term matches
    /// nothing.
    pub async fn text_search(&self, term: &str) -> Result<Vec<Content>> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }
        bounded(self.settings.work_timeout, "text_search", async {
            let mut cx = self.work.begin().await?;
            self.contents
                .text_search(&mut cx, term)
                .await
                .context("failed to search contents")
        })
        .await
    }

    pub async fn get_all(&self) -> Result<Vec<Content>> {
        bounded(self.settings.work_timeout, "get_all", async {
            let mut cx = self.work.begin().await?;
            self.contents
                .list_all(&mut cx)
                .await
                .context("failed to list contents")
        })
        .await
    }

    pub async fn get_user_contents(&self, uploader: AccountId) -> Result<Vec<Content>> {
        bounded(self.settings.work_timeout, "get_user_contents", async {
            let mut cx = self.work.begin().await?;
            self.contents
                .list_by_uploader(&mut cx, uploader)
                .await
                .context("failed to list uploads")
        })
        .await
    }

    /// Contents `account` has been granted access to.
    pub async fn get_user_downloads(&self, account: AccountId) -> Result<Vec<Content>> {
        bounded(self.settings.work_timeout, "get_user_downloads", async {
            let mut cx = self.work.begin().await?;
            self.contents
                .list_downloads(&mut cx, account)
                .await
                .context("failed to list downloads")
        })
        .await
    }

    /// Reviews left on `content_id`, newest comment first.
    pub async fn get_comments(&self, content_id: ContentId) -> Result<Vec<Comment>> {
        bounded(self.settings.work_timeout, "get_comments", async {
            let mut cx = self.work.begin().await?;
            if self
                .contents
                .get_by_id(&mut cx, content_id)
                .await
                .context("failed to load content")?
                .is_none()
            {
                return Err(LedgerError::NotFound(format!("content {content_id}")));
            }
            self.contents
                .list_comments(&mut cx, content_id)
                .await
                .context("failed to list comments")
        })
        .await
    }

    async fn owned_content(
        &self,
        cx: &mut U::Context,
        actor: AccountId,
        content_id: ContentId,
    ) -> Result<Content> {
        let content = self
            .contents
            .get_by_id(cx, content_id)
            .await
            .context("failed to load content")?
            .ok_or_else(|| LedgerError::NotFound(format!("content {content_id}")))?;
        if content.uploader_id != actor {
            debug!(account_id = %actor, %content_id, "non-owner edit rejected");
            return Err(LedgerError::Forbidden(
                "only the uploader may modify this content".into(),
            ));
        }
        Ok(content)
    }
}
