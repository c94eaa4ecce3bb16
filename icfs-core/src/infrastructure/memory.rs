//! In-process backend.
//!
//! Units of work are fully serialized: `begin` takes an exclusive lock on
//! the shared state and works on a staged copy, which `commit` writes back.
//! Dropping a context discards the copy. This gives the same atomicity the
//! database backend gets from transactions, at the cost of concurrency, and
//! is meant for tests and single-process development.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use icfs_model::{
    Account, AccountId, Comment, Content, ContentId, ContentPatch,
    DownloadRecord,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::ports::{
    AccountFields, AccountStore, ContentStore, ReviewUpdate, SessionStore,
    UnitOfWork, WorkContext,
};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    accounts: BTreeMap<AccountId, Account>,
    contents: BTreeMap<ContentId, Content>,
    downloads: BTreeMap<(AccountId, ContentId), DownloadRecord>,
}

impl MemoryState {
    fn refresh_rating(&mut self, content_id: ContentId) {
        let ratings: Vec<f32> = self
            .downloads
            .values()
            .filter(|record| record.content_id == content_id)
            .filter_map(|record| record.rating)
            .collect();
        let average = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().sum::<f32>() / ratings.len() as f32
        };
        if let Some(content) = self.contents.get_mut(&content_id) {
            content.rating = average;
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryUnitOfWork {
    state: Arc<Mutex<MemoryState>>,
}

impl fmt::Debug for MemoryUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryUnitOfWork").finish_non_exhaustive()
    }
}

impl MemoryUnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryWorkContext {
    committed: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

impl fmt::Debug for MemoryWorkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWorkContext")
            .field("accounts", &self.staged.accounts.len())
            .field("contents", &self.staged.contents.len())
            .field("downloads", &self.staged.downloads.len())
            .finish()
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    type Context = MemoryWorkContext;

    async fn begin(&self) -> Result<MemoryWorkContext> {
        let committed = Arc::clone(&self.state).lock_owned().await;
        let staged = committed.clone();
        Ok(MemoryWorkContext { committed, staged })
    }
}

#[async_trait]
impl WorkContext for MemoryWorkContext {
    async fn commit(mut self) -> Result<()> {
        *self.committed = self.staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryAccountStore;

#[async_trait]
impl AccountStore<MemoryWorkContext> for MemoryAccountStore {
    async fn insert(
        &self,
        cx: &mut MemoryWorkContext,
        account: &Account,
        password_hash: &str,
    ) -> Result<()> {
        let state = &mut cx.staged;
        if state
            .accounts
            .values()
            .any(|existing| existing.username == account.username)
        {
            return Err(LedgerError::Conflict(format!(
                "username {} already taken",
                account.username
            )));
        }
        let mut stored = account.clone();
        stored.password_hash = Some(password_hash.to_string());
        state.accounts.insert(stored.id, stored);
        Ok(())
    }

    async fn get_by_id(
        &self,
        cx: &mut MemoryWorkContext,
        id: AccountId,
    ) -> Result<Option<Account>> {
        Ok(cx.staged.accounts.get(&id).cloned())
    }

    async fn get_by_username(
        &self,
        cx: &mut MemoryWorkContext,
        username: &str,
    ) -> Result<Option<Account>> {
        Ok(cx
            .staged
            .accounts
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn lock_for_update(
        &self,
        cx: &mut MemoryWorkContext,
        ids: &[AccountId],
    ) -> Result<Vec<Account>> {
        // The context already holds the only lock there is
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids
            .into_iter()
            .filter_map(|id| cx.staged.accounts.get(&id).cloned())
            .collect())
    }

    async fn delete(&self, cx: &mut MemoryWorkContext, id: AccountId) -> Result<bool> {
        let state = &mut cx.staged;
        if !state.accounts.contains_key(&id) {
            return Ok(false);
        }
        if state.contents.values().any(|content| content.uploader_id == id) {
            return Err(LedgerError::Conflict(format!(
                "account {id} still owns content"
            )));
        }

        state.accounts.remove(&id);
        let touched: Vec<ContentId> = state
            .downloads
            .keys()
            .filter(|(account, _)| *account == id)
            .map(|(_, content)| *content)
            .collect();
        state.downloads.retain(|(account, _), _| *account != id);
        for content_id in touched {
            state.refresh_rating(content_id);
        }
        Ok(true)
    }

    async fn update_fields(
        &self,
        cx: &mut MemoryWorkContext,
        id: AccountId,
        fields: &AccountFields,
    ) -> Result<bool> {
        let Some(account) = cx.staged.accounts.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(hash) = &fields.password_hash {
            account.password_hash = Some(hash.clone());
        }
        if let Some(email) = &fields.email {
            account.email = email.clone();
        }
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn adjust_credit(
        &self,
        cx: &mut MemoryWorkContext,
        id: AccountId,
        delta: i64,
    ) -> Result<bool> {
        let Some(account) = cx.staged.accounts.get_mut(&id) else {
            return Ok(false);
        };
        account.credit = account.credit.checked_add(delta).ok_or_else(|| {
            LedgerError::Internal(format!("credit overflow on account {id}"))
        })?;
        account.updated_at = Utc::now();
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryContentStore;

fn newest_first(contents: &mut [Content]) {
    contents.sort_by(|a, b| {
        b.uploaded_at
            .cmp(&a.uploaded_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[async_trait]
impl ContentStore<MemoryWorkContext> for MemoryContentStore {
    async fn insert(&self, cx: &mut MemoryWorkContext, content: &Content) -> Result<()> {
        let state = &mut cx.staged;
        if !state.accounts.contains_key(&content.uploader_id) {
            return Err(LedgerError::Conflict(format!(
                "uploader {} does not exist",
                content.uploader_id
            )));
        }
        if state.contents.values().any(|existing| existing.cid == content.cid) {
            return Err(LedgerError::Conflict(format!(
                "content {} already registered",
                content.cid
            )));
        }
        state.contents.insert(content.id, content.clone());
        Ok(())
    }

    async fn get_by_id(
        &self,
        cx: &mut MemoryWorkContext,
        id: ContentId,
    ) -> Result<Option<Content>> {
        Ok(cx.staged.contents.get(&id).cloned())
    }

    async fn delete(&self, cx: &mut MemoryWorkContext, id: ContentId) -> Result<bool> {
        let state = &mut cx.staged;
        if state.contents.remove(&id).is_none() {
            return Ok(false);
        }
        state.downloads.retain(|(_, content), _| *content != id);
        Ok(true)
    }

    async fn update_fields(
        &self,
        cx: &mut MemoryWorkContext,
        id: ContentId,
        patch: &ContentPatch,
        modified_at: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(content) = cx.staged.contents.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(name) = &patch.name {
            content.name = name.clone();
        }
        if let Some(description) = &patch.description {
            content.description = description.clone();
        }
        content.last_modified = modified_at;
        Ok(true)
    }

    async fn increment_downloads(
        &self,
        cx: &mut MemoryWorkContext,
        id: ContentId,
    ) -> Result<bool> {
        let Some(content) = cx.staged.contents.get_mut(&id) else {
            return Ok(false);
        };
        content.downloads += 1;
        Ok(true)
    }

    async fn get_download_record(
        &self,
        cx: &mut MemoryWorkContext,
        account: AccountId,
        content: ContentId,
    ) -> Result<Option<DownloadRecord>> {
        Ok(cx.staged.downloads.get(&(account, content)).cloned())
    }

    async fn insert_download_record(
        &self,
        cx: &mut MemoryWorkContext,
        record: &DownloadRecord,
    ) -> Result<bool> {
        let key = (record.account_id, record.content_id);
        if cx.staged.downloads.contains_key(&key) {
            return Ok(false);
        }
        cx.staged.downloads.insert(key, record.clone());
        Ok(true)
    }

    async fn update_download_record(
        &self,
        cx: &mut MemoryWorkContext,
        account: AccountId,
        content: ContentId,
        update: &ReviewUpdate,
    ) -> Result<bool> {
        let state = &mut cx.staged;
        let Some(record) = state.downloads.get_mut(&(account, content)) else {
            return Ok(false);
        };
        if let Some(rating) = update.rating {
            record.rating = Some(rating);
        }
        if let Some(comment) = &update.comment {
            record.comment = Some(comment.clone());
        }
        if let Some(at) = update.comment_time {
            record.comment_time = Some(at);
        }
        if update.rating.is_some() {
            state.refresh_rating(content);
        }
        Ok(true)
    }

    async fn text_search(
        &self,
        cx: &mut MemoryWorkContext,
        term: &str,
    ) -> Result<Vec<Content>> {
        let words: Vec<String> =
            term.split_whitespace().map(str::to_lowercase).collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }
        let mut found: Vec<Content> = cx
            .staged
            .contents
            .values()
            .filter(|content| {
                let haystack = format!("{} {}", content.name, content.description)
                    .to_lowercase();
                words.iter().all(|word| haystack.contains(word.as_str()))
            })
            .cloned()
            .collect();
        newest_first(&mut found);
        Ok(found)
    }

    async fn list_all(&self, cx: &mut MemoryWorkContext) -> Result<Vec<Content>> {
        let mut all: Vec<Content> = cx.staged.contents.values().cloned().collect();
        newest_first(&mut all);
        Ok(all)
    }

    async fn list_by_uploader(
        &self,
        cx: &mut MemoryWorkContext,
        uploader: AccountId,
    ) -> Result<Vec<Content>> {
        let mut owned: Vec<Content> = cx
            .staged
            .contents
            .values()
            .filter(|content| content.uploader_id == uploader)
            .cloned()
            .collect();
        newest_first(&mut owned);
        Ok(owned)
    }

    async fn list_downloads(
        &self,
        cx: &mut MemoryWorkContext,
        account: AccountId,
    ) -> Result<Vec<Content>> {
        let state = &cx.staged;
        let mut records: Vec<&DownloadRecord> = state
            .downloads
            .values()
            .filter(|record| record.account_id == account)
            .collect();
        records.sort_by(|a, b| b.downloaded_at.cmp(&a.downloaded_at));
        Ok(records
            .into_iter()
            .filter_map(|record| state.contents.get(&record.content_id).cloned())
            .collect())
    }

    async fn list_comments(
        &self,
        cx: &mut MemoryWorkContext,
        content: ContentId,
    ) -> Result<Vec<Comment>> {
        let state = &cx.staged;
        let mut reviewed: Vec<&DownloadRecord> = state
            .downloads
            .values()
            .filter(|record| record.content_id == content && record.has_review())
            .collect();
        // Newest comment first, rating-only reviews after
        reviewed.sort_by(|a, b| {
            b.comment_time
                .is_some()
                .cmp(&a.comment_time.is_some())
                .then_with(|| b.comment_time.cmp(&a.comment_time))
                .then_with(|| b.downloaded_at.cmp(&a.downloaded_at))
        });
        Ok(reviewed
            .into_iter()
            .filter_map(|record| {
                let reviewer = state.accounts.get(&record.account_id)?;
                Some(Comment {
                    username: reviewer.username.clone(),
                    rating: record.rating,
                    comment_text: record.comment.clone(),
                    comment_time: record.comment_time,
                })
            })
            .collect())
    }
}

/// Writes between sweeps of expired sessions.
const SESSION_SWEEP_INTERVAL: u64 = 64;

/// Session entries with expiry driven by the tokio clock.
///
/// Reads ignore expired entries. Every [`SESSION_SWEEP_INTERVAL`]th write
/// also sweeps the whole map, so sessions that are never read again are
/// still reclaimed.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, (String, Instant)>,
    writes: AtomicU64,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently held, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Reads already ignore them; this only
    /// reclaims memory.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        before - self.entries.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SESSION_SWEEP_INTERVAL == 0 {
            let reclaimed = self.purge_expired();
            if reclaimed > 0 {
                debug!(reclaimed, "expired sessions swept");
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.1 > now => return Ok(Some(entry.0.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        self.entries
            .remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
