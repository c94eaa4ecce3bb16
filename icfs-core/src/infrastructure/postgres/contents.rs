use async_trait::async_trait;
use chrono::{DateTime, Utc};
use icfs_model::{
    AccountId, Comment, Content, ContentId, ContentPatch, DownloadRecord,
    FileType,
};
use uuid::Uuid;

use super::{PgWorkContext, db_error};
use crate::error::{LedgerError, Result};
use crate::ports::{ContentStore, ReviewUpdate};

const CONTENT_COLUMNS: &str = "c.id, c.cid, c.name, c.description, c.extension, \
     c.file_type, c.uploader_id, c.downloads, c.rating, c.size, \
     c.uploaded_at, c.last_modified";

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresContentStore;

impl PostgresContentStore {
    pub fn new() -> Self {
        Self
    }
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    cid: String,
    name: String,
    description: String,
    extension: String,
    file_type: String,
    uploader_id: Uuid,
    downloads: i64,
    rating: f32,
    size: i64,
    uploaded_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl TryFrom<ContentRow> for Content {
    type Error = LedgerError;

    fn try_from(row: ContentRow) -> Result<Self> {
        let file_type = row.file_type.parse::<FileType>().map_err(|e| {
            LedgerError::Internal(format!("Stored content {} is corrupt: {}", row.id, e))
        })?;

        Ok(Content {
            id: ContentId(row.id),
            cid: row.cid,
            name: row.name,
            description: row.description,
            extension: row.extension,
            file_type,
            uploader_id: AccountId(row.uploader_id),
            downloads: row.downloads,
            rating: row.rating,
            size: row.size,
            uploaded_at: row.uploaded_at,
            last_modified: row.last_modified,
        })
    }
}

fn into_contents(rows: Vec<ContentRow>) -> Result<Vec<Content>> {
    rows.into_iter().map(Content::try_from).collect()
}

#[derive(sqlx::FromRow)]
struct DownloadRow {
    account_id: Uuid,
    content_id: Uuid,
    comment_text: Option<String>,
    rating: Option<f32>,
    comment_time: Option<DateTime<Utc>>,
    downloaded_at: DateTime<Utc>,
}

impl From<DownloadRow> for DownloadRecord {
    fn from(row: DownloadRow) -> Self {
        DownloadRecord {
            account_id: AccountId(row.account_id),
            content_id: ContentId(row.content_id),
            comment: row.comment_text,
            rating: row.rating,
            comment_time: row.comment_time,
            downloaded_at: row.downloaded_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    username: String,
    rating: Option<f32>,
    comment_text: Option<String>,
    comment_time: Option<DateTime<Utc>>,
}

#[async_trait]
impl ContentStore<PgWorkContext> for PostgresContentStore {
    async fn insert(&self, cx: &mut PgWorkContext, content: &Content) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contents (
                id, cid, name, description, extension, file_type,
                uploader_id, downloads, rating, size, uploaded_at, last_modified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(content.id.as_uuid())
        .bind(&content.cid)
        .bind(&content.name)
        .bind(&content.description)
        .bind(&content.extension)
        .bind(content.file_type.as_str())
        .bind(content.uploader_id.as_uuid())
        .bind(content.downloads)
        .bind(content.rating)
        .bind(content.size)
        .bind(content.uploaded_at)
        .bind(content.last_modified)
        .execute(cx.conn())
        .await
        .map_err(db_error("Failed to insert content"))?;

        Ok(())
    }

    async fn get_by_id(
        &self,
        cx: &mut PgWorkContext,
        id: ContentId,
    ) -> Result<Option<Content>> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents c WHERE c.id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(cx.conn())
        .await
        .map_err(db_error("Failed to load content"))?;

        row.map(Content::try_from).transpose()
    }

    async fn delete(&self, cx: &mut PgWorkContext, id: ContentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contents WHERE id = $1")
            .bind(id.as_uuid())
            .execute(cx.conn())
            .await
            .map_err(db_error("Failed to delete content"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_fields(
        &self,
        cx: &mut PgWorkContext,
        id: ContentId,
        patch: &ContentPatch,
        modified_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE contents
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                last_modified = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(modified_at)
        .execute(cx.conn())
        .await
        .map_err(db_error("Failed to update content"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_downloads(
        &self,
        cx: &mut PgWorkContext,
        id: ContentId,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE contents SET downloads = downloads + 1 WHERE id = $1")
                .bind(id.as_uuid())
                .execute(cx.conn())
                .await
                .map_err(db_error("Failed to increment downloads"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_download_record(
        &self,
        cx: &mut PgWorkContext,
        account: AccountId,
        content: ContentId,
    ) -> Result<Option<DownloadRecord>> {
        let row = sqlx::query_as::<_, DownloadRow>(
            r#"
            SELECT account_id, content_id, comment_text, rating, comment_time, downloaded_at
            FROM downloads
            WHERE account_id = $1 AND content_id = $2
            "#,
        )
        .bind(account.as_uuid())
        .bind(content.as_uuid())
        .fetch_optional(cx.conn())
        .await
        .map_err(db_error("Failed to load download record"))?;

        Ok(row.map(DownloadRecord::from))
    }

    async fn insert_download_record(
        &self,
        cx: &mut PgWorkContext,
        record: &DownloadRecord,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO downloads (
                account_id, content_id, comment_text, rating, comment_time, downloaded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (account_id, content_id) DO NOTHING
            "#,
        )
        .bind(record.account_id.as_uuid())
        .bind(record.content_id.as_uuid())
        .bind(record.comment.as_deref())
        .bind(record.rating)
        .bind(record.comment_time)
        .bind(record.downloaded_at)
        .execute(cx.conn())
        .await
        .map_err(db_error("Failed to insert download record"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_download_record(
        &self,
        cx: &mut PgWorkContext,
        account: AccountId,
        content: ContentId,
        update: &ReviewUpdate,
    ) -> Result<bool> {
        // contents.rating is refreshed by the downloads_rating_changed trigger
        let result = sqlx::query(
            r#"
            UPDATE downloads
            SET rating = COALESCE($3, rating),
                comment_text = COALESCE($4, comment_text),
                comment_time = COALESCE($5, comment_time)
            WHERE account_id = $1 AND content_id = $2
            "#,
        )
        .bind(account.as_uuid())
        .bind(content.as_uuid())
        .bind(update.rating)
        .bind(update.comment.as_deref())
        .bind(update.comment_time)
        .execute(cx.conn())
        .await
        .map_err(db_error("Failed to update download record"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn text_search(
        &self,
        cx: &mut PgWorkContext,
        term: &str,
    ) -> Result<Vec<Content>> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            SELECT {CONTENT_COLUMNS}
            FROM contents c, websearch_to_tsquery('english', $1) AS query
            WHERE c.tsv @@ query
            ORDER BY ts_rank(c.tsv, query) DESC, c.uploaded_at DESC
            "#
        ))
        .bind(term)
        .fetch_all(cx.conn())
        .await
        .map_err(db_error("Failed to search contents"))?;

        into_contents(rows)
    }

    async fn list_all(&self, cx: &mut PgWorkContext) -> Result<Vec<Content>> {
        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents c ORDER BY c.uploaded_at DESC, c.name"
        ))
        .fetch_all(cx.conn())
        .await
        .map_err(db_error("Failed to list contents"))?;

        into_contents(rows)
    }

    async fn list_by_uploader(
        &self,
        cx: &mut PgWorkContext,
        uploader: AccountId,
    ) -> Result<Vec<Content>> {
        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            SELECT {CONTENT_COLUMNS}
            FROM contents c
            WHERE c.uploader_id = $1
            ORDER BY c.uploaded_at DESC, c.name
            "#
        ))
        .bind(uploader.as_uuid())
        .fetch_all(cx.conn())
        .await
        .map_err(db_error("Failed to list uploads"))?;

        into_contents(rows)
    }

    async fn list_downloads(
        &self,
        cx: &mut PgWorkContext,
        account: AccountId,
    ) -> Result<Vec<Content>> {
        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            SELECT {CONTENT_COLUMNS}
            FROM contents c
            JOIN downloads d ON d.content_id = c.id
            WHERE d.account_id = $1
            ORDER BY d.downloaded_at DESC
            "#
        ))
        .bind(account.as_uuid())
        .fetch_all(cx.conn())
        .await
        .map_err(db_error("Failed to list downloads"))?;

        into_contents(rows)
    }

    async fn list_comments(
        &self,
        cx: &mut PgWorkContext,
        content: ContentId,
    ) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT a.username, d.rating, d.comment_text, d.comment_time
            FROM downloads d
            JOIN accounts a ON a.id = d.account_id
            WHERE d.content_id = $1
              AND (d.comment_text IS NOT NULL OR d.rating IS NOT NULL)
            ORDER BY d.comment_time DESC NULLS LAST, d.downloaded_at DESC
            "#,
        )
        .bind(content.as_uuid())
        .fetch_all(cx.conn())
        .await
        .map_err(db_error("Failed to list comments"))?;

        Ok(rows
            .into_iter()
            .map(|row| Comment {
                username: row.username,
                rating: row.rating,
                comment_text: row.comment_text,
                comment_time: row.comment_time,
            })
            .collect())
    }
}
