//! sqlx-backed implementation of the watermark store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Article, NewArticle, Reaction, ReactionKind, StoreTx, WatermarkStore};
use crate::db::{format_datetime, parse_datetime, Database, DbTransaction};
use crate::{CourierError, Result};

/// Row type for articles.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    source_id: i64,
    url: String,
    title: String,
    text_content: String,
    excerpt: String,
    language: String,
    published_at: String,
    created_at: String,
}

impl TryFrom<ArticleRow> for Article {
    type Error = CourierError;

    fn try_from(row: ArticleRow) -> Result<Self> {
        let published_at = stored_datetime("article published_at", &row.published_at)?;
        let created_at = stored_datetime("article created_at", &row.created_at)?;
        Ok(Article {
            id: row.id,
            source_id: row.source_id,
            url: row.url,
            title: row.title,
            text_content: row.text_content,
            excerpt: row.excerpt,
            language: row.language,
            published_at,
            created_at,
        })
    }
}

/// Row type for reactions.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ReactionRow {
    id: i64,
    article_id: i64,
    kind: String,
    created_at: String,
}

impl TryFrom<ReactionRow> for Reaction {
    type Error = CourierError;

    fn try_from(row: ReactionRow) -> Result<Self> {
        let kind = ReactionKind::parse(&row.kind).ok_or_else(|| {
            CourierError::Database(format!("unknown reaction kind: {}", row.kind))
        })?;
        Ok(Reaction {
            id: row.id,
            article_id: row.article_id,
            kind,
            created_at: stored_datetime("reaction created_at", &row.created_at)?,
        })
    }
}

fn stored_datetime(what: &str, raw: &str) -> Result<DateTime<Utc>> {
    parse_datetime(raw).ok_or_else(|| CourierError::Database(format!("invalid {what}: {raw}")))
}

/// Run a store operation under the per-operation deadline.
async fn bounded<T, F>(limit: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CourierError::Database(format!(
            "{op} timed out after {}s",
            limit.as_secs_f64()
        ))),
    }
}

fn source_not_found(source: &str) -> CourierError {
    CourierError::NotFound(format!("source '{source}'"))
}

/// Watermark store backed by the crate database.
///
/// Writers are serialized: at most one transaction is open at a time across
/// all clones of the store, and `begin` waits for the current one to finish.
/// Plain reads outside a transaction are not serialized.
#[derive(Debug, Clone)]
pub struct SqlStore {
    db: Arc<Database>,
    op_timeout: Duration,
    write_lock: Arc<Mutex<()>>,
}

impl SqlStore {
    /// Create a store over an open database.
    pub fn new(db: Arc<Database>, op_timeout: Duration) -> Self {
        Self {
            db,
            op_timeout,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Read a source's watermark outside of any transaction.
    pub async fn get_watermark(&self, source: &str) -> Result<Option<DateTime<Utc>>> {
        bounded(self.op_timeout, "get_watermark", async {
            let row: Option<(Option<String>,)> =
                sqlx::query_as("SELECT last_fetched_at FROM sources WHERE name = $1")
                    .bind(source)
                    .fetch_optional(self.db.pool())
                    .await?;
            decode_watermark(source, row)
        })
        .await
    }

    /// Get an article by id.
    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        bounded(self.op_timeout, "get_article", async {
            let row = sqlx::query_as::<_, ArticleRow>(
                "SELECT id, source_id, url, title, text_content, excerpt, language,
                        published_at, created_at
                 FROM articles WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
            row.map(Article::try_from).transpose()
        })
        .await
    }

    /// List the articles of a source, oldest first.
    pub async fn list_articles(&self, source: &str) -> Result<Vec<Article>> {
        bounded(self.op_timeout, "list_articles", async {
            let rows = sqlx::query_as::<_, ArticleRow>(
                "SELECT a.id, a.source_id, a.url, a.title, a.text_content, a.excerpt,
                        a.language, a.published_at, a.created_at
                 FROM articles a
                 JOIN sources s ON s.id = a.source_id
                 WHERE s.name = $1
                 ORDER BY a.id",
            )
            .bind(source)
            .fetch_all(self.db.pool())
            .await?;
            rows.into_iter().map(Article::try_from).collect()
        })
        .await
    }

    /// Count the articles persisted for a source.
    pub async fn count_articles(&self, source: &str) -> Result<i64> {
        bounded(self.op_timeout, "count_articles", async {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM articles a
                 JOIN sources s ON s.id = a.source_id
                 WHERE s.name = $1",
            )
            .bind(source)
            .fetch_one(self.db.pool())
            .await?;
            Ok(count)
        })
        .await
    }

    /// Count registered sources with the given name.
    pub async fn count_sources(&self, name: &str) -> Result<i64> {
        bounded(self.op_timeout, "count_sources", async {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources WHERE name = $1")
                .bind(name)
                .fetch_one(self.db.pool())
                .await?;
            Ok(count)
        })
        .await
    }

    /// List the reactions recorded for an article, oldest first.
    pub async fn list_reactions(&self, article_id: i64) -> Result<Vec<Reaction>> {
        bounded(self.op_timeout, "list_reactions", async {
            let rows = sqlx::query_as::<_, ReactionRow>(
                "SELECT id, article_id, kind, created_at
                 FROM reactions WHERE article_id = $1 ORDER BY id",
            )
            .bind(article_id)
            .fetch_all(self.db.pool())
            .await?;
            rows.into_iter().map(Reaction::try_from).collect()
        })
        .await
    }
}

fn decode_watermark(
    source: &str,
    row: Option<(Option<String>,)>,
) -> Result<Option<DateTime<Utc>>> {
    match row {
        None => Err(source_not_found(source)),
        Some((None,)) => Ok(None),
        Some((Some(raw),)) => parse_datetime(&raw).map(Some).ok_or_else(|| {
            CourierError::Database(format!("invalid watermark for source '{source}': {raw}"))
        }),
    }
}

#[async_trait]
impl WatermarkStore for SqlStore {
    async fn create_source(&self, name: &str) -> Result<i64> {
        let _write_guard = self.write_lock.lock().await;
        bounded(self.op_timeout, "create_source", async {
            let result = sqlx::query_scalar::<_, i64>(
                "INSERT INTO sources (name, created_at) VALUES ($1, $2) RETURNING id",
            )
            .bind(name)
            .bind(format_datetime(&Utc::now()))
            .fetch_one(self.db.pool())
            .await;

            match result {
                Ok(id) => Ok(id),
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    Err(CourierError::SourceAlreadyExists(name.to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        // Not bounded by op_timeout: a cycle may hold the lock for minutes.
        let write_guard = Arc::clone(&self.write_lock).lock_owned().await;
        let tx = bounded(self.op_timeout, "begin", self.db.begin()).await?;
        Ok(Box::new(SqlTx {
            tx,
            op_timeout: self.op_timeout,
            _write_guard: write_guard,
        }))
    }
}

/// Open transaction on the crate database.
///
/// The underlying sqlx transaction rolls back when dropped uncommitted.
/// The store's write lock is released together with the transaction.
pub struct SqlTx {
    tx: DbTransaction,
    op_timeout: Duration,
    _write_guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl StoreTx for SqlTx {
    async fn get_watermark(&mut self, source: &str) -> Result<Option<DateTime<Utc>>> {
        let tx = &mut self.tx;
        bounded(self.op_timeout, "get_watermark", async move {
            let row: Option<(Option<String>,)> =
                sqlx::query_as("SELECT last_fetched_at FROM sources WHERE name = $1")
                    .bind(source)
                    .fetch_optional(&mut **tx)
                    .await?;
            decode_watermark(source, row)
        })
        .await
    }

    async fn set_watermark(&mut self, source: &str, at: DateTime<Utc>) -> Result<()> {
        let tx = &mut self.tx;
        bounded(self.op_timeout, "set_watermark", async move {
            let result = sqlx::query("UPDATE sources SET last_fetched_at = $1 WHERE name = $2")
                .bind(format_datetime(&at))
                .bind(source)
                .execute(&mut **tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(source_not_found(source));
            }
            Ok(())
        })
        .await
    }

    async fn add_article(&mut self, article: &NewArticle) -> Result<i64> {
        let tx = &mut self.tx;
        bounded(self.op_timeout, "add_article", async move {
            let id: Option<i64> = sqlx::query_scalar(
                "INSERT INTO articles (source_id, url, title, text_content, excerpt, language,
                                       published_at, created_at)
                 SELECT id, $2, $3, $4, $5, $6, $7, $8 FROM sources WHERE name = $1
                 RETURNING id",
            )
            .bind(&article.source)
            .bind(&article.url)
            .bind(&article.title)
            .bind(&article.text_content)
            .bind(&article.excerpt)
            .bind(&article.language)
            .bind(format_datetime(&article.published_at))
            .bind(format_datetime(&Utc::now()))
            .fetch_optional(&mut **tx)
            .await?;
            id.ok_or_else(|| source_not_found(&article.source))
        })
        .await
    }

    async fn add_reaction(&mut self, article_id: i64, kind: ReactionKind) -> Result<i64> {
        let tx = &mut self.tx;
        bounded(self.op_timeout, "add_reaction", async move {
            let result = sqlx::query_scalar::<_, i64>(
                "INSERT INTO reactions (article_id, kind, created_at)
                 VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(article_id)
            .bind(kind.as_str())
            .bind(format_datetime(&Utc::now()))
            .fetch_one(&mut **tx)
            .await;

            match result {
                Ok(id) => Ok(id),
                Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => Err(
                    CourierError::NotFound(format!("article {article_id}")),
                ),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let SqlTx {
            tx,
            op_timeout,
            _write_guard,
        } = *self;
        bounded(op_timeout, "commit", async move { Ok(tx.commit().await?) }).await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let SqlTx {
            tx,
            op_timeout,
            _write_guard,
        } = *self;
        bounded(op_timeout, "rollback", async move { Ok(tx.rollback().await?) }).await
    }
}
