//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ArticleStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lorelog_core::domain::{
    Article, ArticlePatch, NewArticle, Principal, StorageKind, Tag, User,
};
use lorelog_core::ports::{ArticleStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ArticleStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Moves the articles of the imported user for `email` to `user_id` and
    /// removes the imported user row, freeing its email.
    async fn claim_imported_user(&self, user_id: Uuid, email: &str) -> PortResult<()> {
        let imported_id = User::imported_id(email);
        if imported_id == user_id {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let imported = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, name, invite_accepted_at FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(imported_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        let Some(imported) = imported else {
            return Ok(());
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, name, invite_accepted_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
                SET name = COALESCE(users.name, EXCLUDED.name),
                    invite_accepted_at = COALESCE(users.invite_accepted_at, EXCLUDED.invite_accepted_at)
            "#,
        )
        .bind(user_id)
        .bind(imported.name.as_deref())
        .bind(imported.invite_accepted_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let moved = sqlx::query("UPDATE articles SET user_id = $1 WHERE user_id = $2")
            .bind(user_id)
            .bind(imported_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(imported_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        info!(user_id = %user_id, articles = moved, "Claimed imported user");
        Ok(())
    }

    /// Insert-or-update by id. The email is left out when another user
    /// already holds it; a concurrent claim can still surface as `Conflict`.
    async fn upsert_identity(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        name: Option<&str>,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, email, name)
            VALUES (
                $1,
                CASE WHEN EXISTS (SELECT 1 FROM users WHERE email = $2 AND id <> $1)
                    THEN NULL ELSE $2 END,
                $3
            )
            ON CONFLICT (id) DO UPDATE
                SET email = COALESCE(EXCLUDED.email, users.email),
                    name = COALESCE(EXCLUDED.name, users.name)
            RETURNING id, email, name, invite_accepted_at
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(record.to_domain())
    }

    async fn ensure_owned(&self, user_id: Uuid, article_id: Uuid) -> PortResult<()> {
        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM articles WHERE id = $1 AND user_id = $2)",
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if owned {
            Ok(())
        } else {
            Err(not_found(article_id))
        }
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: Option<String>,
    name: Option<String>,
    invite_accepted_at: Option<DateTime<Utc>>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            invite_accepted_at: self.invite_accepted_at,
        }
    }
}

#[derive(FromRow)]
struct ArticleRecord {
    id: Uuid,
    user_id: Uuid,
    url: String,
    title: String,
    summary: Option<String>,
    body_length: Option<i32>,
    embedding: Option<String>,
    tags: Vec<String>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ArticleRecord {
    fn to_domain(self) -> Article {
        Article {
            id: self.id,
            owner_id: self.user_id,
            url: self.url,
            title: self.title,
            summary: self.summary,
            body_length: self.body_length.and_then(|n| u32::try_from(n).ok()),
            embedding: self.embedding,
            tags: self.tags,
            read_at: self.read_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TagRecord {
    id: Uuid,
    name: String,
}
impl TagRecord {
    fn to_domain(self) -> Tag {
        Tag {
            id: self.id,
            name: self.name,
        }
    }
}

/// Article columns plus the attached tag names in attach order. Callers
/// append their `WHERE` and must end with `GROUP BY a.id`.
const ARTICLE_SELECT: &str = r#"
    SELECT
        a.id, a.user_id, a.url, a.title, a.summary, a.body_length, a.embedding,
        a.read_at, a.created_at, a.updated_at,
        COALESCE(
            ARRAY_AGG(t.name ORDER BY art.created_at, t.name) FILTER (WHERE t.name IS NOT NULL),
            ARRAY[]::TEXT[]
        ) AS tags
    FROM articles a
    LEFT JOIN article_tags art ON art.article_id = a.id
    LEFT JOIN tags t ON t.id = art.tag_id
"#;

//=========================================================================================
// Error Mapping Helpers
//=========================================================================================

fn map_sqlx(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("row not found".to_string()),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        other => PortError::Storage(other.to_string()),
    }
}

fn not_found(id: Uuid) -> PortError {
    PortError::NotFound(format!("Article {} not found", id))
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn sql_body_length(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

//=========================================================================================
// `ArticleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ArticleStore for DbAdapter {
    fn kind(&self) -> StorageKind {
        StorageKind::Database
    }

    async fn ping(&self) -> PortResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    // --- Users ---

    /// Upserts the caller. An email already held by a user created through
    /// the import is taken over together with that user's articles. An
    /// email held by another authenticated user stays with them, and the
    /// caller is saved without it.
    async fn ensure_user(&self, principal: &Principal) -> PortResult<User> {
        let email = principal
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        let name = principal.name.as_deref();

        if let Some(email) = email.as_deref() {
            self.claim_imported_user(principal.user_id, email).await?;
        }

        match self.upsert_identity(principal.user_id, email.as_deref(), name).await {
            Err(PortError::Conflict(reason)) => {
                warn!(user_id = %principal.user_id, "Email belongs to another user, saving without it: {}", reason);
                self.upsert_identity(principal.user_id, None, name).await
            }
            other => other,
        }
    }

    async fn upsert_user_by_email(&self, email: &str, name: Option<&str>) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, email, name, invite_accepted_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (email) DO UPDATE
                SET name = COALESCE(EXCLUDED.name, users.name)
            RETURNING id, email, name, invite_accepted_at
            "#,
        )
        .bind(User::imported_id(email))
        .bind(email.trim().to_lowercase())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(record.to_domain())
    }

    // --- Articles ---

    async fn list_articles(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<Article>> {
        let query = format!(
            "{} WHERE a.user_id = $1 GROUP BY a.id ORDER BY a.created_at DESC LIMIT $2",
            ARTICLE_SELECT
        );
        let records = sqlx::query_as::<_, ArticleRecord>(&query)
            .bind(user_id)
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_article(&self, user_id: Uuid, id: Uuid) -> PortResult<Article> {
        let query = format!(
            "{} WHERE a.id = $1 AND a.user_id = $2 GROUP BY a.id",
            ARTICLE_SELECT
        );
        sqlx::query_as::<_, ArticleRecord>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(|r| r.to_domain())
            .ok_or_else(|| not_found(id))
    }

    async fn find_article_by_url(&self, user_id: Uuid, url: &str) -> PortResult<Option<Article>> {
        let query = format!(
            "{} WHERE a.user_id = $1 AND a.url = $2 GROUP BY a.id ORDER BY a.created_at DESC LIMIT 1",
            ARTICLE_SELECT
        );
        let record = sqlx::query_as::<_, ArticleRecord>(&query)
            .bind(user_id)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn create_article(&self, user_id: Uuid, fields: NewArticle) -> PortResult<Article> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO articles
                (id, user_id, url, title, summary, body_length, embedding, read_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, now()), now())
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&fields.url)
        .bind(&fields.title)
        .bind(fields.summary.as_deref())
        .bind(fields.body_length.map(sql_body_length))
        .bind(fields.embedding.as_deref())
        .bind(fields.read_at)
        .bind(fields.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        self.get_article(user_id, id).await
    }

    async fn update_article(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: ArticlePatch,
    ) -> PortResult<Article> {
        let result = sqlx::query(
            r#"
            UPDATE articles SET
                title = COALESCE($3, title),
                summary = COALESCE($4, summary),
                body_length = COALESCE($5, body_length),
                embedding = COALESCE($6, embedding),
                read_at = COALESCE($7, read_at),
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(patch.title.as_deref())
        .bind(patch.summary.as_deref())
        .bind(patch.body_length.map(sql_body_length))
        .bind(patch.embedding.as_deref())
        .bind(patch.read_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        self.get_article(user_id, id).await
    }

    /// Deletes the article and any of its tags no other article still uses.
    async fn delete_article(&self, user_id: Uuid, id: Uuid) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let tag_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT art.tag_id
            FROM article_tags art
            JOIN articles a ON a.id = art.article_id
            WHERE a.id = $1 AND a.user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let deleted = sqlx::query("DELETE FROM articles WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected()
            > 0;

        if deleted && !tag_ids.is_empty() {
            let collected = sqlx::query(
                r#"
                DELETE FROM tags t
                WHERE t.id = ANY($1)
                  AND NOT EXISTS (SELECT 1 FROM article_tags art WHERE art.tag_id = t.id)
                "#,
            )
            .bind(&tag_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();
            debug!(article_id = %id, collected, "Removed tags left without articles");
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(deleted)
    }

    async fn search_articles_lexical(
        &self,
        user_id: Uuid,
        query: &str,
        limit: usize,
    ) -> PortResult<Vec<Article>> {
        let pattern = format!("%{}%", escape_like(query));
        let sql = format!(
            r#"{} WHERE a.user_id = $1
            GROUP BY a.id
            HAVING a.title ILIKE $2 ESCAPE '\'
                OR a.url ILIKE $2 ESCAPE '\'
                OR COALESCE(a.summary, '') ILIKE $2 ESCAPE '\'
                OR COALESCE(STRING_AGG(t.name, ' ' ORDER BY art.created_at, t.name), '') ILIKE $2 ESCAPE '\'
            ORDER BY a.created_at DESC
            LIMIT $3"#,
            ARTICLE_SELECT
        );
        let records = sqlx::query_as::<_, ArticleRecord>(&sql)
            .bind(user_id)
            .bind(pattern)
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    // --- Tags ---

    async fn article_tag_names(&self, user_id: Uuid, article_id: Uuid) -> PortResult<Vec<String>> {
        self.ensure_owned(user_id, article_id).await?;
        sqlx::query_scalar(
            r#"
            SELECT t.name FROM article_tags art
            JOIN tags t ON t.id = art.tag_id
            WHERE art.article_id = $1
            ORDER BY art.created_at, t.name
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn get_or_create_tag(&self, name: &str) -> PortResult<Tag> {
        sqlx::query("INSERT INTO tags (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        // A concurrent cleanup may delete the tag between the two statements.
        sqlx::query_as::<_, TagRecord>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::Conflict(format!("tag {} vanished during creation", name)))
    }

    async fn attach_tag(&self, user_id: Uuid, article_id: Uuid, tag: &Tag) -> PortResult<()> {
        self.ensure_owned(user_id, article_id).await?;
        let result = sqlx::query(
            "INSERT INTO article_tags (article_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(article_id)
        .bind(tag.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::Conflict(format!(
                "tag {} already attached to {}",
                tag.name, article_id
            )));
        }
        Ok(())
    }

    async fn user_tags(&self, user_id: Uuid) -> PortResult<Vec<Tag>> {
        let records = sqlx::query_as::<_, TagRecord>(
            r#"
            SELECT DISTINCT t.id, t.name FROM tags t
            JOIN article_tags art ON art.tag_id = t.id
            JOIN articles a ON a.id = art.article_id
            WHERE a.user_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn detach_tag_for_user(&self, user_id: Uuid, tag: &Tag) -> PortResult<usize> {
        let result = sqlx::query(
            r#"
            DELETE FROM article_tags art
            USING articles a
            WHERE art.article_id = a.id AND a.user_id = $1 AND art.tag_id = $2
            "#,
        )
        .bind(user_id)
        .bind(tag.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() as usize)
    }

    async fn delete_tag_if_unused(&self, tag: &Tag) -> PortResult<bool> {
        sqlx::query(
            r#"
            DELETE FROM tags
            WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM article_tags WHERE tag_id = $1)
            "#,
        )
        .bind(tag.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let still_there: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tags WHERE id = $1)")
            .bind(tag.id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(!still_there)
    }

    async fn count_user_associations(&self, user_id: Uuid) -> PortResult<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM article_tags art
            JOIN articles a ON a.id = art.article_id
            WHERE a.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(count as usize)
    }

    async fn list_untagged_articles(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<Article>> {
        let query = format!(
            r#"{} WHERE a.user_id = $1
                AND NOT EXISTS (SELECT 1 FROM article_tags x WHERE x.article_id = a.id)
            GROUP BY a.id
            ORDER BY a.created_at DESC
            LIMIT $2"#,
            ARTICLE_SELECT
        );
        let records = sqlx::query_as::<_, ArticleRecord>(&query)
            .bind(user_id)
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn count_untagged_articles(&self, user_id: Uuid) -> PortResult<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM articles a
            WHERE a.user_id = $1
              AND NOT EXISTS (SELECT 1 FROM article_tags x WHERE x.article_id = a.id)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(count as usize)
    }
}

/// Escapes `LIKE` metacharacters so the query matches literally.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
