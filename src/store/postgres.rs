//! PostgreSQL document store backed by sqlx and pgvector

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use sqlx::Row;

use super::DocumentStore;
use crate::models::AggregatedEntities;
use crate::models::Article;
use crate::models::RecommendationRecord;
use crate::models::RecommendedArticle;
use crate::models::User;
use crate::Result;

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration
    pub async fn from_config(config: &crate::config::AppConfig) -> Result<Self> {
        let pool_options = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections())
            .min_connections(config.min_connections())
            .acquire_timeout(std::time::Duration::from_secs(config.connection_timeout()));

        let pool = pool_options.connect(config.database_url()).await?;

        tracing::info!(
            "Database pool configured: max_connections={}, min_connections={}",
            config.max_connections(),
            config.min_connections()
        );

        Ok(Self::new(pool))
    }

    /// Get a reference to the database pool for raw queries
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist.
    ///
    /// `dimension` fixes the article embedding column width; it must match
    /// the configured embedding model.
    pub async fn init_schema(&self, dimension: usize) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                source TEXT NOT NULL,
                url TEXT,
                published_at TIMESTAMPTZ,
                embedding vector({dimension}),
                sentiment TEXT,
                summary TEXT,
                fact_check JSONB,
                score DOUBLE PRECISION
            )"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                email TEXT PRIMARY KEY,
                name TEXT,
                phone_number TEXT,
                liked_article_ids JSONB NOT NULL DEFAULT '[]'::jsonb,
                entities JSONB,
                preference_summary TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS recommendations (
                email TEXT PRIMARY KEY,
                articles JSONB NOT NULL,
                generated_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database schema initialized (embedding dimension {dimension})");
        Ok(())
    }
}

fn article_from_row(row: &PgRow) -> Result<Article> {
    let embedding: Option<Vector> = row.try_get("embedding")?;
    let fact_check: Option<serde_json::Value> = row.try_get("fact_check")?;
    let fact_check = fact_check.map(serde_json::from_value).transpose()?;

    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        source: row.try_get("source")?,
        url: row.try_get("url")?,
        published_at: row.try_get("published_at")?,
        embedding: embedding.map(|v| v.to_vec()),
        sentiment: row.try_get("sentiment")?,
        summary: row.try_get("summary")?,
        fact_check,
        score: row.try_get("score")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let liked: serde_json::Value = row.try_get("liked_article_ids")?;
    let entities: Option<serde_json::Value> = row.try_get("entities")?;

    Ok(User {
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        phone_number: row.try_get("phone_number")?,
        liked_article_ids: serde_json::from_value(liked)?,
        entities: entities.map(serde_json::from_value).transpose()?,
        preference_summary: row.try_get("preference_summary")?,
    })
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(article_from_row).transpose()
    }

    async fn list_articles_missing_embedding(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query("SELECT * FROM articles WHERE embedding IS NULL ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(article_from_row).collect()
    }

    async fn list_articles_with_embedding(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query("SELECT * FROM articles WHERE embedding IS NOT NULL ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(article_from_row).collect()
    }

    async fn set_article_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        let result = sqlx::query("UPDATE articles SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(Vector::from(embedding.to_vec()))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(crate::NewsRecError::ArticleNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn upsert_article(&self, article: &Article) -> Result<()> {
        let fact_check = article
            .fact_check
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            "INSERT INTO articles (id, title, content, source, url, published_at,
                                   embedding, sentiment, summary, fact_check, score)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                source = EXCLUDED.source,
                url = EXCLUDED.url,
                published_at = EXCLUDED.published_at,
                embedding = COALESCE(EXCLUDED.embedding, articles.embedding),
                sentiment = COALESCE(EXCLUDED.sentiment, articles.sentiment),
                summary = COALESCE(EXCLUDED.summary, articles.summary),
                fact_check = COALESCE(EXCLUDED.fact_check, articles.fact_check),
                score = COALESCE(EXCLUDED.score, articles.score)",
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.source)
        .bind(&article.url)
        .bind(article.published_at)
        .bind(article.embedding.as_ref().map(|e| Vector::from(e.clone())))
        .bind(&article.sentiment)
        .bind(&article.summary)
        .bind(fact_check)
        .bind(article.score)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY email")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        let entities = user.entities.as_ref().map(serde_json::to_value).transpose()?;

        sqlx::query(
            "INSERT INTO users (email, name, phone_number, liked_article_ids,
                                entities, preference_summary)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (email) DO UPDATE SET
                name = EXCLUDED.name,
                phone_number = EXCLUDED.phone_number,
                liked_article_ids = EXCLUDED.liked_article_ids,
                entities = COALESCE(EXCLUDED.entities, users.entities),
                preference_summary = COALESCE(EXCLUDED.preference_summary, users.preference_summary)",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.phone_number)
        .bind(serde_json::to_value(&user.liked_article_ids)?)
        .bind(entities)
        .bind(&user.preference_summary)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_user_entities(&self, email: &str, entities: &AggregatedEntities) -> Result<()> {
        let result = sqlx::query("UPDATE users SET entities = $2 WHERE email = $1")
            .bind(email)
            .bind(serde_json::to_value(entities)?)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(crate::NewsRecError::UserNotFound(email.to_string()));
        }
        Ok(())
    }

    async fn set_user_summary(&self, email: &str, summary: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET preference_summary = $2 WHERE email = $1")
            .bind(email)
            .bind(summary)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(crate::NewsRecError::UserNotFound(email.to_string()));
        }
        Ok(())
    }

    async fn replace_recommendations(
        &self,
        email: &str,
        articles: &[RecommendedArticle],
    ) -> Result<()> {
        // Single upsert statement: the whole list is replaced atomically
        sqlx::query(
            "INSERT INTO recommendations (email, articles, generated_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (email) DO UPDATE SET
                articles = EXCLUDED.articles,
                generated_at = EXCLUDED.generated_at",
        )
        .bind(email)
        .bind(serde_json::to_value(articles)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_recommendations(&self, email: &str) -> Result<Option<RecommendationRecord>> {
        let row = sqlx::query("SELECT * FROM recommendations WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<RecommendationRecord> {
            let articles: serde_json::Value = row.try_get("articles")?;
            let generated_at: DateTime<Utc> = row.try_get("generated_at")?;
            Ok(RecommendationRecord {
                email: row.try_get("email")?,
                articles: serde_json::from_value(articles)?,
                generated_at,
            })
        })
        .transpose()
    }
}
