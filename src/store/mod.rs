//! Document store abstraction over the article and user collections
//!
//! Each pipeline stage writes only the field slice it owns (embedding,
//! entities, summary, recommendations), so unrelated derived fields on the
//! same record always survive a stage's pass.

use async_trait::async_trait;

use crate::models::AggregatedEntities;
use crate::models::Article;
use crate::models::RecommendationRecord;
use crate::models::RecommendedArticle;
use crate::models::User;
use crate::Result;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store operations the pipeline stages depend on.
///
/// Articles are keyed by their stable external id, users and recommendation
/// records by the user's email.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single article by id
    async fn get_article(&self, id: &str) -> Result<Option<Article>>;

    /// All articles still lacking an embedding (backfill input)
    async fn list_articles_missing_embedding(&self) -> Result<Vec<Article>>;

    /// All candidate-eligible articles (embedding present)
    async fn list_articles_with_embedding(&self) -> Result<Vec<Article>>;

    /// Set the embedding for one article, leaving every other field untouched
    async fn set_article_embedding(&self, id: &str, embedding: &[f32]) -> Result<()>;

    /// Insert or update an article by id
    async fn upsert_article(&self, article: &Article) -> Result<()>;

    /// All users
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Fetch a single user by email
    async fn get_user(&self, email: &str) -> Result<Option<User>>;

    /// Insert or update a user by email
    async fn upsert_user(&self, user: &User) -> Result<()>;

    /// Overwrite a user's aggregated entities
    async fn set_user_entities(&self, email: &str, entities: &AggregatedEntities) -> Result<()>;

    /// Overwrite a user's preference summary
    async fn set_user_summary(&self, email: &str, summary: &str) -> Result<()>;

    /// Replace (not merge) the stored recommendation list for a user
    async fn replace_recommendations(
        &self,
        email: &str,
        articles: &[RecommendedArticle],
    ) -> Result<()>;

    /// Fetch the current recommendation record for a user
    async fn get_recommendations(&self, email: &str) -> Result<Option<RecommendationRecord>>;
}
