//! In-memory document store for tests and local experiments

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::DocumentStore;
use crate::models::AggregatedEntities;
use crate::models::Article;
use crate::models::RecommendationRecord;
use crate::models::RecommendedArticle;
use crate::models::User;
use crate::Result;

/// HashMap-backed store with the same semantics as `PgStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    articles: Mutex<HashMap<String, Article>>,
    users: Mutex<HashMap<String, User>>,
    recommendations: Mutex<HashMap<String, RecommendationRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with articles and users in one call
    #[must_use]
    pub fn seeded(articles: Vec<Article>, users: Vec<User>) -> Self {
        let store = Self::new();
        {
            let mut map = store.articles.lock().expect("articles lock");
            for article in articles {
                map.insert(article.id.clone(), article);
            }
        }
        {
            let mut map = store.users.lock().expect("users lock");
            for user in users {
                map.insert(user.email.clone(), user);
            }
        }
        store
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        Ok(self.articles.lock().expect("articles lock").get(id).cloned())
    }

    async fn list_articles_missing_embedding(&self) -> Result<Vec<Article>> {
        let mut articles: Vec<Article> = self
            .articles
            .lock()
            .expect("articles lock")
            .values()
            .filter(|a| a.embedding.is_none())
            .cloned()
            .collect();
        articles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(articles)
    }

    async fn list_articles_with_embedding(&self) -> Result<Vec<Article>> {
        let mut articles: Vec<Article> = self
            .articles
            .lock()
            .expect("articles lock")
            .values()
            .filter(|a| a.embedding.is_some())
            .cloned()
            .collect();
        articles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(articles)
    }

    async fn set_article_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        let mut map = self.articles.lock().expect("articles lock");
        let article = map
            .get_mut(id)
            .ok_or_else(|| crate::NewsRecError::ArticleNotFound(id.to_string()))?;
        article.embedding = Some(embedding.to_vec());
        Ok(())
    }

    async fn upsert_article(&self, article: &Article) -> Result<()> {
        self.articles
            .lock()
            .expect("articles lock")
            .insert(article.id.clone(), article.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .expect("users lock")
            .values()
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.lock().expect("users lock").get(email).cloned())
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        self.users
            .lock()
            .expect("users lock")
            .insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn set_user_entities(&self, email: &str, entities: &AggregatedEntities) -> Result<()> {
        let mut map = self.users.lock().expect("users lock");
        let user = map
            .get_mut(email)
            .ok_or_else(|| crate::NewsRecError::UserNotFound(email.to_string()))?;
        user.entities = Some(entities.clone());
        Ok(())
    }

    async fn set_user_summary(&self, email: &str, summary: &str) -> Result<()> {
        let mut map = self.users.lock().expect("users lock");
        let user = map
            .get_mut(email)
            .ok_or_else(|| crate::NewsRecError::UserNotFound(email.to_string()))?;
        user.preference_summary = Some(summary.to_string());
        Ok(())
    }

    async fn replace_recommendations(
        &self,
        email: &str,
        articles: &[RecommendedArticle],
    ) -> Result<()> {
        self.recommendations.lock().expect("recommendations lock").insert(
            email.to_string(),
            RecommendationRecord {
                email: email.to_string(),
                articles: articles.to_vec(),
                generated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_recommendations(&self, email: &str) -> Result<Option<RecommendationRecord>> {
        Ok(self
            .recommendations
            .lock()
            .expect("recommendations lock")
            .get(email)
            .cloned())
    }
}
