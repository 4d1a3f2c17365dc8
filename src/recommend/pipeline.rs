//! Complete recommendation pipeline: backfill -> NER -> summaries -> ranking

use std::sync::Arc;

use tracing::info;
use tracing::warn;

use super::generate_candidates;
use super::rerank;
use crate::analysis::PreferenceSummarizer;
use crate::analysis::SummaryRunStats;
use crate::embeddings::backfill_article_embeddings;
use crate::embeddings::BackfillStats;
use crate::embeddings::Embedder;
use crate::models::RecommendedArticle;
use crate::models::User;
use crate::ner::EntityAggregator;
use crate::ner::NerRunStats;
use crate::oracle::ProviderManager;
use crate::store::DocumentStore;
use crate::Result;

/// Success/skip/failure counters for the ranking stage
#[derive(Debug, Default)]
pub struct StageStats {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Per-stage outcome of one full pipeline run
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub backfill: BackfillStats,
    pub ner: NerRunStats,
    pub summaries: SummaryRunStats,
    pub ranking: StageStats,
}

/// The full recommendation service
pub struct RecommendPipeline {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    providers: Arc<ProviderManager>,
    top_n: usize,
    top_m: usize,
}

impl RecommendPipeline {
    /// Create the pipeline from already-constructed services.
    ///
    /// `embedder` serves both article backfill and query-time summary
    /// embedding; passing one handle keeps the embedding spaces aligned.
    pub fn from_services(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        providers: Arc<ProviderManager>,
        top_n: usize,
        top_m: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            providers,
            top_n,
            top_m,
        }
    }

    /// Run every stage over every reachable item.
    ///
    /// Item-level failures are counted, never propagated; only store-level
    /// errors abort a stage.
    pub async fn run(&self) -> Result<PipelineReport> {
        let run_id = uuid::Uuid::new_v4();
        info!("Starting full recommendation pipeline (run {})", run_id);
        let mut report = PipelineReport::default();

        report.backfill =
            backfill_article_embeddings(Arc::clone(&self.store), Arc::clone(&self.embedder))
                .await?;

        let aggregator =
            EntityAggregator::new(Arc::clone(&self.store), Arc::clone(&self.providers));
        report.ner = aggregator.run_for_all_users().await?;

        let summarizer =
            PreferenceSummarizer::new(Arc::clone(&self.store), Arc::clone(&self.providers));
        report.summaries = summarizer.run_for_all_users().await?;

        // Re-fetch users so the ranking stage sees the summaries written above
        let users = self.store.list_users().await?;
        let articles = self.store.list_articles_with_embedding().await?;
        info!(
            "Ranking stage: {} users over {} embedded articles",
            users.len(),
            articles.len()
        );

        for user in &users {
            match self.rank_user(user, &articles).await {
                Ok(Some(count)) => {
                    info!("Persisted {} recommendations for {}", count, user.email);
                    report.ranking.processed += 1;
                }
                Ok(None) => report.ranking.skipped += 1,
                Err(e) => {
                    warn!("Ranking failed for user {}: {}", user.email, e);
                    report.ranking.failed += 1;
                }
            }
        }

        info!(
            "Pipeline run {} complete: ranking {} processed, {} skipped, {} failed",
            run_id, report.ranking.processed, report.ranking.skipped, report.ranking.failed
        );
        Ok(report)
    }

    /// Generate and persist recommendations for a single user, as used by
    /// per-user delivery schedules. The user's summary must already exist.
    pub async fn run_for_user(&self, email: &str) -> Result<Option<Vec<RecommendedArticle>>> {
        let user = self
            .store
            .get_user(email)
            .await?
            .ok_or_else(|| crate::NewsRecError::UserNotFound(email.to_string()))?;

        let articles = self.store.list_articles_with_embedding().await?;
        match self.rank_user(&user, &articles).await? {
            Some(_) => Ok(self
                .store
                .get_recommendations(email)
                .await?
                .map(|record| record.articles)),
            None => Ok(None),
        }
    }

    /// Candidate generation, re-ranking, and persistence for one user.
    ///
    /// Returns `Ok(None)` when the user is skipped (no summary, or no
    /// embedded articles to rank).
    async fn rank_user(
        &self,
        user: &User,
        articles: &[crate::models::Article],
    ) -> Result<Option<usize>> {
        let Some(summary) = user.preference_summary.as_deref().filter(|s| !s.is_empty()) else {
            warn!("User {} has no preference summary. Skipping.", user.email);
            return Ok(None);
        };

        let summary_embedding = self.embedder.embed(summary).await?;
        let candidates = generate_candidates(&summary_embedding, articles, self.top_n);
        if candidates.is_empty() {
            warn!("No embedded articles to rank for {}. Skipping.", user.email);
            return Ok(None);
        }

        let final_ranking = rerank(&self.providers, summary, &candidates, self.top_m).await;

        let recommended: Vec<RecommendedArticle> = final_ranking
            .into_iter()
            .map(|c| RecommendedArticle {
                article_id: c.id,
                title: c.title,
                similarity: round4(c.similarity),
            })
            .collect();

        let count = recommended.len();
        self.store
            .replace_recommendations(&user.email, &recommended)
            .await?;
        Ok(Some(count))
    }
}

/// Similarity scores are persisted at 4 decimal places
fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::models::Article;
    use crate::oracle::Oracle;
    use crate::store::MemoryStore;

    /// Embedder that hashes known texts to fixed vectors
    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            // Summaries mentioning "sports" land near the sports axis
            if text.contains("sports") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct CannedOracle(&'static str);

    #[async_trait]
    impl Oracle for CannedOracle {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn article(id: &str, embedding: Vec<f32>) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Title {id}"),
            content: format!("Content {id}"),
            source: "wire".to_string(),
            url: None,
            published_at: None,
            embedding: Some(embedding),
            sentiment: None,
            summary: None,
            fact_check: None,
            score: None,
        }
    }

    fn pipeline(store: Arc<MemoryStore>, oracle_reply: &'static str) -> RecommendPipeline {
        let oracle = Arc::new(CannedOracle(oracle_reply));
        RecommendPipeline::from_services(
            store,
            Arc::new(StubEmbedder),
            Arc::new(ProviderManager::new(oracle.clone(), oracle)),
            10,
            2,
        )
    }

    #[tokio::test]
    async fn user_without_summary_is_skipped() {
        let store = Arc::new(MemoryStore::seeded(
            vec![article("a1", vec![1.0, 0.0])],
            vec![User::new("u@example.com")],
        ));
        let pipeline = pipeline(store.clone(), r#"["a1"]"#);

        let result = pipeline.run_for_user("u@example.com").await.unwrap();
        assert!(result.is_none());
        assert!(store
            .get_recommendations("u@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn run_for_user_persists_reranked_list() {
        let mut user = User::new("u@example.com");
        user.preference_summary = Some("Follows sports closely".to_string());

        let store = Arc::new(MemoryStore::seeded(
            vec![
                article("a1", vec![1.0, 0.0]),
                article("a2", vec![0.9, 0.1]),
                article("a3", vec![0.0, 1.0]),
            ],
            vec![user],
        ));
        let pipeline = pipeline(store.clone(), r#"["a2", "a1", "a3"]"#);

        let result = pipeline.run_for_user("u@example.com").await.unwrap().unwrap();
        let ids: Vec<&str> = result.iter().map(|r| r.article_id.as_str()).collect();
        // Oracle order, truncated to top_m = 2
        assert_eq!(ids, vec!["a2", "a1"]);
    }

    #[tokio::test]
    async fn run_twice_is_idempotent() {
        let mut user = User::new("u@example.com");
        user.preference_summary = Some("Follows sports closely".to_string());

        let store = Arc::new(MemoryStore::seeded(
            vec![article("a1", vec![1.0, 0.0]), article("a2", vec![0.5, 0.5])],
            vec![user],
        ));
        let pipeline = pipeline(store.clone(), r#"["a1", "a2"]"#);

        pipeline.run_for_user("u@example.com").await.unwrap();
        let first = store
            .get_recommendations("u@example.com")
            .await
            .unwrap()
            .unwrap();

        pipeline.run_for_user("u@example.com").await.unwrap();
        let second = store
            .get_recommendations("u@example.com")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.articles, second.articles);
    }

    #[tokio::test]
    async fn unknown_user_errors() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store, "[]");
        let err = pipeline.run_for_user("ghost@example.com").await.unwrap_err();
        assert!(matches!(err, crate::NewsRecError::UserNotFound(_)));
    }

    #[test]
    fn round4_truncates_to_four_decimals() {
        assert!((round4(0.123_456) - 0.1235).abs() < 1e-6);
        assert!((round4(1.0) - 1.0).abs() < 1e-6);
    }
}
