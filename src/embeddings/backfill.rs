//! Backfill embeddings for articles that lack one

use std::sync::Arc;

use futures::stream::StreamExt;
use futures::stream::{
    self,
};
use tracing::info;
use tracing::warn;

use super::embedding_text;
use super::Embedder;
use crate::errors::Result;
use crate::store::DocumentStore;

/// Concurrent embedding requests in flight during backfill
const EMBED_CONCURRENCY: usize = 8;

/// Compute and persist embeddings for every article currently missing one.
///
/// Idempotent: articles that already carry an embedding are never touched,
/// and a run with nothing to do returns zero updates. A failure on one
/// article is logged and counted; it never aborts the batch.
pub async fn backfill_article_embeddings(
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
) -> Result<BackfillStats> {
    info!("Starting article embeddings backfill");

    let mut stats = BackfillStats::default();

    let articles = store.list_articles_missing_embedding().await?;
    stats.total = articles.len();

    if articles.is_empty() {
        info!("All articles already have embeddings. Nothing to do.");
        return Ok(stats);
    }

    info!("Found {} articles to embed", articles.len());

    // Embedding calls run with bounded concurrency; store writes stay
    // sequential so a store failure aborts the batch deterministically.
    let concurrency = std::cmp::min(articles.len(), EMBED_CONCURRENCY);
    let embedded: Vec<(String, crate::Result<Vec<f32>>)> = stream::iter(articles.iter())
        .map(|article| {
            let embedder = Arc::clone(&embedder);
            async move {
                let text = embedding_text(&article.title, &article.content);
                (article.id.clone(), embedder.embed(&text).await)
            }
        })
        .buffered(concurrency)
        .collect()
        .await;

    for (article_id, result) in embedded {
        match result {
            Ok(embedding) => {
                store.set_article_embedding(&article_id, &embedding).await?;
                stats.updated += 1;
            }
            Err(e) => {
                warn!("Failed to embed article {}: {}", article_id, e);
                stats.failed += 1;
            }
        }
    }

    info!(
        "Backfill complete: {} updated, {} failed of {} total",
        stats.updated, stats.failed, stats.total
    );

    Ok(stats)
}

/// Statistics from a backfill run
#[derive(Debug, Default)]
pub struct BackfillStats {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
}

impl BackfillStats {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.updated as f64 / self.total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::models::Article;
    use crate::store::MemoryStore;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("poison") {
                return Err(crate::NewsRecError::Embedding("bad document".to_string()));
            }
            Ok(vec![1.0, 0.0, 0.0])
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn article(id: &str, content: &str, embedding: Option<Vec<f32>>) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Title {id}"),
            content: content.to_string(),
            source: "wire".to_string(),
            url: None,
            published_at: None,
            embedding,
            sentiment: None,
            summary: None,
            fact_check: None,
            score: None,
        }
    }

    #[tokio::test]
    async fn backfill_embeds_only_missing_articles() {
        let store = Arc::new(MemoryStore::seeded(
            vec![
                article("a1", "one", None),
                article("a2", "two", Some(vec![9.0, 9.0, 9.0])),
                article("a3", "three", None),
            ],
            vec![],
        ));

        let stats = backfill_article_embeddings(store.clone(), Arc::new(FixedEmbedder))
            .await
            .unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.failed, 0);

        // The pre-existing embedding is untouched
        let a2 = store.get_article("a2").await.unwrap().unwrap();
        assert_eq!(a2.embedding.unwrap(), vec![9.0, 9.0, 9.0]);

        // Re-running is a no-op
        let stats = backfill_article_embeddings(store, Arc::new(FixedEmbedder))
            .await
            .unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.updated, 0);
    }

    #[tokio::test]
    async fn one_bad_article_does_not_abort_the_batch() {
        let store = Arc::new(MemoryStore::seeded(
            vec![
                article("a1", "fine", None),
                article("a2", "poison pill", None),
                article("a3", "also fine", None),
            ],
            vec![],
        ));

        let stats = backfill_article_embeddings(store.clone(), Arc::new(FixedEmbedder))
            .await
            .unwrap();
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.failed, 1);

        assert!(store
            .get_article("a2")
            .await
            .unwrap()
            .unwrap()
            .embedding
            .is_none());
    }
}
