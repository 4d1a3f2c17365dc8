//! Text embedding module
//!
//! Provides the `Embedder` trait the pipeline depends on and an HTTP client
//! implementation for OpenAI-compatible and Ollama embedding APIs.
//!
//! The same embedder instance must serve both article indexing and
//! query-time summary embedding: cosine similarity is only meaningful
//! within a single embedding space.

use async_trait::async_trait;

pub mod backfill;
pub mod client;

pub use backfill::backfill_article_embeddings;
pub use backfill::BackfillStats;
pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;

use crate::Result;

/// A text-embedding function producing fixed-length vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a fixed-length vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The vector length this embedder produces
    fn dimension(&self) -> usize;
}

/// Text an article is embedded from: title first, single space, then content.
#[must_use]
pub fn embedding_text(title: &str, content: &str) -> String {
    format!("{title} {content}")
}

/// Collapse whitespace runs so multi-line article bodies embed cleanly
#[must_use]
pub fn preprocess_for_embedding(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_text_is_title_first_single_space() {
        assert_eq!(embedding_text("Title", "Body text"), "Title Body text");
    }

    #[test]
    fn preprocess_collapses_whitespace() {
        assert_eq!(
            preprocess_for_embedding("line one\n\nline  two\t end"),
            "line one line two end"
        );
    }
}
