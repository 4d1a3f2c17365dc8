//! LLM oracle layer
//!
//! Every LLM-backed call in the pipeline (entity extraction, preference
//! summarization, re-ranking) goes through an [`Oracle`]: an opaque
//! prompt-in/text-out function with a known failure mode. The
//! [`ProviderManager`] owns which concrete provider backs the oracle and
//! performs the one-way primary-to-secondary switch on quota exhaustion.

use async_trait::async_trait;

pub mod client;
pub mod parse;
pub mod provider;

pub use client::LlmClient;
pub use parse::extract_ranked_ids;
pub use parse::parse_json_output;
pub use parse::OracleJson;
pub use provider::Provider;
pub use provider::ProviderManager;

use crate::Result;

/// An external LLM-backed completion call
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Run the prompt and return the raw text response
    async fn complete(&self, prompt: &str) -> Result<String>;
}
