//! Recommendation engine: candidate generation, LLM re-ranking, pipeline

pub mod candidates;
pub mod pipeline;
pub mod rerank;

pub use candidates::cosine_similarity;
pub use candidates::generate_candidates;
pub use candidates::Candidate;
pub use pipeline::PipelineReport;
pub use pipeline::RecommendPipeline;
pub use pipeline::StageStats;
pub use rerank::rerank;
