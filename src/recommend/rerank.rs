//! LLM re-ranking of the candidate shortlist
//!
//! The oracle sees the user summary plus `{_id, title}` pairs only; full
//! article content never enters the prompt. Every failure mode, from quota
//! exhaustion on both providers to hallucinated ids, degrades to the
//! similarity ordering instead of erroring out the pipeline.

use serde_json::json;
use tracing::debug;
use tracing::warn;

use super::Candidate;
use crate::oracle::extract_ranked_ids;
use crate::oracle::parse_json_output;
use crate::oracle::OracleJson;
use crate::oracle::ProviderManager;

/// Re-rank candidates via the ranking oracle, returning at most `top_m`.
///
/// Ids in the oracle's reply are mapped back to candidates in the oracle's
/// order; ids outside the candidate set are silently dropped. When nothing
/// usable comes back, the first `top_m` candidates in similarity order are
/// returned unchanged.
pub async fn rerank(
    providers: &ProviderManager,
    user_summary: &str,
    candidates: &[Candidate],
    top_m: usize,
) -> Vec<Candidate> {
    if candidates.is_empty() {
        return Vec::new();
    }

    debug!("Re-ranking {} candidates with LLM", candidates.len());

    let response = match providers
        .complete_with_fallback(&ranking_prompt(user_summary, candidates))
        .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!("Ranking oracle failed: {}. Using similarity ordering.", e);
            return similarity_fallback(candidates, top_m);
        }
    };

    let parsed = match parse_json_output(&response) {
        OracleJson::Parsed(value) => value,
        OracleJson::Unparseable(raw) => {
            warn!(
                "Ranking oracle returned no parseable JSON: {:.120}. Using similarity ordering.",
                raw
            );
            return similarity_fallback(candidates, top_m);
        }
    };

    let ranked_ids = extract_ranked_ids(&parsed);
    let reranked: Vec<Candidate> = ranked_ids
        .iter()
        .filter_map(|id| candidates.iter().find(|c| &c.id == id).cloned())
        .take(top_m)
        .collect();

    if reranked.is_empty() {
        warn!("No ranked ids survived candidate mapping. Using similarity ordering.");
        return similarity_fallback(candidates, top_m);
    }

    reranked
}

fn similarity_fallback(candidates: &[Candidate], top_m: usize) -> Vec<Candidate> {
    candidates.iter().take(top_m).cloned().collect()
}

fn ranking_prompt(user_summary: &str, candidates: &[Candidate]) -> String {
    let shortlist: Vec<serde_json::Value> = candidates
        .iter()
        .map(|c| json!({ "_id": c.id, "title": c.title }))
        .collect();

    format!(
        "You are an expert news recommendation engine. You will receive a user preference \
         summary and a shortlist of news articles. Rank the articles in order of relevance \
         and return ONLY their `_id`s in a JSON list.\n\n\
         User Preference Summary:\n{user_summary}\n\n\
         Shortlisted Articles:\n{}",
        serde_json::to_string_pretty(&shortlist).unwrap_or_default()
    )
}
