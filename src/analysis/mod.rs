//! User preference analysis
//!
//! Turns a user's aggregated entities, plus lightweight keyword heuristics
//! over their liked article titles, into a free-text preference summary via
//! the summarization oracle. The summary is best-effort natural language:
//! it is never parsed, and a failed call surfaces as "no summary" for that
//! user rather than being retried beyond the provider fallback.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::models::User;
use crate::oracle::ProviderManager;
use crate::store::DocumentStore;
use crate::Result;

const POSITIVE_KEYWORDS: &[&str] = &["success", "win", "victory", "growth", "celebration"];
const NEGATIVE_KEYWORDS: &[&str] = &["crisis", "death", "attack", "violence", "scandal"];
const NEUTRAL_KEYWORDS: &[&str] = &["report", "study", "analysis", "meeting", "update"];

/// Keyword-based sentiment hit counts over liked titles
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SentimentSignals {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

/// Count sentiment keyword hits across a set of titles.
///
/// A deliberately light heuristic: it seeds the summarization prompt, it is
/// not a sentiment classifier.
pub fn sentiment_signals<'a, I>(titles: I) -> SentimentSignals
where
    I: IntoIterator<Item = &'a str>,
{
    let mut signals = SentimentSignals::default();
    for title in titles {
        let lower = title.to_lowercase();
        if POSITIVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            signals.positive += 1;
        }
        if NEGATIVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            signals.negative += 1;
        }
        if NEUTRAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            signals.neutral += 1;
        }
    }
    signals
}

/// Strip trailing feed artifacts like "… 5 hrs agoWorld & Sport" that
/// scrapers leave glued to titles.
#[must_use]
pub fn clean_title(title: &str) -> String {
    for marker in ["hrs ago", "hr ago"] {
        if let Some(pos) = title.rfind(marker) {
            let tail = &title[pos + marker.len()..];
            if tail
                .chars()
                .all(|c| c.is_alphabetic() || c.is_whitespace() || c == '&')
            {
                let head = title[..pos].trim_end();
                let head = head.trim_end_matches(|c: char| c.is_ascii_digit());
                return head.trim_end().to_string();
            }
        }
    }
    title.trim().to_string()
}

/// Whole-run counters for `run_for_all_users`
#[derive(Debug, Default)]
pub struct SummaryRunStats {
    pub users: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Generates per-user preference summaries via the summarization oracle
pub struct PreferenceSummarizer {
    store: Arc<dyn DocumentStore>,
    providers: Arc<ProviderManager>,
}

impl PreferenceSummarizer {
    pub fn new(store: Arc<dyn DocumentStore>, providers: Arc<ProviderManager>) -> Self {
        Self { store, providers }
    }

    /// Produce a preference summary for one user.
    ///
    /// Returns `None` (logged) when the user has no aggregated entities yet
    /// or the oracle call fails; such users are excluded from ranking for
    /// this run.
    pub async fn summarize(&self, user: &User) -> Result<Option<String>> {
        let Some(entities) = user.entities.as_ref().filter(|e| !e.is_empty()) else {
            warn!("Skipping user {} (no aggregated entities).", user.email);
            return Ok(None);
        };

        let mut titles = Vec::new();
        for article_id in &user.liked_article_ids {
            if let Some(article) = self.store.get_article(article_id.trim()).await? {
                titles.push(clean_title(&article.title));
            }
        }
        let signals = sentiment_signals(titles.iter().map(String::as_str));

        let prompt = format!(
            "You are an expert user behavior analyst specializing in news consumption patterns. \
             Base most of your analysis on the named entities (persons, organizations, locations) \
             below. Use the sentiment keyword counts only as secondary hints. Provide a detailed, \
             paragraph-style summary of the user's interests.\n\n\
             Entities:\n{}\n\nSentiment keyword counts:\n{}",
            serde_json::to_string_pretty(entities)?,
            serde_json::to_string(&signals)?,
        );

        match self.providers.complete_with_fallback(&prompt).await {
            Ok(text) => {
                let summary = text.trim();
                if summary.is_empty() {
                    warn!("Empty summary produced for user {}", user.email);
                    Ok(None)
                } else {
                    Ok(Some(summary.to_string()))
                }
            }
            Err(e) => {
                warn!("Failed to generate summary for user {}: {}", user.email, e);
                Ok(None)
            }
        }
    }

    /// Regenerate and persist summaries for every user, overwriting prior ones
    pub async fn run_for_all_users(&self) -> Result<SummaryRunStats> {
        info!("Starting preference summarization pass");

        let users = self.store.list_users().await?;
        let mut run = SummaryRunStats {
            users: users.len(),
            ..SummaryRunStats::default()
        };

        for user in &users {
            match self.summarize(user).await? {
                Some(summary) => {
                    self.store.set_user_summary(&user.email, &summary).await?;
                    info!("Generated preference summary for {}", user.email);
                    run.updated += 1;
                }
                None => run.skipped += 1,
            }
        }

        info!(
            "Summarization pass complete: {} users, {} updated, {} skipped",
            run.users, run.updated, run.skipped
        );
        Ok(run)
    }
}
