use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fact-check result written by an out-of-scope verification stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactCheck {
    pub verdict: bool,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// A scraped news article.
///
/// `embedding` is set exactly once by the backfill pass; the remaining
/// derived fields are mutated independently by unrelated batch jobs and
/// may be absent or partially populated at any point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub fact_check: Option<FactCheck>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl Article {
    /// An article is visible to the candidate generator iff it has an embedding.
    #[must_use]
    pub const fn is_candidate_eligible(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Aggregated named entities for a user, one sorted unique list per category.
///
/// Serializes with the exact category keys the extraction oracle returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedEntities {
    #[serde(rename = "Person", default)]
    pub person: Vec<String>,
    #[serde(rename = "Location", default)]
    pub location: Vec<String>,
    #[serde(rename = "Organization", default)]
    pub organization: Vec<String>,
}

impl AggregatedEntities {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.person.is_empty() && self.location.is_empty() && self.organization.is_empty()
    }

    /// Total entity count across all categories
    #[must_use]
    pub fn len(&self) -> usize {
        self.person.len() + self.location.len() + self.organization.len()
    }
}

/// A user and their accumulated preference signals.
///
/// `entities` and `preference_summary` are derived state, regenerated by
/// their own pipeline stages and overwritten rather than appended to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Ids of articles the user liked; order carries no meaning
    #[serde(default)]
    pub liked_article_ids: Vec<String>,
    #[serde(default)]
    pub entities: Option<AggregatedEntities>,
    #[serde(default)]
    pub preference_summary: Option<String>,
}

impl User {
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            phone_number: None,
            liked_article_ids: Vec::new(),
            entities: None,
            preference_summary: None,
        }
    }

    /// Display name, falling back to the email identity
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// One entry of a persisted recommendation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedArticle {
    pub article_id: String,
    pub title: String,
    pub similarity: f32,
}

/// Per-user recommendation record, fully replaced on each pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub email: String,
    pub articles: Vec<RecommendedArticle>,
    pub generated_at: DateTime<Utc>,
}
