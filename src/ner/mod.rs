//! Named-entity aggregation
//!
//! Runs entity extraction over every article a user engaged with and unions
//! the results into the user's aggregated entity sets. Aggregates are always
//! recomputed from the full engagement set; there is no incremental removal
//! because per-article attribution is not retained.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use tracing::warn;

use crate::models::AggregatedEntities;
use crate::models::User;
use crate::oracle::parse_json_output;
use crate::oracle::OracleJson;
use crate::oracle::ProviderManager;
use crate::store::DocumentStore;
use crate::Result;

/// Per-user aggregation counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NerUserStats {
    /// Articles whose entities made it into the aggregate
    pub processed: usize,
    /// Articles skipped before extraction (blank id, missing, empty content)
    pub skipped: usize,
    /// Articles where extraction or parsing failed
    pub failed: usize,
}

/// Whole-run counters for `run_for_all_users`
#[derive(Debug, Default)]
pub struct NerRunStats {
    pub users: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Aggregates named entities per user via the extraction oracle
pub struct EntityAggregator {
    store: Arc<dyn DocumentStore>,
    providers: Arc<ProviderManager>,
}

impl EntityAggregator {
    pub fn new(store: Arc<dyn DocumentStore>, providers: Arc<ProviderManager>) -> Self {
        Self { store, providers }
    }

    /// Aggregate entities across every article the user engaged with.
    ///
    /// Individual articles are skipped (missing, empty content, extraction
    /// or parse failure) without failing the user; only store errors
    /// propagate. An empty engagement set yields three empty lists and
    /// never invokes the oracle.
    pub async fn aggregate_for_user(
        &self,
        user: &User,
    ) -> Result<(AggregatedEntities, NerUserStats)> {
        let mut stats = NerUserStats::default();
        let mut person = BTreeSet::new();
        let mut location = BTreeSet::new();
        let mut organization = BTreeSet::new();

        for raw_id in &user.liked_article_ids {
            let article_id = raw_id.trim();
            if article_id.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let Some(article) = self.store.get_article(article_id).await? else {
                warn!(
                    "Article {} not found for user {}. Skipping.",
                    article_id, user.email
                );
                stats.skipped += 1;
                continue;
            };

            if article.content.trim().is_empty() {
                warn!(
                    "Article {} has no content for user {}. Skipping.",
                    article_id, user.email
                );
                stats.skipped += 1;
                continue;
            }

            let response = match self
                .providers
                .complete_with_fallback(&extraction_prompt(&article.content))
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        "Entity extraction failed for article {} (user {}): {}",
                        article_id, user.email, e
                    );
                    stats.failed += 1;
                    continue;
                }
            };

            let parsed = match parse_json_output(&response) {
                OracleJson::Parsed(value) => value,
                OracleJson::Unparseable(raw) => {
                    warn!(
                        "Could not parse entity JSON for article {}: {:.120}",
                        article_id, raw
                    );
                    stats.failed += 1;
                    continue;
                }
            };

            if !merge_extracted(&parsed, &mut person, &mut location, &mut organization) {
                warn!(
                    "Entity response for article {} is not an object. Skipping.",
                    article_id
                );
                stats.failed += 1;
                continue;
            }

            stats.processed += 1;
        }

        let entities = AggregatedEntities {
            person: person.into_iter().collect(),
            location: location.into_iter().collect(),
            organization: organization.into_iter().collect(),
        };

        Ok((entities, stats))
    }

    /// Recompute and persist aggregates for every user
    pub async fn run_for_all_users(&self) -> Result<NerRunStats> {
        info!("Starting NER aggregation pass");

        let users = self.store.list_users().await?;
        let mut run = NerRunStats {
            users: users.len(),
            ..NerRunStats::default()
        };

        for user in &users {
            let (entities, stats) = self.aggregate_for_user(user).await?;
            info!(
                "User {}: {} processed, {} skipped, {} failed; {} entities",
                user.email,
                stats.processed,
                stats.skipped,
                stats.failed,
                entities.len()
            );

            match self.store.set_user_entities(&user.email, &entities).await {
                Ok(()) => run.updated += 1,
                Err(e) => {
                    warn!("Failed to save entities for user {}: {}", user.email, e);
                    run.failed += 1;
                }
            }
        }

        info!(
            "NER pass complete: {} users, {} updated, {} failed",
            run.users, run.updated, run.failed
        );
        Ok(run)
    }
}

/// Prompt for the entity-extraction oracle
fn extraction_prompt(content: &str) -> String {
    format!(
        "Extract all unique named entities from the following news article text and categorize them \
         as \"Person\", \"Location\" (including cities/countries/regions), or \"Organization\" \
         (companies, institutions). Return strictly a JSON object in this format:\n\
         {{\n  \"Person\": [list of unique person names],\n  \"Location\": [list of unique locations],\n  \"Organization\": [list of unique organizations]\n}}\n\
         Do not include any other text, comments, or explanations. Return valid JSON only.\n\n\
         Article:\n{content}"
    )
}

/// Merge one article's extracted entities into the per-category sets.
///
/// Entries are trimmed; non-string and empty entries are ignored. Returns
/// false when the value is not a JSON object at all.
fn merge_extracted(
    value: &Value,
    person: &mut BTreeSet<String>,
    location: &mut BTreeSet<String>,
    organization: &mut BTreeSet<String>,
) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };

    for (key, target) in [
        ("Person", &mut *person),
        ("Location", &mut *location),
        ("Organization", &mut *organization),
    ] {
        if let Some(entries) = map.get(key).and_then(Value::as_array) {
            for entry in entries {
                if let Some(s) = entry.as_str() {
                    let trimmed = s.trim();
                    if !trimmed.is_empty() {
                        target.insert(trimmed.to_string());
                    }
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;

    use super::*;
    use crate::models::Article;
    use crate::oracle::Oracle;
    use crate::store::MemoryStore;

    /// Oracle returning a canned reply per call, counting invocations
    struct ScriptedOracle {
        replies: Vec<String>,
        calls: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: replies.into_iter().map(String::from).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .replies
                .get(call)
                .cloned()
                .unwrap_or_else(|| "{}".to_string()))
        }
    }

    fn article(id: &str, content: &str) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Title {id}"),
            content: content.to_string(),
            source: "wire".to_string(),
            url: None,
            published_at: None,
            embedding: None,
            sentiment: None,
            summary: None,
            fact_check: None,
            score: None,
        }
    }

    fn user_with_likes(likes: &[&str]) -> User {
        let mut user = User::new("u@example.com");
        user.liked_article_ids = likes.iter().map(ToString::to_string).collect();
        user
    }

    fn aggregator(
        store: Arc<MemoryStore>,
        oracle: Arc<ScriptedOracle>,
    ) -> (EntityAggregator, Arc<ScriptedOracle>) {
        let providers = Arc::new(ProviderManager::new(oracle.clone(), oracle.clone()));
        (EntityAggregator::new(store, providers), oracle)
    }

    #[tokio::test]
    async fn empty_engagement_set_never_calls_the_oracle() {
        let store = Arc::new(MemoryStore::new());
        let (agg, oracle) = aggregator(store, Arc::new(ScriptedOracle::new(vec![])));

        let (entities, stats) = agg.aggregate_for_user(&user_with_likes(&[])).await.unwrap();
        assert_eq!(entities, AggregatedEntities::default());
        assert_eq!(stats, NerUserStats::default());
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_and_empty_articles_are_skipped_not_fatal() {
        let store = Arc::new(MemoryStore::seeded(
            vec![article("a1", "Ada Lovelace visited Oslo."), article("a2", "  ")],
            vec![],
        ));
        let (agg, oracle) = aggregator(
            store,
            Arc::new(ScriptedOracle::new(vec![
                r#"{"Person": ["Ada Lovelace"], "Location": ["Oslo"], "Organization": []}"#,
            ])),
        );

        let (entities, stats) = agg
            .aggregate_for_user(&user_with_likes(&["a1", "a2", "ghost", "  "]))
            .await
            .unwrap();

        assert_eq!(entities.person, vec!["Ada Lovelace"]);
        assert_eq!(entities.location, vec!["Oslo"]);
        assert!(entities.organization.is_empty());
        assert_eq!(stats.processed, 1);
        // a2 (empty content), ghost (missing), "  " (blank id)
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.failed, 0);
        // Only the article with content reached the oracle
        assert_eq!(oracle.call_count(), 1);
    }

    #[tokio::test]
    async fn unparseable_extraction_skips_that_article_only() {
        let store = Arc::new(MemoryStore::seeded(
            vec![article("a1", "one"), article("a2", "two")],
            vec![],
        ));
        let (agg, _) = aggregator(
            store,
            Arc::new(ScriptedOracle::new(vec![
                "not json at all",
                r#"{"Person": ["Marie Curie"], "Location": [], "Organization": ["CERN"]}"#,
            ])),
        );

        let (entities, stats) = agg
            .aggregate_for_user(&user_with_likes(&["a1", "a2"]))
            .await
            .unwrap();

        assert_eq!(entities.person, vec!["Marie Curie"]);
        assert_eq!(entities.organization, vec!["CERN"]);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn entities_are_deduplicated_trimmed_and_sorted() {
        let store = Arc::new(MemoryStore::seeded(
            vec![article("a1", "one"), article("a2", "two")],
            vec![],
        ));
        let (agg, _) = aggregator(
            store,
            Arc::new(ScriptedOracle::new(vec![
                r#"{"Person": ["Zed ", "Ada"], "Location": [""], "Organization": [42]}"#,
                r#"{"Person": ["Ada", "Mia"], "Location": ["Oslo"], "Organization": []}"#,
            ])),
        );

        let (entities, _) = agg
            .aggregate_for_user(&user_with_likes(&["a1", "a2"]))
            .await
            .unwrap();

        assert_eq!(entities.person, vec!["Ada", "Mia", "Zed"]);
        assert_eq!(entities.location, vec!["Oslo"]);
        // Non-string entries are ignored
        assert!(entities.organization.is_empty());
    }

    #[tokio::test]
    async fn run_for_all_users_persists_aggregates() {
        let store = Arc::new(MemoryStore::seeded(
            vec![article("a1", "body")],
            vec![user_with_likes(&["a1"])],
        ));
        let (agg, _) = aggregator(
            store.clone(),
            Arc::new(ScriptedOracle::new(vec![
                r#"{"Person": ["Ada"], "Location": [], "Organization": []}"#,
            ])),
        );

        let run = agg.run_for_all_users().await.unwrap();
        assert_eq!(run.users, 1);
        assert_eq!(run.updated, 1);
        assert_eq!(run.failed, 0);

        let user = store.get_user("u@example.com").await.unwrap().unwrap();
        assert_eq!(user.entities.unwrap().person, vec!["Ada"]);
    }
}
