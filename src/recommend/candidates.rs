//! Candidate generation by embedding similarity

use crate::models::Article;

/// An article shortlisted by similarity, pending re-ranking
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub similarity: f32,
}

/// Cosine similarity between two vectors.
///
/// Defined as 0.0 when either norm is zero or the dimensions differ, so a
/// degenerate vector can never fault the ranking pass.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Rank every embedded article against the summary embedding, top `top_n`.
///
/// Articles without an embedding are invisible here. Ordering is
/// deterministic: descending similarity, ties broken by id ascending.
/// No embedded articles is a valid outcome yielding an empty list.
#[must_use]
pub fn generate_candidates(
    summary_embedding: &[f32],
    articles: &[Article],
    top_n: usize,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = articles
        .iter()
        .filter_map(|article| {
            article.embedding.as_ref().map(|embedding| Candidate {
                id: article.id.clone(),
                title: article.title.clone(),
                similarity: cosine_similarity(summary_embedding, embedding),
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.truncate(top_n);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, embedding: Option<Vec<f32>>) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Title {id}"),
            content: String::new(),
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

    #[test]
    fn cosine_matches_independent_computation() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let expected = 32.0 / (14.0_f32.sqrt() * 77.0_f32.sqrt());
        assert!((cosine_similarity(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn zero_norm_vectors_yield_exactly_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0], &[0.0]), 0.0);
    }

    #[test]
    fn dimension_mismatch_yields_zero_not_panic() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = [0.3, -0.5, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn articles_without_embedding_are_invisible() {
        let articles = vec![
            article("a1", Some(vec![1.0, 0.0])),
            article("a2", None),
            article("a3", Some(vec![0.0, 1.0])),
        ];
        let candidates = generate_candidates(&[1.0, 0.0], &articles, 10);
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a3"]);
    }

    #[test]
    fn ordering_is_descending_with_id_tiebreak() {
        let articles = vec![
            // a2 and a1 are identical vectors: tie broken by id ascending
            article("a2", Some(vec![1.0, 0.0])),
            article("a1", Some(vec![1.0, 0.0])),
            article("a3", Some(vec![0.5, 0.5])),
        ];
        let candidates = generate_candidates(&[1.0, 0.0], &articles, 10);
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn ordering_is_deterministic_across_reruns() {
        let articles: Vec<Article> = (0..20)
            .map(|i| {
                article(
                    &format!("a{i:02}"),
                    Some(vec![(i % 5) as f32, (i % 3) as f32, 1.0]),
                )
            })
            .collect();
        let query = [0.7, 0.2, 0.1];

        let first: Vec<String> = generate_candidates(&query, &articles, 10)
            .into_iter()
            .map(|c| c.id)
            .collect();
        let second: Vec<String> = generate_candidates(&query, &articles, 10)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(generate_candidates(&[1.0], &[], 5).is_empty());
        let unembedded = vec![article("a1", None)];
        assert!(generate_candidates(&[1.0], &unembedded, 5).is_empty());
    }

    #[test]
    fn top_n_truncates() {
        let articles: Vec<Article> = (0..8)
            .map(|i| article(&format!("a{i}"), Some(vec![1.0, i as f32])))
            .collect();
        assert_eq!(generate_candidates(&[1.0, 1.0], &articles, 3).len(), 3);
    }
}
