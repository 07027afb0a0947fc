//! Minimal ranker.
//!
//! Deterministic fallback with no tunable weights: title-token hit ratio
//! weighted 0.6 plus full-text hit ratio weighted 0.4. Used directly when
//! nothing better is configured and as the landing strategy when the LLM
//! ranker fails.

use super::{sort_by_relevance, tokenize, Ranker};
use crate::paper::PaperCandidate;
use async_trait::async_trait;
use std::collections::HashSet;

pub struct MinimalRanker;

impl MinimalRanker {
    fn score(candidate: &PaperCandidate, query_tokens: &[String]) -> f64 {
        if query_tokens.is_empty() {
            return 0.0;
        }

        let title_tokens: HashSet<String> = tokenize(&candidate.title).into_iter().collect();
        let full_text = format!("{} {}", candidate.title, candidate.abstract_text);
        let full_tokens: HashSet<String> = tokenize(&full_text).into_iter().collect();

        let title_hits = query_tokens
            .iter()
            .filter(|t| title_tokens.contains(*t))
            .count() as f64;
        let full_hits = query_tokens
            .iter()
            .filter(|t| full_tokens.contains(*t))
            .count() as f64;
        let total = query_tokens.len() as f64;

        0.6 * (title_hits / total) + 0.4 * (full_hits / total)
    }
}

#[async_trait]
impl Ranker for MinimalRanker {
    fn name(&self) -> &'static str {
        "minimal"
    }

    async fn rank(
        &self,
        candidates: &mut Vec<PaperCandidate>,
        query: &str,
        _target_text: Option<&str>,
        _target_keywords: &[String],
    ) {
        let query_tokens = tokenize(query);
        for candidate in candidates.iter_mut() {
            candidate.relevance = Self::score(candidate, &query_tokens);
        }
        sort_by_relevance(candidates);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_title_hits_dominate() {
        let ranker = MinimalRanker;
        let mut candidates = vec![
            PaperCandidate {
                title: "Irrelevant heading".to_string(),
                abstract_text: "transformer attention models".to_string(),
                ..Default::default()
            },
            PaperCandidate {
                title: "Transformer attention models".to_string(),
                abstract_text: String::new(),
                ..Default::default()
            },
        ];
        ranker
            .rank(&mut candidates, "transformer attention", None, &[])
            .await;
        assert_eq!(candidates[0].title, "Transformer attention models");
        // title match scores 0.6 + 0.4, abstract-only match scores just 0.4
        assert!((candidates[0].relevance - 1.0).abs() < 1e-9);
        assert!((candidates[1].relevance - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_query_scores_zero() {
        let ranker = MinimalRanker;
        let mut candidates = vec![PaperCandidate {
            title: "Anything".to_string(),
            ..Default::default()
        }];
        ranker.rank(&mut candidates, "", None, &[]).await;
        assert_eq!(candidates[0].relevance, 0.0);
    }
}
