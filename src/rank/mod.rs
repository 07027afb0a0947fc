//! Relevance ranking strategies.
//!
//! A [`Ranker`] writes a relevance score in [0,1] onto every candidate and
//! leaves the list sorted best-first. Three strategies exist: lexical
//! (weighted token overlap with recency and citation bonuses), minimal (a
//! cheap hit-ratio fallback), and LLM-assisted (one batched chat-completions
//! call, falling back to minimal on any failure).

pub mod lexical;
pub mod llm;
pub mod minimal;

use crate::paper::PaperCandidate;
use async_trait::async_trait;

/// Weights for the lexical ranking signals.
#[derive(Debug, Clone)]
pub struct RankWeights {
    /// Query-token overlap with the title
    pub title: f64,
    /// Query-token overlap with the abstract
    pub abstract_text: f64,
    /// Target keyword appearing in the title
    pub keyword_title: f64,
    /// Target keyword appearing in the abstract
    pub keyword_abstract: f64,
    /// Linear recency decay over the trailing decade
    pub recency: f64,
    /// Log-scaled citation count bonus
    pub citations: f64,
    /// Direct PDF link available
    pub pdf: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            title: 3.0,
            abstract_text: 1.5,
            keyword_title: 2.0,
            keyword_abstract: 1.0,
            recency: 1.0,
            citations: 1.0,
            pdf: 0.5,
        }
    }
}

/// Scoring strategy. Mutates `relevance` in place and sorts descending.
#[async_trait]
pub trait Ranker: Send + Sync {
    fn name(&self) -> &'static str;

    async fn rank(
        &self,
        candidates: &mut Vec<PaperCandidate>,
        query: &str,
        target_text: Option<&str>,
        target_keywords: &[String],
    );
}

/// Lowercased alphanumeric tokens, length >= 2.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

/// Min-max normalize raw scores into [0,1] in place. When every score is
/// identical there is nothing to discriminate on, so all become 1.0.
pub(crate) fn normalize_scores(candidates: &mut [PaperCandidate], raw: &[f64]) {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;

    for (candidate, &score) in candidates.iter_mut().zip(raw) {
        candidate.relevance = if spread > f64::EPSILON {
            (score - min) / spread
        } else {
            1.0
        };
    }
}

/// Stable descending sort on relevance; ties keep aggregation order.
pub(crate) fn sort_by_relevance(candidates: &mut [PaperCandidate]) {
    candidates.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Deep-Learning for NLP!"),
            vec!["deep", "learning", "for", "nlp"]
        );
        // single-char fragments are dropped
        assert_eq!(tokenize("a b cd"), vec!["cd"]);
    }

    #[test]
    fn test_normalize_zero_spread_gives_ones() {
        let mut candidates = vec![PaperCandidate::default(), PaperCandidate::default()];
        normalize_scores(&mut candidates, &[2.5, 2.5]);
        assert!((candidates[0].relevance - 1.0).abs() < f64::EPSILON);
        assert!((candidates[1].relevance - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_range() {
        let mut candidates = vec![
            PaperCandidate::default(),
            PaperCandidate::default(),
            PaperCandidate::default(),
        ];
        normalize_scores(&mut candidates, &[1.0, 3.0, 2.0]);
        assert!((candidates[0].relevance - 0.0).abs() < f64::EPSILON);
        assert!((candidates[1].relevance - 1.0).abs() < f64::EPSILON);
        assert!((candidates[2].relevance - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sort_stable_on_ties() {
        let mut candidates: Vec<PaperCandidate> = ["first", "second", "third"]
            .iter()
            .map(|t| PaperCandidate {
                title: t.to_string(),
                relevance: 0.5,
                ..Default::default()
            })
            .collect();
        candidates[2].relevance = 0.9;
        sort_by_relevance(&mut candidates);
        assert_eq!(candidates[0].title, "third");
        assert_eq!(candidates[1].title, "first");
        assert_eq!(candidates[2].title, "second");
    }
}
