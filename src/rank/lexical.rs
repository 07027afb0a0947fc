//! Lexical ranker.
//!
//! Weighted token-overlap scoring with recency, citation, and PDF bonuses.
//! Raw scores are min-max normalized across the batch, so relevance is always
//! in [0,1] and comparable only within a single run.

use super::{normalize_scores, sort_by_relevance, tokenize, RankWeights, Ranker};
use crate::paper::PaperCandidate;
use async_trait::async_trait;
use chrono::Datelike;
use std::collections::HashSet;
use tracing::debug;

/// Citation bonus saturates here: ln(1 + 400) ~ 6.0.
const CITATION_CAP: f64 = 6.0;
/// Recency decays linearly to zero over this many years.
const RECENCY_WINDOW_YEARS: f64 = 10.0;

pub struct LexicalRanker {
    weights: RankWeights,
}

impl LexicalRanker {
    pub fn new(weights: RankWeights) -> Self {
        Self { weights }
    }

    fn score(
        &self,
        candidate: &PaperCandidate,
        query_tokens: &HashSet<String>,
        keywords: &[String],
        current_year: i32,
    ) -> f64 {
        let title_lower = candidate.title.to_lowercase();
        let abstract_lower = candidate.abstract_text.to_lowercase();
        let title_tokens: HashSet<String> = tokenize(&candidate.title).into_iter().collect();
        let abstract_tokens: HashSet<String> =
            tokenize(&candidate.abstract_text).into_iter().collect();

        let overlap_ratio = |tokens: &HashSet<String>| {
            if query_tokens.is_empty() {
                0.0
            } else {
                query_tokens.intersection(tokens).count() as f64 / query_tokens.len() as f64
            }
        };

        let mut score = self.weights.title * overlap_ratio(&title_tokens)
            + self.weights.abstract_text * overlap_ratio(&abstract_tokens);

        for keyword in keywords {
            let kw = keyword.to_lowercase();
            if kw.is_empty() {
                continue;
            }
            if title_lower.contains(&kw) {
                score += self.weights.keyword_title;
            }
            if abstract_lower.contains(&kw) {
                score += self.weights.keyword_abstract;
            }
        }

        if let Some(year) = candidate.year {
            let age = (current_year - year).max(0) as f64;
            let recency = (1.0 - age / RECENCY_WINDOW_YEARS).max(0.0);
            score += self.weights.recency * recency;
        }

        if let Some(citations) = candidate.citations {
            let bonus = (1.0 + citations as f64).ln().min(CITATION_CAP) / CITATION_CAP;
            score += self.weights.citations * bonus;
        }

        if candidate.pdf_url.is_some() {
            score += self.weights.pdf;
        }

        score
    }
}

#[async_trait]
impl Ranker for LexicalRanker {
    fn name(&self) -> &'static str {
        "lexical"
    }

    async fn rank(
        &self,
        candidates: &mut Vec<PaperCandidate>,
        query: &str,
        target_text: Option<&str>,
        target_keywords: &[String],
    ) {
        if candidates.is_empty() {
            return;
        }

        // Target text tokens augment the query tokens for overlap purposes
        let mut query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
        if let Some(text) = target_text {
            query_tokens.extend(tokenize(text));
        }

        let current_year = chrono::Utc::now().year();
        let raw: Vec<f64> = candidates
            .iter()
            .map(|c| self.score(c, &query_tokens, target_keywords, current_year))
            .collect();

        normalize_scores(candidates, &raw);
        sort_by_relevance(candidates);
        debug!(count = candidates.len(), "Lexical ranking complete");
    }
}
