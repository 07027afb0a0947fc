//! Core data model for discovered papers.
//!
//! A [`PaperCandidate`] is the in-memory representation of one paper returned
//! by a provider, before any caller persists it. Candidates are created by
//! exactly one search adapter, optionally filled in by enrichers, scored by a
//! ranker, and discarded once the [`DiscoveryResult`] is returned.

use serde::{Deserialize, Serialize};

/// One discovered paper, pre-persistence.
///
/// Identity for deduplication purposes is derived (DOI or normalized
/// title + year), never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperCandidate {
    pub title: String,
    /// Authors in the order the provider reported them
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub abstract_text: String,
    pub year: Option<i32>,
    pub doi: Option<String>,
    #[serde(default)]
    pub url: String,
    /// Name of the adapter that produced this candidate
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub open_access: bool,
    pub pdf_url: Option<String>,
    /// Open-access landing page, when distinct from the direct PDF
    pub oa_url: Option<String>,
    pub citations: Option<u64>,
    pub journal: Option<String>,
    /// Written by the ranker; always in [0,1] after ranking
    #[serde(default)]
    pub relevance: f64,
}

impl PaperCandidate {
    /// True when any open-access signal is present: the provider flag,
    /// a direct PDF URL, or an OA landing page URL.
    pub fn has_open_access_signal(&self) -> bool {
        self.open_access
            || self.pdf_url.as_deref().is_some_and(|u| !u.is_empty())
            || self.oa_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Title and abstract concatenated for embedding/scoring input.
    pub fn scoring_text(&self) -> String {
        if self.abstract_text.is_empty() {
            self.title.clone()
        } else {
            format!("{}. {}", self.title, self.abstract_text)
        }
    }
}

/// Outcome of one provider call within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Error,
    Timeout,
}

/// Per-provider observability record; one per adapter per run,
/// regardless of success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDiagnostic {
    pub source: String,
    pub count: usize,
    pub status: SourceStatus,
    pub elapsed_ms: u64,
}

/// Echo of the constraints actually enforced on the final candidate list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub open_access_only: bool,
}

impl SearchFilters {
    pub fn year_filter_active(&self) -> bool {
        self.year_from.is_some() || self.year_to.is_some()
    }
}

/// Final output of one discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub candidates: Vec<PaperCandidate>,
    pub diagnostics: Vec<SourceDiagnostic>,
    pub applied_filters: SearchFilters,
}

/// A candidate wrapped with its two-stage reranking scores.
#[derive(Debug, Clone, Serialize)]
pub struct RerankedCandidate {
    pub candidate: PaperCandidate,
    /// Cosine similarity from the bi-encoder stage
    pub embedding_score: f32,
    /// Raw cross-encoder score (pre-sigmoid); 0 in single-stage mode
    pub cross_score: f32,
    /// Blended final score used for ordering
    pub final_score: f32,
}
