//! Discovery orchestrator.
//!
//! [`DiscoveryEngine::discover`] runs the whole pipeline for one request:
//! concurrent provider fan-out with per-adapter deadlines, merge in
//! configured order, dedup, hard filters, enrichment, ranking, and the
//! optional neural rerank. It never returns an error: provider failures
//! become diagnostics, and every downstream stage degrades rather than
//! aborts.

use crate::config::DiscoveryConfig;
use crate::dedup::dedup_candidates;
use crate::enrich::{crossref::CrossrefEnricher, unpaywall::UnpaywallEnricher, Enricher};
use crate::error::Result;
use crate::filters::apply_hard_filters;
use crate::paper::{DiscoveryResult, PaperCandidate, SearchFilters, SourceDiagnostic, SourceStatus};
use crate::rank::{lexical::LexicalRanker, llm::LlmRanker, Ranker};
use crate::rerank::Reranker;
use crate::sources::{build_sources, SearchSource};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Which reranking pass to run after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RerankMode {
    /// Keep the ranker's order as-is
    #[default]
    Off,
    /// Bi-encoder cosine similarity only
    SingleStage,
    /// Bi-encoder shortlist refined by a cross-encoder
    TwoStage,
}

/// One discovery run's inputs.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Override of the configured provider list, same names, same ordering
    /// significance
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
    #[serde(default)]
    pub open_access_only: bool,
    /// Longer description of the research goal, folded into ranking
    #[serde(default)]
    pub target_text: Option<String>,
    #[serde(default)]
    pub target_keywords: Vec<String>,
    #[serde(default)]
    pub rerank: RerankMode,
}

fn default_max_results() -> usize {
    20
}

pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    sources: Vec<Arc<dyn SearchSource>>,
    enrichers: Vec<Box<dyn Enricher>>,
    ranker: Box<dyn Ranker>,
    reranker: Reranker,
}

impl DiscoveryEngine {
    pub fn from_config(config: DiscoveryConfig) -> Result<Self> {
        let sources = build_sources(&config);

        let enrichers: Vec<Box<dyn Enricher>> = vec![
            Box::new(CrossrefEnricher::new(
                &config.contact_email,
                config.enrich_concurrency,
            )?),
            // Unpaywall resolves by DOI, so it runs after Crossref has had a
            // chance to canonicalize metadata
            Box::new(UnpaywallEnricher::new(
                &config.unpaywall_email,
                config.enrich_concurrency,
            )?),
        ];

        let ranker: Box<dyn Ranker> = match &config.llm {
            Some(llm) => Box::new(LlmRanker::new(llm.clone(), config.llm_candidate_limit)?),
            None => Box::new(LexicalRanker::new(config.weights.clone())),
        };

        let reranker = Reranker::new(config.rerank.clone());

        Ok(Self {
            config,
            sources,
            enrichers,
            ranker,
            reranker,
        })
    }

    /// Run one discovery request end to end. Infallible: the worst outcome
    /// is an empty candidate list with error diagnostics.
    pub async fn discover(&self, request: DiscoveryRequest) -> DiscoveryResult {
        let filters = SearchFilters {
            year_from: request.year_from,
            year_to: request.year_to,
            open_access_only: request.open_access_only,
        };

        let active: Vec<&Arc<dyn SearchSource>> = match &request.sources {
            Some(names) => names
                .iter()
                .filter_map(|n| self.sources.iter().find(|s| s.name() == n.as_str()))
                .collect(),
            None => self.sources.iter().collect(),
        };

        info!(
            query = %request.query,
            sources = active.len(),
            max_results = request.max_results,
            "Starting discovery"
        );

        // Over-fetch per provider; dedup and hard filters will thin the pool
        // before the final truncation.
        let per_source = request.max_results.max(10);
        let deadline = Duration::from_secs(self.config.provider_timeout_secs);

        let searches = active.iter().map(|source| {
            let query = request.query.clone();
            let filters = filters;
            async move {
                let started = Instant::now();
                let outcome =
                    tokio::time::timeout(deadline, source.search(&query, per_source, &filters))
                        .await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                match outcome {
                    Ok(Ok(candidates)) => {
                        let diagnostic = SourceDiagnostic {
                            source: source.name().to_string(),
                            count: candidates.len(),
                            status: SourceStatus::Ok,
                            elapsed_ms,
                        };
                        (candidates, diagnostic)
                    }
                    Ok(Err(e)) => {
                        warn!(source = source.name(), error = %e, "Provider search failed");
                        let diagnostic = SourceDiagnostic {
                            source: source.name().to_string(),
                            count: 0,
                            status: SourceStatus::Error,
                            elapsed_ms,
                        };
                        (Vec::new(), diagnostic)
                    }
                    Err(_) => {
                        warn!(
                            source = source.name(),
                            timeout_secs = deadline.as_secs(),
                            "Provider search timed out"
                        );
                        let diagnostic = SourceDiagnostic {
                            source: source.name().to_string(),
                            count: 0,
                            status: SourceStatus::Timeout,
                            elapsed_ms,
                        };
                        (Vec::new(), diagnostic)
                    }
                }
            }
        });

        // join_all preserves input order, so merged results follow the
        // configured provider priority and dedup keeps the right copy
        let outcomes = join_all(searches).await;

        let mut merged = Vec::new();
        let mut diagnostics = Vec::with_capacity(outcomes.len());
        for (candidates, diagnostic) in outcomes {
            merged.extend(candidates);
            diagnostics.push(diagnostic);
        }

        let before_dedup = merged.len();
        let mut candidates = dedup_candidates(merged);
        info!(
            fetched = before_dedup,
            unique = candidates.len(),
            "Merged provider results"
        );

        candidates = apply_hard_filters(candidates, &filters);

        for enricher in &self.enrichers {
            tracing::debug!(enricher = enricher.name(), "Running enricher");
            enricher.enrich(&mut candidates).await;
        }

        tracing::debug!(ranker = self.ranker.name(), "Ranking candidates");
        self.ranker
            .rank(
                &mut candidates,
                &request.query,
                request.target_text.as_deref(),
                &request.target_keywords,
            )
            .await;

        candidates = self
            .apply_rerank(&request.query, candidates, request.rerank)
            .await;

        candidates.truncate(request.max_results);
        info!(returned = candidates.len(), "Discovery complete");

        DiscoveryResult {
            candidates,
            diagnostics,
            applied_filters: filters,
        }
    }

    /// Reorder by neural rerank scores. A rerank failure keeps the ranked
    /// order instead of aborting the run.
    async fn apply_rerank(
        &self,
        query: &str,
        candidates: Vec<PaperCandidate>,
        mode: RerankMode,
    ) -> Vec<PaperCandidate> {
        if mode == RerankMode::Off || candidates.is_empty() {
            return candidates;
        }

        let outcome = match mode {
            RerankMode::SingleStage => self.reranker.rerank_single_stage(query, &candidates).await,
            RerankMode::TwoStage => self.reranker.rerank(query, &candidates).await,
            RerankMode::Off => unreachable!("handled above"),
        };

        match outcome {
            Ok(reranked) => reranked
                .into_iter()
                .map(|r| {
                    let mut candidate = r.candidate;
                    candidate.relevance = f64::from(r.final_score).clamp(0.0, 1.0);
                    candidate
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "Rerank failed, keeping ranked order");
                candidates
            }
        }
    }

    #[cfg(test)]
    fn for_tests(
        config: DiscoveryConfig,
        sources: Vec<Arc<dyn SearchSource>>,
        ranker: Box<dyn Ranker>,
    ) -> Self {
        Self {
            config,
            sources,
            enrichers: Vec::new(),
            ranker,
            reranker: Reranker::new(RerankConfig::default()),
        }
    }
}

#[cfg(test)]
use crate::config::RerankConfig;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::DiscoveryError;
    use crate::rank::minimal::MinimalRanker;
    use async_trait::async_trait;

    struct StaticSource {
        name: &'static str,
        papers: Vec<PaperCandidate>,
    }

    #[async_trait]
    impl SearchSource for StaticSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
            _filters: &SearchFilters,
        ) -> crate::error::Result<Vec<PaperCandidate>> {
            Ok(self.papers.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl SearchSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
            _filters: &SearchFilters,
        ) -> crate::error::Result<Vec<PaperCandidate>> {
            Err(DiscoveryError::Api {
                code: 500,
                message: "boom".to_string(),
            })
        }
    }

    struct HangingSource;

    #[async_trait]
    impl SearchSource for HangingSource {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
            _filters: &SearchFilters,
        ) -> crate::error::Result<Vec<PaperCandidate>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn paper(title: &str, year: Option<i32>, doi: Option<&str>) -> PaperCandidate {
        PaperCandidate {
            title: title.to_string(),
            year,
            doi: doi.map(str::to_string),
            open_access: true,
            ..Default::default()
        }
    }

    fn engine(sources: Vec<Arc<dyn SearchSource>>) -> DiscoveryEngine {
        DiscoveryEngine::for_tests(
            DiscoveryConfig {
                provider_timeout_secs: 1,
                ..Default::default()
            },
            sources,
            Box::new(MinimalRanker),
        )
    }

    fn request(query: &str) -> DiscoveryRequest {
        DiscoveryRequest {
            query: query.to_string(),
            max_results: 20,
            sources: None,
            year_from: None,
            year_to: None,
            open_access_only: false,
            target_text: None,
            target_keywords: Vec::new(),
            rerank: RerankMode::Off,
        }
    }

    #[tokio::test]
    async fn test_failing_source_does_not_abort_siblings() {
        let engine = engine(vec![
            Arc::new(FailingSource),
            Arc::new(StaticSource {
                name: "good",
                papers: vec![paper("Surviving paper", Some(2023), None)],
            }),
        ]);

        let result = engine.discover(request("surviving paper")).await;
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.diagnostics.len(), 2);
        assert_eq!(result.diagnostics[0].status, SourceStatus::Error);
        assert_eq!(result.diagnostics[1].status, SourceStatus::Ok);
        assert_eq!(result.diagnostics[1].count, 1);
    }

    #[tokio::test]
    async fn test_hanging_source_times_out_with_diagnostic() {
        let engine = engine(vec![
            Arc::new(HangingSource),
            Arc::new(StaticSource {
                name: "good",
                papers: vec![paper("Fast paper", Some(2023), None)],
            }),
        ]);

        let result = engine.discover(request("fast paper")).await;
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.diagnostics[0].status, SourceStatus::Timeout);
    }

    #[tokio::test]
    async fn test_year_filter_across_two_providers() {
        // Provider A returns a 2018 paper, provider B a 2024 paper; with a
        // 2022-2026 window only the 2024 paper may survive.
        let engine = engine(vec![
            Arc::new(StaticSource {
                name: "a",
                papers: vec![paper("Old Study", Some(2018), None)],
            }),
            Arc::new(StaticSource {
                name: "b",
                papers: vec![paper("In Range", Some(2024), None)],
            }),
        ]);

        let mut req = request("study range");
        req.year_from = Some(2022);
        req.year_to = Some(2026);
        let result = engine.discover(req).await;

        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].title, "In Range");
        assert_eq!(result.applied_filters.year_from, Some(2022));
    }

    #[tokio::test]
    async fn test_duplicate_across_providers_keeps_first_configured() {
        let mut from_a = paper("Shared Result", Some(2023), Some("10.9/dup"));
        from_a.source = "a".to_string();
        let mut from_b = paper("Shared Result", Some(2023), Some("10.9/DUP"));
        from_b.source = "b".to_string();

        let engine = engine(vec![
            Arc::new(StaticSource {
                name: "a",
                papers: vec![from_a],
            }),
            Arc::new(StaticSource {
                name: "b",
                papers: vec![from_b],
            }),
        ]);

        let result = engine.discover(request("shared result")).await;
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].source, "a");
    }

    #[tokio::test]
    async fn test_truncates_to_max_results() {
        let papers: Vec<PaperCandidate> = (0..30)
            .map(|i| paper(&format!("Paper number {i}"), Some(2023), None))
            .collect();
        let engine = engine(vec![Arc::new(StaticSource {
            name: "bulk",
            papers,
        })]);

        let mut req = request("paper number");
        req.max_results = 5;
        let result = engine.discover(req).await;
        assert_eq!(result.candidates.len(), 5);
    }

    #[tokio::test]
    async fn test_source_override_restricts_fanout() {
        let engine = engine(vec![
            Arc::new(StaticSource {
                name: "a",
                papers: vec![paper("From A", Some(2023), None)],
            }),
            Arc::new(StaticSource {
                name: "b",
                papers: vec![paper("From B", Some(2023), None)],
            }),
        ]);

        let mut req = request("from");
        req.sources = Some(vec!["b".to_string()]);
        let result = engine.discover(req).await;
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].title, "From B");
        assert_eq!(result.diagnostics.len(), 1);
    }
}
