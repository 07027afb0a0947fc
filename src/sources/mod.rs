//! Provider search adapters.
//!
//! One adapter per external bibliographic API, each a thin client over the
//! provider's documented read endpoint. Adapters translate the generic query
//! into the provider's syntax, issue the HTTP call(s), and map the response
//! into [`PaperCandidate`] records. They pass filters natively where the API
//! supports it, but they are never trusted to honor them: the orchestrator
//! re-applies every constraint centrally after aggregation.

pub mod arxiv;
pub mod core;
pub mod europepmc;
pub mod openalex;
pub mod pubmed;
pub mod sciencedirect;
pub mod semantic_scholar;

use crate::config::DiscoveryConfig;
use crate::error::Result;
use crate::paper::{PaperCandidate, SearchFilters};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Common contract for all provider adapters.
///
/// Implementations must isolate their own failures: an `Err` here is recorded
/// as a diagnostic by the orchestrator and never aborts sibling adapters.
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Stable adapter name, used in diagnostics and candidate `source` fields.
    fn name(&self) -> &'static str;

    /// Search the provider, returning up to `max_results` candidates.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<PaperCandidate>>;
}

/// Shared HTTP client factory: per-adapter timeout and a polite user-agent
/// carrying the contact email.
pub(crate) fn build_http_client(contact_email: &str, timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!("paperscout/0.1 (mailto:{contact_email})"))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| crate::error::DiscoveryError::Config(format!("Failed to build HTTP client: {e}")))
}

/// Instantiate the adapters named in `config.sources`, preserving order.
///
/// Unknown names are skipped with a warning; adapters requiring an API key
/// are skipped when the key is absent.
pub fn build_sources(config: &DiscoveryConfig) -> Vec<Arc<dyn SearchSource>> {
    let mut sources: Vec<Arc<dyn SearchSource>> = Vec::new();

    for name in &config.sources {
        match name.as_str() {
            "arxiv" => match arxiv::ArxivSource::new(config) {
                Ok(s) => sources.push(Arc::new(s)),
                Err(e) => tracing::warn!(source = "arxiv", error = %e, "Adapter init failed"),
            },
            "pubmed" => match pubmed::PubMedSource::new(config) {
                Ok(s) => sources.push(Arc::new(s)),
                Err(e) => tracing::warn!(source = "pubmed", error = %e, "Adapter init failed"),
            },
            "europepmc" => match europepmc::EuropePmcSource::new(config) {
                Ok(s) => sources.push(Arc::new(s)),
                Err(e) => tracing::warn!(source = "europepmc", error = %e, "Adapter init failed"),
            },
            "semanticscholar" => match semantic_scholar::SemanticScholarSource::new(config) {
                Ok(s) => sources.push(Arc::new(s)),
                Err(e) => {
                    tracing::warn!(source = "semanticscholar", error = %e, "Adapter init failed")
                }
            },
            "openalex" => match openalex::OpenAlexSource::new(config) {
                Ok(s) => sources.push(Arc::new(s)),
                Err(e) => tracing::warn!(source = "openalex", error = %e, "Adapter init failed"),
            },
            "sciencedirect" => {
                if let Some(key) = config.sciencedirect_api_key.clone() {
                    match sciencedirect::ScienceDirectSource::new(config, key) {
                        Ok(s) => sources.push(Arc::new(s)),
                        Err(e) => {
                            tracing::warn!(source = "sciencedirect", error = %e, "Adapter init failed")
                        }
                    }
                } else {
                    tracing::debug!(source = "sciencedirect", "Skipped: no API key configured");
                }
            }
            "core" => {
                if let Some(key) = config.core_api_key.clone() {
                    match core::CoreSource::new(config, key) {
                        Ok(s) => sources.push(Arc::new(s)),
                        Err(e) => tracing::warn!(source = "core", error = %e, "Adapter init failed"),
                    }
                } else {
                    tracing::debug!(source = "core", "Skipped: no API key configured");
                }
            }
            other => tracing::warn!(source = other, "Unknown source name, skipping"),
        }
    }

    sources
}
