//! # paperscout
//!
//! Multi-provider academic paper discovery and ranking engine.
//!
//! One query fans out concurrently to bibliographic providers (arXiv, PubMed,
//! Europe PMC, Semantic Scholar, OpenAlex, ScienceDirect, CORE), and the
//! merged results are deduplicated, hard-filtered, enriched via Crossref and
//! Unpaywall, scored by a pluggable ranker, and optionally reordered by a
//! local two-stage neural reranker.
//!
//! ## Example
//!
//! ```no_run
//! use paperscout::config::DiscoveryConfig;
//! use paperscout::discovery::{DiscoveryEngine, DiscoveryRequest, RerankMode};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let engine = DiscoveryEngine::from_config(DiscoveryConfig::from_env())?;
//! let result = engine
//!     .discover(DiscoveryRequest {
//!         query: "perovskite solar cell stability".to_string(),
//!         max_results: 20,
//!         sources: None,
//!         year_from: Some(2020),
//!         year_to: None,
//!         open_access_only: true,
//!         target_text: None,
//!         target_keywords: vec!["degradation".to_string()],
//!         rerank: RerankMode::Off,
//!     })
//!     .await;
//! for paper in &result.candidates {
//!     println!("{:.2} {}", paper.relevance, paper.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dedup;
pub mod discovery;
pub mod enrich;
pub mod error;
pub mod filters;
pub mod paper;
pub mod prompts;
pub mod query;
pub mod rank;
pub mod rerank;
pub mod sources;

pub use config::DiscoveryConfig;
pub use discovery::{DiscoveryEngine, DiscoveryRequest, RerankMode};
pub use error::{DiscoveryError, Result};
pub use paper::{DiscoveryResult, PaperCandidate, SourceDiagnostic, SourceStatus};
