//! Post-search metadata enrichers.
//!
//! Enrichers run after aggregation and hard filtering, mutating candidates in
//! place under a strict fill-blanks-only rule: a field already present is
//! never overwritten. Per-candidate failures are logged and swallowed so one
//! bad identifier cannot stall a batch, and each enricher bounds its outbound
//! concurrency with a semaphore to respect provider rate limits.

pub mod crossref;
pub mod unpaywall;

use crate::paper::PaperCandidate;
use async_trait::async_trait;

/// Common contract for metadata fillers.
#[async_trait]
pub trait Enricher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fill absent fields in place. Infallible by contract: failures are
    /// per-candidate and leave fields unfilled.
    async fn enrich(&self, candidates: &mut [PaperCandidate]);
}
