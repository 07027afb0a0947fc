//! Post-aggregation hard filters.
//!
//! Providers are inconsistent about honoring year and open-access constraints,
//! so every requested constraint is re-applied here, centrally, after
//! aggregation and before ranking. Correctness of the final result never
//! depends on any one provider's compliance. Exclusions are silent; they are
//! not errors.

use crate::paper::{PaperCandidate, SearchFilters};
use tracing::debug;

fn passes_year(candidate: &PaperCandidate, filters: &SearchFilters) -> bool {
    if !filters.year_filter_active() {
        return true;
    }
    // No year while a year filter is active: excluded
    let Some(year) = candidate.year else {
        return false;
    };
    if let Some(from) = filters.year_from {
        if year < from {
            return false;
        }
    }
    if let Some(to) = filters.year_to {
        if year > to {
            return false;
        }
    }
    true
}

fn passes_open_access(candidate: &PaperCandidate, filters: &SearchFilters) -> bool {
    !filters.open_access_only || candidate.has_open_access_signal()
}

/// Keep only candidates satisfying every requested constraint.
pub fn apply_hard_filters(
    candidates: Vec<PaperCandidate>,
    filters: &SearchFilters,
) -> Vec<PaperCandidate> {
    let before = candidates.len();
    let kept: Vec<PaperCandidate> = candidates
        .into_iter()
        .filter(|c| passes_year(c, filters) && passes_open_access(c, filters))
        .collect();

    if kept.len() != before {
        debug!(
            before = before,
            after = kept.len(),
            "Hard filters excluded candidates"
        );
    }
    kept
}
