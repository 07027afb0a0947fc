//! Deduplication of merged provider results.
//!
//! Two candidates are duplicates when they share a case-insensitive DOI, or,
//! when either side lacks a DOI, a normalized title plus publication year.
//! First-seen wins, so the configured provider order decides which copy
//! survives. DOI match deliberately takes priority over title match even
//! though preprint and published versions can carry different DOIs; that is a
//! known limitation, not something this module tries to fix.

use crate::paper::PaperCandidate;
use std::collections::HashSet;

/// Whitespace-collapsed, case-folded title for fallback matching.
fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn doi_key(candidate: &PaperCandidate) -> Option<String> {
    candidate
        .doi
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_lowercase)
}

fn title_key(candidate: &PaperCandidate) -> Option<String> {
    let normalized = normalize_title(&candidate.title);
    if normalized.is_empty() {
        return None;
    }
    Some(format!(
        "{}|{}",
        normalized,
        candidate.year.map(|y| y.to_string()).unwrap_or_default()
    ))
}

/// Remove duplicates in place, keeping the first occurrence of each key.
///
/// Idempotent: running it on an already-deduplicated list is a no-op.
pub fn dedup_candidates(candidates: Vec<PaperCandidate>) -> Vec<PaperCandidate> {
    let mut seen_dois: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if let Some(doi) = doi_key(&candidate) {
            if !seen_dois.insert(doi) {
                continue;
            }
            // Record the title key too, so a DOI-less copy of the same paper
            // from another provider is still caught.
            if let Some(title) = title_key(&candidate) {
                seen_titles.insert(title);
            }
            out.push(candidate);
        } else {
            match title_key(&candidate) {
                Some(title) => {
                    if seen_titles.insert(title) {
                        out.push(candidate);
                    }
                }
                // No DOI and no title: nothing to match on, keep it
                None => out.push(candidate),
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(title: &str, doi: Option<&str>, year: Option<i32>, source: &str) -> PaperCandidate {
        PaperCandidate {
            title: title.to_string(),
            doi: doi.map(str::to_string),
            year,
            source: source.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_doi_match_case_insensitive() {
        let input = vec![
            paper("Attention Is All You Need", Some("10.1000/ABC"), Some(2017), "arxiv"),
            paper("Attention is all you need", Some("10.1000/abc"), Some(2017), "pubmed"),
        ];
        let out = dedup_candidates(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "arxiv");
    }

    #[test]
    fn test_first_seen_wins_with_differing_abstracts() {
        let mut a = paper("Same Paper", Some("10.1/x"), Some(2023), "arxiv");
        a.abstract_text = "abstract from provider A".to_string();
        let mut b = paper("Same Paper", Some("10.1/x"), Some(2023), "europepmc");
        b.abstract_text = "abstract from provider B".to_string();

        let out = dedup_candidates(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].abstract_text, "abstract from provider A");
    }

    #[test]
    fn test_title_year_fallback() {
        let input = vec![
            paper("Deep   Learning Survey", None, Some(2021), "arxiv"),
            paper("deep learning survey", None, Some(2021), "core"),
            // Same title, different year: not a duplicate
            paper("Deep Learning Survey", None, Some(2019), "core"),
        ];
        let out = dedup_candidates(input);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_doi_copy_shadows_doiless_copy() {
        let input = vec![
            paper("Shadowed Paper", Some("10.5/z"), Some(2022), "semanticscholar"),
            paper("Shadowed Paper", None, Some(2022), "core"),
        ];
        let out = dedup_candidates(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "semanticscholar");
    }

    #[test]
    fn test_idempotent() {
        let input = vec![
            paper("One", Some("10.1/a"), Some(2020), "arxiv"),
            paper("Two", None, Some(2021), "pubmed"),
            paper("One", Some("10.1/a"), Some(2020), "openalex"),
        ];
        let once = dedup_candidates(input);
        let titles: Vec<String> = once.iter().map(|p| p.title.clone()).collect();
        let twice = dedup_candidates(once);
        assert_eq!(
            twice.iter().map(|p| p.title.clone()).collect::<Vec<_>>(),
            titles
        );
    }
}
