//! OpenAlex search adapter.
//!
//! OpenAlex has strong internal relevance ranking, so the raw query passes
//! through as the `search` parameter. Year constraints become
//! `publication_year` filters; open access becomes `is_oa:true`. Abstracts
//! arrive as an inverted index and are reconstructed into plaintext.
//!
//! Requests carry a `mailto` for polite pool access (10 req/s vs 1 req/s).

use super::{build_http_client, SearchSource};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::paper::{PaperCandidate, SearchFilters};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

pub struct OpenAlexSource {
    client: reqwest::Client,
    mailto: String,
}

#[derive(Debug, Deserialize)]
struct OpenAlexResponse {
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    title: Option<String>,
    display_name: Option<String>,
    publication_year: Option<i32>,
    doi: Option<String>,
    cited_by_count: Option<u64>,
    #[serde(rename = "abstract_inverted_index")]
    abstract_index: Option<serde_json::Value>,
    authorships: Option<Vec<OpenAlexAuthorship>>,
    primary_location: Option<OpenAlexLocation>,
    best_oa_location: Option<OpenAlexLocation>,
    open_access: Option<OpenAlexOpenAccess>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthorship {
    author: Option<OpenAlexAuthor>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthor {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexLocation {
    source: Option<OpenAlexVenue>,
    landing_page_url: Option<String>,
    pdf_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexVenue {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexOpenAccess {
    is_oa: Option<bool>,
    oa_url: Option<String>,
}

impl OpenAlexSource {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config.contact_email, config.provider_timeout_secs)?,
            mailto: config.contact_email.clone(),
        })
    }

    fn build_filter(filters: &SearchFilters) -> String {
        let mut parts = vec!["type:article".to_string()];
        if let Some(from) = filters.year_from {
            parts.push(format!("publication_year:>{}", from - 1));
        }
        if let Some(to) = filters.year_to {
            parts.push(format!("publication_year:<{}", to + 1));
        }
        if filters.open_access_only {
            parts.push("is_oa:true".to_string());
        }
        parts.join(",")
    }
}

#[async_trait]
impl SearchSource for OpenAlexSource {
    fn name(&self) -> &'static str {
        "openalex"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<PaperCandidate>> {
        let per_page = max_results.clamp(1, 200).to_string();
        debug!(query = query, "OpenAlex search");

        let response = self
            .client
            .get(format!("{OPENALEX_API_BASE}/works"))
            .query(&[
                ("search", query),
                ("per-page", &per_page),
                ("filter", &Self::build_filter(filters)),
                ("mailto", &self.mailto),
                (
                    "select",
                    "title,display_name,publication_year,doi,cited_by_count,\
                     abstract_inverted_index,authorships,primary_location,\
                     best_oa_location,open_access",
                ),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DiscoveryError::RateLimited(60));
        }
        if !status.is_success() {
            return Err(DiscoveryError::Api {
                code: status.as_u16() as i32,
                message: format!("OpenAlex API error: {status}"),
            });
        }

        let data: OpenAlexResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(format!("Failed to parse OpenAlex response: {e}")))?;

        let candidates: Vec<PaperCandidate> =
            data.results.into_iter().filter_map(map_work).collect();
        info!(count = candidates.len(), "OpenAlex search complete");
        Ok(candidates)
    }
}

fn map_work(work: OpenAlexWork) -> Option<PaperCandidate> {
    let title = work
        .display_name
        .or(work.title)
        .filter(|t| !t.is_empty())?;

    let authors: Vec<String> = work
        .authorships
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| a.author.and_then(|a| a.display_name))
        .collect();

    let mut url = String::new();
    let mut pdf_url = None;
    let mut journal = None;
    if let Some(ref location) = work.primary_location {
        if let Some(ref source) = location.source {
            journal = source.display_name.clone().filter(|j| !j.is_empty());
        }
        url = location.landing_page_url.clone().unwrap_or_default();
        pdf_url = location.pdf_url.clone();
    }
    if let Some(ref best_oa) = work.best_oa_location {
        if pdf_url.is_none() {
            pdf_url = best_oa.pdf_url.clone();
        }
        if url.is_empty() {
            url = best_oa.landing_page_url.clone().unwrap_or_default();
        }
    }

    let mut open_access = false;
    let mut oa_url = None;
    if let Some(ref oa) = work.open_access {
        open_access = oa.is_oa.unwrap_or(false);
        oa_url = oa.oa_url.clone().filter(|u| !u.is_empty());
        if url.is_empty() {
            url = oa_url.clone().unwrap_or_default();
        }
    }

    let abstract_text = work
        .abstract_index
        .map(|idx| reconstruct_abstract(&idx))
        .unwrap_or_default();

    Some(PaperCandidate {
        title,
        authors,
        abstract_text,
        year: work.publication_year,
        doi: work
            .doi
            .map(|d| d.replace("https://doi.org/", ""))
            .filter(|d| !d.is_empty()),
        url,
        source: "openalex".to_string(),
        open_access,
        pdf_url: pdf_url.filter(|u| !u.is_empty()),
        oa_url,
        citations: work.cited_by_count,
        journal,
        relevance: 0.0,
    })
}

/// Reconstruct abstract text from an inverted index.
/// OpenAlex provides abstracts as inverted indexes for legal reasons.
fn reconstruct_abstract(inverted_index: &serde_json::Value) -> String {
    let Some(obj) = inverted_index.as_object() else {
        return String::new();
    };

    let mut words: Vec<(i64, &str)> = Vec::new();
    for (word, positions) in obj {
        if let Some(pos_array) = positions.as_array() {
            for pos in pos_array {
                if let Some(p) = pos.as_i64() {
                    words.push((p, word.as_str()));
                }
            }
        }
    }

    words.sort_by_key(|(pos, _)| *pos);
    words.iter().map(|(_, w)| *w).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_abstract() {
        let idx = serde_json::json!({
            "learning": [1],
            "Deep": [0],
            "networks": [3],
            "uses": [2]
        });
        assert_eq!(reconstruct_abstract(&idx), "Deep learning uses networks");
    }

    #[test]
    fn test_build_filter() {
        let filters = SearchFilters {
            year_from: Some(2020),
            year_to: Some(2024),
            open_access_only: true,
        };
        let f = OpenAlexSource::build_filter(&filters);
        assert!(f.contains("publication_year:>2019"));
        assert!(f.contains("publication_year:<2025"));
        assert!(f.contains("is_oa:true"));
        assert!(f.contains("type:article"));
    }

    #[test]
    fn test_map_work_strips_doi_prefix() {
        let json = r#"{
            "display_name": "A Work",
            "publication_year": 2022,
            "doi": "https://doi.org/10.1/xyz",
            "open_access": {"is_oa": true, "oa_url": "https://repo.org/a"}
        }"#;
        let work: OpenAlexWork = serde_json::from_str(json).unwrap();
        let p = map_work(work).unwrap();
        assert_eq!(p.doi.as_deref(), Some("10.1/xyz"));
        assert!(p.open_access);
        // oa_url doubles as landing URL when nothing better exists
        assert_eq!(p.url, "https://repo.org/a");
    }
}
