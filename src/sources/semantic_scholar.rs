//! Semantic Scholar search adapter.
//!
//! Relevance search over the Academic Graph API (`graph/v1/paper/search`).
//! The raw query passes through untouched; Semantic Scholar's own relevance
//! ranking handles it better than a field-rewritten form. Year and OA
//! constraints go down as `year` and `openAccessPdf` parameters.
//!
//! Rate limit: 1 req/s unauthenticated, higher with an API key.

use super::{build_http_client, SearchSource};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::paper::{PaperCandidate, SearchFilters};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

const SEARCH_FIELDS: &str =
    "title,abstract,year,authors,externalIds,isOpenAccess,openAccessPdf,citationCount,venue,url";

pub struct SemanticScholarSource {
    client: reqwest::Client,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSSearchResponse {
    #[serde(default)]
    data: Vec<SSPaper>,
}

#[derive(Debug, Deserialize)]
struct SSPaper {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    authors: Vec<SSAuthor>,
    url: Option<String>,
    venue: Option<String>,
    #[serde(rename = "citationCount")]
    citation_count: Option<u64>,
    #[serde(rename = "isOpenAccess")]
    is_open_access: Option<bool>,
    #[serde(rename = "openAccessPdf")]
    oa_pdf: Option<SSOpenAccessPdf>,
    #[serde(rename = "externalIds")]
    external_ids: Option<SSExternalIds>,
}

#[derive(Debug, Deserialize)]
struct SSAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSOpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl SemanticScholarSource {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config.contact_email, config.provider_timeout_secs)?,
            api_key: config.semantic_scholar_api_key.clone(),
        })
    }
}

#[async_trait]
impl SearchSource for SemanticScholarSource {
    fn name(&self) -> &'static str {
        "semanticscholar"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<PaperCandidate>> {
        let limit = max_results.min(100).to_string();
        let mut params = vec![
            ("query", query.to_string()),
            ("limit", limit),
            ("fields", SEARCH_FIELDS.to_string()),
        ];
        if filters.year_filter_active() {
            let from = filters.year_from.map(|y| y.to_string()).unwrap_or_default();
            let to = filters.year_to.map(|y| y.to_string()).unwrap_or_default();
            params.push(("year", format!("{from}-{to}")));
        }
        if filters.open_access_only {
            // Presence filter: only papers with a public PDF
            params.push(("openAccessPdf", String::new()));
        }

        debug!(query = query, "Semantic Scholar search");

        let mut request = self
            .client
            .get(format!("{SS_API_BASE}/paper/search"))
            .query(&params);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Semantic Scholar rate limited");
            return Err(DiscoveryError::RateLimited(1));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Api {
                code: status.as_u16() as i32,
                message: format!("Semantic Scholar API error: {status} - {error_text}"),
            });
        }

        let data: SSSearchResponse = response.json().await.map_err(|e| {
            DiscoveryError::Parse(format!("Failed to parse Semantic Scholar response: {e}"))
        })?;

        let candidates: Vec<PaperCandidate> = data.data.into_iter().filter_map(map_paper).collect();
        info!(count = candidates.len(), "Semantic Scholar search complete");
        Ok(candidates)
    }
}

fn map_paper(paper: SSPaper) -> Option<PaperCandidate> {
    let title = paper.title.filter(|t| !t.is_empty())?;
    let pdf_url = paper.oa_pdf.and_then(|p| p.url).filter(|u| !u.is_empty());

    Some(PaperCandidate {
        title,
        authors: paper.authors.into_iter().filter_map(|a| a.name).collect(),
        abstract_text: paper.abstract_text.unwrap_or_default(),
        year: paper.year,
        doi: paper
            .external_ids
            .and_then(|ids| ids.doi)
            .filter(|d| !d.is_empty()),
        url: paper.url.unwrap_or_default(),
        source: "semanticscholar".to_string(),
        open_access: paper.is_open_access.unwrap_or(false),
        pdf_url,
        oa_url: None,
        citations: paper.citation_count,
        journal: paper.venue.filter(|v| !v.is_empty()),
        relevance: 0.0,
    })
}
