//! ScienceDirect search adapter.
//!
//! Elsevier search API, authenticated with an `X-ELS-APIKey` header. The
//! adapter is only registered when a key is configured. ScienceDirect ranks
//! well on raw queries, so no field rewriting is applied; year constraints go
//! down as a `date` range parameter.

use super::{build_http_client, SearchSource};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::paper::{PaperCandidate, SearchFilters};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

const SCIENCEDIRECT_API_URL: &str = "https://api.elsevier.com/content/search/sciencedirect";

pub struct ScienceDirectSource {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SdResponse {
    #[serde(rename = "search-results")]
    search_results: SdSearchResults,
}

#[derive(Debug, Deserialize)]
struct SdSearchResults {
    #[serde(default)]
    entry: Vec<SdEntry>,
}

#[derive(Debug, Deserialize)]
struct SdEntry {
    #[serde(rename = "dc:title")]
    title: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
    #[serde(rename = "prism:coverDate")]
    cover_date: Option<String>,
    #[serde(rename = "prism:doi")]
    doi: Option<String>,
    #[serde(rename = "prism:url")]
    url: Option<String>,
    #[serde(rename = "prism:publicationName")]
    publication_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_bool")]
    openaccess: bool,
}

/// Elsevier serializes the OA flag inconsistently: bool, "true"/"false",
/// or "0"/"1".
fn deserialize_flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => s == "true" || s == "1",
        serde_json::Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}

impl ScienceDirectSource {
    pub fn new(config: &DiscoveryConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config.contact_email, config.provider_timeout_secs)?,
            api_key,
        })
    }
}

#[async_trait]
impl SearchSource for ScienceDirectSource {
    fn name(&self) -> &'static str {
        "sciencedirect"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<PaperCandidate>> {
        let count = max_results.clamp(1, 100).to_string();
        let mut params = vec![("query", query.to_string()), ("count", count)];
        if filters.year_filter_active() {
            let from = filters.year_from.unwrap_or(1900);
            let to = filters.year_to.unwrap_or(2100);
            params.push(("date", format!("{from}-{to}")));
        }

        debug!(query = query, "ScienceDirect search");

        let response = self
            .client
            .get(SCIENCEDIRECT_API_URL)
            .header("X-ELS-APIKey", &self.api_key)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DiscoveryError::RateLimited(10));
        }
        if !status.is_success() {
            return Err(DiscoveryError::Api {
                code: status.as_u16() as i32,
                message: format!("ScienceDirect API error: {status}"),
            });
        }

        let data: SdResponse = response.json().await.map_err(|e| {
            DiscoveryError::Parse(format!("Failed to parse ScienceDirect response: {e}"))
        })?;

        let candidates: Vec<PaperCandidate> = data
            .search_results
            .entry
            .into_iter()
            .filter_map(map_entry)
            .collect();
        info!(count = candidates.len(), "ScienceDirect search complete");
        Ok(candidates)
    }
}

fn map_entry(entry: SdEntry) -> Option<PaperCandidate> {
    let title = entry.title.filter(|t| !t.is_empty())?;

    Some(PaperCandidate {
        title,
        authors: entry.creator.into_iter().collect(),
        abstract_text: String::new(),
        year: entry
            .cover_date
            .and_then(|d| d.get(..4).and_then(|y| y.parse().ok())),
        doi: entry.doi.filter(|d| !d.is_empty()),
        url: entry.url.unwrap_or_default(),
        source: "sciencedirect".to_string(),
        open_access: entry.openaccess,
        pdf_url: None,
        oa_url: None,
        citations: None,
        journal: entry.publication_name.filter(|j| !j.is_empty()),
        relevance: 0.0,
    })
}
