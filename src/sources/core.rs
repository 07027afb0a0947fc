//! CORE search adapter.
//!
//! CORE aggregates open-access repository content; everything it returns is
//! treated as carrying an OA signal when a download URL is present. Uses the
//! v3 works search endpoint with Bearer authentication; the adapter is only
//! registered when a key is configured. Year constraints are appended to the
//! query as `yearPublished` comparisons.

use super::{build_http_client, SearchSource};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::paper::{PaperCandidate, SearchFilters};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

const CORE_API_URL: &str = "https://api.core.ac.uk/v3/search/works";

pub struct CoreSource {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CoreResponse {
    #[serde(default)]
    results: Vec<CoreWork>,
}

#[derive(Debug, Deserialize)]
struct CoreWork {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "yearPublished")]
    year_published: Option<i32>,
    doi: Option<String>,
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
    #[serde(default)]
    authors: Vec<CoreAuthor>,
    #[serde(default)]
    links: Vec<CoreLink>,
}

#[derive(Debug, Deserialize)]
struct CoreAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoreLink {
    #[serde(rename = "type")]
    link_type: Option<String>,
    url: Option<String>,
}

impl CoreSource {
    pub fn new(config: &DiscoveryConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config.contact_email, config.provider_timeout_secs)?,
            api_key,
        })
    }

    fn build_query(query: &str, filters: &SearchFilters) -> String {
        let mut q = query.to_string();
        if let Some(from) = filters.year_from {
            q = format!("({q}) AND yearPublished>={from}");
        }
        if let Some(to) = filters.year_to {
            q = format!("({q}) AND yearPublished<={to}");
        }
        q
    }
}

#[async_trait]
impl SearchSource for CoreSource {
    fn name(&self) -> &'static str {
        "core"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<PaperCandidate>> {
        let q = Self::build_query(query, filters);
        debug!(query = %q, "CORE search");

        let response = self
            .client
            .get(CORE_API_URL)
            .bearer_auth(&self.api_key)
            .query(&[("q", q.as_str()), ("limit", &max_results.to_string())])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DiscoveryError::RateLimited(10));
        }
        if !status.is_success() {
            return Err(DiscoveryError::Api {
                code: status.as_u16() as i32,
                message: format!("CORE API error: {status}"),
            });
        }

        let data: CoreResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(format!("Failed to parse CORE response: {e}")))?;

        let candidates: Vec<PaperCandidate> =
            data.results.into_iter().filter_map(map_work).collect();
        info!(count = candidates.len(), "CORE search complete");
        Ok(candidates)
    }
}

fn map_work(work: CoreWork) -> Option<PaperCandidate> {
    let title = work.title.filter(|t| !t.is_empty())?;

    let display_url = work
        .links
        .iter()
        .find(|l| l.link_type.as_deref() == Some("display"))
        .and_then(|l| l.url.clone())
        .unwrap_or_default();
    let pdf_url = work.download_url.filter(|u| !u.is_empty());

    Some(PaperCandidate {
        title,
        authors: work.authors.into_iter().filter_map(|a| a.name).collect(),
        abstract_text: work.abstract_text.unwrap_or_default(),
        year: work.year_published,
        doi: work.doi.filter(|d| !d.is_empty()),
        url: display_url,
        source: "core".to_string(),
        open_access: pdf_url.is_some(),
        pdf_url,
        oa_url: None,
        citations: None,
        journal: None,
        relevance: 0.0,
    })
}
