//! Europe PMC search adapter.
//!
//! REST search endpoint with `resultType=core` so abstracts and full-text
//! links come back in one call. Field search uses `TITLE:`/`ABS:` functions;
//! year and open-access constraints are pushed down as `PUB_YEAR` ranges and
//! `OPEN_ACCESS:Y`.

use super::{build_http_client, SearchSource};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::paper::{PaperCandidate, SearchFilters};
use crate::query::{build_provider_query, FieldSyntax};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

const EUROPEPMC_API_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

pub struct EuropePmcSource {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EpmcResponse {
    #[serde(rename = "resultList", default)]
    result_list: Option<EpmcResultList>,
}

#[derive(Debug, Deserialize, Default)]
struct EpmcResultList {
    #[serde(default)]
    result: Vec<EpmcResult>,
}

#[derive(Debug, Deserialize)]
struct EpmcResult {
    #[serde(default)]
    id: String,
    #[serde(default)]
    source: String,
    title: Option<String>,
    #[serde(rename = "authorString")]
    author_string: Option<String>,
    #[serde(rename = "pubYear")]
    pub_year: Option<String>,
    doi: Option<String>,
    #[serde(rename = "abstractText")]
    abstract_text: Option<String>,
    #[serde(rename = "isOpenAccess")]
    is_open_access: Option<String>,
    #[serde(rename = "citedByCount")]
    cited_by_count: Option<u64>,
    #[serde(rename = "journalInfo")]
    journal_info: Option<EpmcJournalInfo>,
    #[serde(rename = "fullTextUrlList")]
    full_text_urls: Option<EpmcFullTextUrlList>,
}

#[derive(Debug, Deserialize)]
struct EpmcJournalInfo {
    journal: Option<EpmcJournal>,
}

#[derive(Debug, Deserialize)]
struct EpmcJournal {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpmcFullTextUrlList {
    #[serde(rename = "fullTextUrl", default)]
    full_text_url: Vec<EpmcFullTextUrl>,
}

#[derive(Debug, Deserialize)]
struct EpmcFullTextUrl {
    #[serde(rename = "documentStyle")]
    document_style: Option<String>,
    #[serde(rename = "availabilityCode")]
    availability_code: Option<String>,
    url: Option<String>,
}

impl EuropePmcSource {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config.contact_email, config.provider_timeout_secs)?,
        })
    }

    fn build_search_query(query: &str, filters: &SearchFilters) -> String {
        let mut q = build_provider_query(query, FieldSyntax::EuropePmc);
        if filters.year_filter_active() {
            let from = filters.year_from.unwrap_or(1900);
            let to = filters.year_to.unwrap_or(2100);
            q = format!("({q}) AND (PUB_YEAR:[{from} TO {to}])");
        }
        if filters.open_access_only {
            q = format!("({q}) AND (OPEN_ACCESS:Y)");
        }
        q
    }
}

#[async_trait]
impl SearchSource for EuropePmcSource {
    fn name(&self) -> &'static str {
        "europepmc"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<PaperCandidate>> {
        let search_query = Self::build_search_query(query, filters);
        debug!(query = %search_query, "Europe PMC search");

        let response = self
            .client
            .get(EUROPEPMC_API_URL)
            .query(&[
                ("query", search_query.as_str()),
                ("format", "json"),
                ("resultType", "core"),
                ("pageSize", &max_results.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Api {
                code: response.status().as_u16() as i32,
                message: format!("Europe PMC API error: {}", response.status()),
            });
        }

        let data: EpmcResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(format!("Failed to parse Europe PMC response: {e}")))?;

        let results = data.result_list.unwrap_or_default().result;
        let candidates: Vec<PaperCandidate> = results.into_iter().filter_map(map_result).collect();
        info!(count = candidates.len(), "Europe PMC search complete");
        Ok(candidates)
    }
}

fn map_result(r: EpmcResult) -> Option<PaperCandidate> {
    let title = r.title?;
    if title.is_empty() {
        return None;
    }

    let authors: Vec<String> = r
        .author_string
        .map(|s| {
            s.trim_end_matches('.')
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let pdf_url = r.full_text_urls.as_ref().and_then(|list| {
        list.full_text_url
            .iter()
            .find(|u| u.document_style.as_deref() == Some("pdf"))
            .and_then(|u| u.url.clone())
    });
    let oa_url = r.full_text_urls.as_ref().and_then(|list| {
        list.full_text_url
            .iter()
            .find(|u| u.availability_code.as_deref() == Some("OA"))
            .and_then(|u| u.url.clone())
    });

    let url = if !r.id.is_empty() && !r.source.is_empty() {
        format!("https://europepmc.org/article/{}/{}", r.source, r.id)
    } else {
        String::new()
    };

    Some(PaperCandidate {
        title,
        authors,
        abstract_text: r.abstract_text.unwrap_or_default(),
        year: r.pub_year.and_then(|y| y.parse().ok()),
        doi: r.doi.filter(|d| !d.is_empty()),
        url,
        source: "europepmc".to_string(),
        open_access: r.is_open_access.as_deref() == Some("Y"),
        pdf_url,
        oa_url,
        citations: r.cited_by_count,
        journal: r.journal_info.and_then(|j| j.journal).and_then(|j| j.title),
        relevance: 0.0,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_search_query_filters() {
        let filters = SearchFilters {
            year_from: Some(2021),
            year_to: None,
            open_access_only: true,
        };
        let q = EuropePmcSource::build_search_query("crispr", &filters);
        assert!(q.contains("PUB_YEAR:[2021 TO 2100]"));
        assert!(q.contains("OPEN_ACCESS:Y"));
    }

    #[test]
    fn test_map_result() {
        let json = r#"{
            "id": "33515491",
            "source": "MED",
            "title": "Gene editing advances",
            "authorString": "Doudna J, Charpentier E.",
            "pubYear": "2021",
            "doi": "10.1000/gen",
            "abstractText": "CRISPR overview.",
            "isOpenAccess": "Y",
            "citedByCount": 42,
            "journalInfo": {"journal": {"title": "Science"}},
            "fullTextUrlList": {"fullTextUrl": [
                {"documentStyle": "pdf", "availabilityCode": "OA", "url": "https://europepmc.org/x.pdf"}
            ]}
        }"#;
        let result: EpmcResult = serde_json::from_str(json).unwrap();
        let p = map_result(result).unwrap();
        assert_eq!(p.title, "Gene editing advances");
        assert_eq!(p.authors, vec!["Doudna J", "Charpentier E"]);
        assert_eq!(p.year, Some(2021));
        assert!(p.open_access);
        assert_eq!(p.citations, Some(42));
        assert_eq!(p.journal.as_deref(), Some("Science"));
        assert_eq!(p.pdf_url.as_deref(), Some("https://europepmc.org/x.pdf"));
        assert_eq!(p.url, "https://europepmc.org/article/MED/33515491");
    }

    #[test]
    fn test_map_result_without_title_is_dropped() {
        let result: EpmcResult = serde_json::from_str(r#"{"id": "1", "source": "MED"}"#).unwrap();
        assert!(map_result(result).is_none());
    }
}
