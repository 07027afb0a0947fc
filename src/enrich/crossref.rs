//! Crossref metadata enricher.
//!
//! For candidates that carry a DOI but are missing journal, year, citation
//! count, URL, or abstract, fetches canonical metadata from the Crossref
//! `works/{doi}` endpoint and fills only the absent fields. Uses the polite
//! pool (mailto user-agent), a semaphore-bounded concurrency cap, and
//! exponential backoff on rate limits.

use super::Enricher;
use crate::error::{DiscoveryError, Result};
use crate::paper::PaperCandidate;
use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const CROSSREF_API_URL: &str = "https://api.crossref.org/works";

/// Canonical metadata pulled from Crossref for one DOI.
#[derive(Debug, Clone, Default)]
struct CrossrefFill {
    journal: Option<String>,
    year: Option<i32>,
    citations: Option<u64>,
    url: Option<String>,
    abstract_text: Option<String>,
}

/// Crossref client with rate limiting and concurrency control.
pub struct CrossrefEnricher {
    client: reqwest::Client,
    mailto: String,
    semaphore: Arc<Semaphore>,
    max_retries: u32,
}

impl CrossrefEnricher {
    /// # Arguments
    ///
    /// * `mailto` - Polite pool contact email
    /// * `max_workers` - Maximum concurrent requests
    pub fn new(mailto: &str, max_workers: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("paperscout/0.1 (mailto:{mailto})"))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DiscoveryError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            mailto: mailto.to_string(),
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            max_retries: 3,
        })
    }

    /// Lookup canonical metadata by DOI with exponential backoff.
    async fn lookup_by_doi(&self, doi: &str) -> Option<CrossrefFill> {
        let doi = doi.trim();
        if doi.is_empty() {
            return None;
        }

        let _permit = self.semaphore.acquire().await.ok()?;

        let mut backoff = Duration::from_millis(500);

        for attempt in 0..self.max_retries {
            match self.do_lookup(doi).await {
                Ok(fill) => return Some(fill),
                Err(DiscoveryError::RateLimited(secs)) => {
                    let wait = Duration::from_secs(secs).max(backoff);
                    warn!(
                        doi = doi,
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs(),
                        "Rate limited, waiting"
                    );
                    tokio::time::sleep(wait).await;
                    backoff *= 2;
                }
                Err(e) => {
                    debug!(doi = doi, attempt = attempt + 1, error = %e, "Lookup failed");
                    if attempt < self.max_retries - 1 {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        None
    }

    async fn do_lookup(&self, doi: &str) -> Result<CrossrefFill> {
        let url = format!("{}/{}", CROSSREF_API_URL, urlencoding::encode(doi));
        let response = self
            .client
            .get(&url)
            .query(&[("mailto", self.mailto.as_str())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DiscoveryError::RateLimited(5));
        }

        if !response.status().is_success() {
            return Err(DiscoveryError::Api {
                code: response.status().as_u16() as i32,
                message: format!("Crossref API error: {}", response.status()),
            });
        }

        let data: CrossrefResponse = response.json().await?;
        Ok(parse_crossref_work(data.message))
    }
}

#[async_trait]
impl Enricher for CrossrefEnricher {
    fn name(&self) -> &'static str {
        "crossref"
    }

    async fn enrich(&self, candidates: &mut [PaperCandidate]) {
        // Only candidates with a DOI and at least one blank target field
        let targets: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.doi.is_some()
                    && (c.journal.is_none()
                        || c.year.is_none()
                        || c.citations.is_none()
                        || c.url.is_empty()
                        || c.abstract_text.is_empty())
            })
            .map(|(i, _)| i)
            .collect();

        if targets.is_empty() {
            return;
        }
        info!(count = targets.len(), "Starting Crossref enrichment");

        let futures: Vec<_> = targets
            .iter()
            .map(|&i| {
                let doi = candidates[i].doi.clone().unwrap_or_default();
                async move { (i, self.lookup_by_doi(&doi).await) }
            })
            .collect();

        let results = join_all(futures).await;
        let mut filled = 0usize;

        for (i, fill) in results {
            let Some(fill) = fill else { continue };
            filled += 1;
            let candidate = &mut candidates[i];
            if candidate.journal.is_none() {
                candidate.journal = fill.journal;
            }
            if candidate.year.is_none() {
                candidate.year = fill.year;
            }
            if candidate.citations.is_none() {
                candidate.citations = fill.citations;
            }
            if candidate.url.is_empty() {
                candidate.url = fill.url.unwrap_or_default();
            }
            if candidate.abstract_text.is_empty() {
                candidate.abstract_text = fill.abstract_text.unwrap_or_default();
            }
        }

        info!(total = targets.len(), matched = filled, "Crossref enrichment complete");
    }
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: CrossrefWork,
}

#[derive(Debug, Deserialize)]
struct CrossrefWork {
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(default)]
    published: Option<CrossrefPublished>,
    #[serde(rename = "is-referenced-by-count", default)]
    is_referenced_by_count: Option<u64>,
    #[serde(rename = "URL", default)]
    url: Option<String>,
    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossrefPublished {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<i32>>,
}

fn parse_crossref_work(work: CrossrefWork) -> CrossrefFill {
    let year = work
        .published
        .and_then(|p| p.date_parts.into_iter().next())
        .and_then(|parts| parts.into_iter().next());

    let journal = work
        .container_title
        .into_iter()
        .next()
        .filter(|j| !j.is_empty());

    let abstract_text = work
        .abstract_text
        .map(|s| strip_html_tags(&s))
        .filter(|s| !s.is_empty());

    CrossrefFill {
        journal,
        year,
        citations: work.is_referenced_by_count,
        url: work.url.filter(|u| !u.is_empty()),
        abstract_text,
    }
}

/// Strip HTML/JATS tags from Crossref abstracts.
fn strip_html_tags(text: &str) -> String {
    match Regex::new(r"<[^>]+>") {
        Ok(re) => re.replace_all(text, "").trim().to_string(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("<p>Hello</p>"), "Hello");
        assert_eq!(strip_html_tags("No tags"), "No tags");
        assert_eq!(
            strip_html_tags("<jats:p>Structured <i>abstract</i></jats:p>"),
            "Structured abstract"
        );
    }

    #[test]
    fn test_parse_crossref_work() {
        let work = CrossrefWork {
            container_title: vec!["Nature".to_string()],
            published: Some(CrossrefPublished {
                date_parts: vec![vec![2023, 6, 15]],
            }),
            is_referenced_by_count: Some(17),
            url: Some("https://doi.org/10.1234/test".to_string()),
            abstract_text: Some("<p>This is abstract</p>".to_string()),
        };

        let fill = parse_crossref_work(work);
        assert_eq!(fill.journal.as_deref(), Some("Nature"));
        assert_eq!(fill.year, Some(2023));
        assert_eq!(fill.citations, Some(17));
        assert_eq!(fill.abstract_text.as_deref(), Some("This is abstract"));
    }

    #[tokio::test]
    async fn test_enrich_skips_complete_candidates() {
        // A candidate with every target field present needs no lookup, so
        // enrich returns without any network activity.
        let enricher = CrossrefEnricher::new("test@example.com", 2).unwrap();
        let mut candidates = vec![PaperCandidate {
            title: "Complete".to_string(),
            doi: Some("10.1/x".to_string()),
            journal: Some("J".to_string()),
            year: Some(2020),
            citations: Some(3),
            url: "https://example.org".to_string(),
            abstract_text: "present".to_string(),
            ..Default::default()
        }];
        enricher.enrich(&mut candidates).await;
        assert_eq!(candidates[0].journal.as_deref(), Some("J"));
        assert_eq!(candidates[0].year, Some(2020));
    }

    #[tokio::test]
    async fn test_enrich_skips_doiless_candidates() {
        let enricher = CrossrefEnricher::new("test@example.com", 2).unwrap();
        let mut candidates = vec![PaperCandidate {
            title: "No identifier".to_string(),
            ..Default::default()
        }];
        enricher.enrich(&mut candidates).await;
        assert!(candidates[0].journal.is_none());
    }
}
