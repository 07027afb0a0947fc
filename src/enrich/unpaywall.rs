//! Unpaywall open-access enricher.
//!
//! Resolves DOIs against the Unpaywall v2 API and fills in open-access
//! signals: the OA flag (upgrade-only, never downgraded), a direct PDF URL,
//! and an OA landing page. Unpaywall mandates an email on every request.

use super::Enricher;
use crate::error::{DiscoveryError, Result};
use crate::paper::PaperCandidate;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

const UNPAYWALL_API_URL: &str = "https://api.unpaywall.org/v2";

/// Hosts whose Unpaywall PDF links frequently dead-end behind paywalls or
/// login walls. Links from these hosts are dropped rather than surfaced.
const UNRELIABLE_PDF_HOSTS: &[&str] = &[
    "academic.oup.com",
    "onlinelibrary.wiley.com",
    "www.sciencedirect.com",
];

pub struct UnpaywallEnricher {
    client: reqwest::Client,
    email: String,
    semaphore: Arc<Semaphore>,
}

#[derive(Debug, Deserialize)]
struct UnpaywallResponse {
    #[serde(default)]
    is_oa: bool,
    best_oa_location: Option<OaLocation>,
}

#[derive(Debug, Deserialize)]
struct OaLocation {
    url: Option<String>,
    url_for_pdf: Option<String>,
}

impl UnpaywallEnricher {
    pub fn new(email: &str, max_workers: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("paperscout/0.1 (mailto:{email})"))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DiscoveryError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            email: email.to_string(),
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
        })
    }

    async fn lookup_doi(&self, doi: &str) -> Option<UnpaywallResponse> {
        let _permit = self.semaphore.acquire().await.ok()?;

        let url = format!("{}/{}", UNPAYWALL_API_URL, urlencoding::encode(doi));
        let response = self
            .client
            .get(&url)
            .query(&[("email", self.email.as_str())])
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            debug!(doi = doi, status = %response.status(), "Unpaywall lookup failed");
            return None;
        }

        response.json().await.ok()
    }
}

#[async_trait]
impl Enricher for UnpaywallEnricher {
    fn name(&self) -> &'static str {
        "unpaywall"
    }

    async fn enrich(&self, candidates: &mut [PaperCandidate]) {
        let targets: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.doi.is_some() && (!c.open_access || c.pdf_url.is_none()))
            .map(|(i, _)| i)
            .collect();

        if targets.is_empty() {
            return;
        }
        info!(count = targets.len(), "Starting Unpaywall enrichment");

        let futures: Vec<_> = targets
            .iter()
            .map(|&i| {
                let doi = candidates[i].doi.clone().unwrap_or_default();
                async move { (i, self.lookup_doi(&doi).await) }
            })
            .collect();

        let results = join_all(futures).await;
        let mut filled = 0usize;

        for (i, response) in results {
            let Some(response) = response else { continue };
            filled += 1;
            apply_oa_fill(&mut candidates[i], &response);
        }

        info!(total = targets.len(), matched = filled, "Unpaywall enrichment complete");
    }
}

/// Upgrade-only application: `is_oa: false` never clears a flag another
/// provider already set.
fn apply_oa_fill(candidate: &mut PaperCandidate, response: &UnpaywallResponse) {
    if response.is_oa {
        candidate.open_access = true;
    }

    let Some(ref location) = response.best_oa_location else {
        return;
    };

    if candidate.pdf_url.is_none() {
        candidate.pdf_url = location
            .url_for_pdf
            .clone()
            .filter(|u| !u.is_empty() && !from_unreliable_host(u));
    }
    if candidate.oa_url.is_none() {
        candidate.oa_url = location.url.clone().filter(|u| !u.is_empty());
    }
}

fn from_unreliable_host(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .is_some_and(|host| UNRELIABLE_PDF_HOSTS.contains(&host.as_str()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_oa_fill_upgrades_flag() {
        let mut candidate = PaperCandidate {
            doi: Some("10.1/a".to_string()),
            ..Default::default()
        };
        let response = UnpaywallResponse {
            is_oa: true,
            best_oa_location: Some(OaLocation {
                url: Some("https://repo.org/landing".to_string()),
                url_for_pdf: Some("https://repo.org/paper.pdf".to_string()),
            }),
        };
        apply_oa_fill(&mut candidate, &response);
        assert!(candidate.open_access);
        assert_eq!(candidate.pdf_url.as_deref(), Some("https://repo.org/paper.pdf"));
        assert_eq!(candidate.oa_url.as_deref(), Some("https://repo.org/landing"));
    }

    #[test]
    fn test_apply_oa_fill_never_downgrades() {
        let mut candidate = PaperCandidate {
            open_access: true,
            ..Default::default()
        };
        let response = UnpaywallResponse {
            is_oa: false,
            best_oa_location: None,
        };
        apply_oa_fill(&mut candidate, &response);
        assert!(candidate.open_access);
    }

    #[test]
    fn test_apply_oa_fill_preserves_existing_pdf() {
        let mut candidate = PaperCandidate {
            pdf_url: Some("https://arxiv.org/pdf/1234.pdf".to_string()),
            ..Default::default()
        };
        let response = UnpaywallResponse {
            is_oa: true,
            best_oa_location: Some(OaLocation {
                url: None,
                url_for_pdf: Some("https://other.org/x.pdf".to_string()),
            }),
        };
        apply_oa_fill(&mut candidate, &response);
        assert_eq!(candidate.pdf_url.as_deref(), Some("https://arxiv.org/pdf/1234.pdf"));
    }

    #[test]
    fn test_unreliable_host_pdf_dropped() {
        let mut candidate = PaperCandidate::default();
        let response = UnpaywallResponse {
            is_oa: true,
            best_oa_location: Some(OaLocation {
                url: Some("https://academic.oup.com/article/1".to_string()),
                url_for_pdf: Some("https://academic.oup.com/article/1.pdf".to_string()),
            }),
        };
        apply_oa_fill(&mut candidate, &response);
        assert!(candidate.pdf_url.is_none());
        // Landing page is still kept; only the PDF link is untrustworthy
        assert!(candidate.oa_url.is_some());
    }
}
