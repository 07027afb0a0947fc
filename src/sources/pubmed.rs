//! PubMed search adapter.
//!
//! Two-step E-utilities flow: ESearch (JSON) resolves the query to PMIDs,
//! EFetch (XML) retrieves title, abstract, authors, journal, year and DOI.
//! Field search uses `[tiab]` tags; year constraints go down as
//! `mindate`/`maxdate` on the ESearch call.

use super::{build_http_client, SearchSource};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::paper::{PaperCandidate, SearchFilters};
use crate::query::{build_provider_query, FieldSyntax};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, info};

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

pub struct PubMedSource {
    client: reqwest::Client,
    contact_email: String,
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedSource {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config.contact_email, config.provider_timeout_secs)?,
            contact_email: config.contact_email.clone(),
        })
    }

    async fn esearch(
        &self,
        query: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<String>> {
        let term = build_provider_query(query, FieldSyntax::PubMed);
        let retmax = max_results.to_string();
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", term),
            ("retmode", "json".to_string()),
            ("retmax", retmax),
            ("tool", "paperscout".to_string()),
            ("email", self.contact_email.clone()),
        ];
        if let Some(from) = filters.year_from {
            params.push(("mindate", from.to_string()));
            params.push(("datetype", "pdat".to_string()));
        }
        if let Some(to) = filters.year_to {
            params.push(("maxdate", to.to_string()));
            if filters.year_from.is_none() {
                params.push(("datetype", "pdat".to_string()));
            }
        }

        let response = self
            .client
            .get(format!("{EUTILS_BASE}/esearch.fcgi"))
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Api {
                code: response.status().as_u16() as i32,
                message: format!("PubMed ESearch error: {}", response.status()),
            });
        }

        let data: ESearchResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(format!("Failed to parse ESearch response: {e}")))?;
        Ok(data.esearchresult.idlist)
    }

    async fn efetch(&self, pmids: &[String]) -> Result<Vec<PaperCandidate>> {
        let response = self
            .client
            .get(format!("{EUTILS_BASE}/efetch.fcgi"))
            .query(&[
                ("db", "pubmed"),
                ("id", &pmids.join(",")),
                ("retmode", "xml"),
                ("tool", "paperscout"),
                ("email", &self.contact_email),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Api {
                code: response.status().as_u16() as i32,
                message: format!("PubMed EFetch error: {}", response.status()),
            });
        }

        let body = response.text().await?;
        parse_efetch_xml(&body)
    }
}

#[async_trait]
impl SearchSource for PubMedSource {
    fn name(&self) -> &'static str {
        "pubmed"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<PaperCandidate>> {
        let pmids = self.esearch(query, max_results, filters).await?;
        debug!(count = pmids.len(), "PubMed ESearch returned PMIDs");
        if pmids.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self.efetch(&pmids).await?;
        info!(count = candidates.len(), "PubMed search complete");
        Ok(candidates)
    }
}

fn path_ends_with(path: &[Vec<u8>], suffix: &[&[u8]]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a.as_slice() == *b)
}

/// Parse a PubMed EFetch `PubmedArticleSet` payload.
fn parse_efetch_xml(xml: &str) -> Result<Vec<PaperCandidate>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut candidates = Vec::new();
    let mut current: Option<PaperCandidate> = None;
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut pmid = String::new();
    let mut last_name = String::new();
    let mut fore_name = String::new();
    let mut article_id_type = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if name == b"PubmedArticle" {
                    current = Some(PaperCandidate {
                        source: "pubmed".to_string(),
                        ..Default::default()
                    });
                    pmid.clear();
                } else if name == b"ArticleId" {
                    article_id_type = e
                        .try_get_attribute("IdType")
                        .ok()
                        .flatten()
                        .and_then(|a| a.unescape_value().ok())
                        .map(|v| v.into_owned())
                        .unwrap_or_default();
                }
                path.push(name);
            }
            Event::Text(t) => {
                let Some(entry) = current.as_mut() else {
                    continue;
                };
                let text = t.unescape()?.into_owned();
                if path_ends_with(&path, &[b"MedlineCitation", b"PMID"]) {
                    pmid = text;
                } else if path_ends_with(&path, &[b"ArticleTitle"]) {
                    entry.title.push_str(&text);
                } else if path_ends_with(&path, &[b"Abstract", b"AbstractText"]) {
                    // Structured abstracts arrive as multiple sections
                    if !entry.abstract_text.is_empty() {
                        entry.abstract_text.push(' ');
                    }
                    entry.abstract_text.push_str(&text);
                } else if path_ends_with(&path, &[b"Journal", b"Title"]) {
                    entry.journal = Some(text);
                } else if path_ends_with(&path, &[b"PubDate", b"Year"]) {
                    entry.year = text.parse().ok();
                } else if path_ends_with(&path, &[b"PubDate", b"MedlineDate"]) {
                    if entry.year.is_none() {
                        entry.year = text.get(..4).and_then(|y| y.parse().ok());
                    }
                } else if path_ends_with(&path, &[b"Author", b"LastName"]) {
                    last_name = text;
                } else if path_ends_with(&path, &[b"Author", b"ForeName"]) {
                    fore_name = text;
                } else if path_ends_with(&path, &[b"ArticleId"]) && article_id_type == "doi" {
                    entry.doi = Some(text);
                }
            }
            Event::End(e) => {
                let name = e.name().as_ref().to_vec();
                path.pop();
                match name.as_slice() {
                    b"Author" => {
                        if let Some(entry) = current.as_mut() {
                            let full = format!("{fore_name} {last_name}").trim().to_string();
                            if !full.is_empty() {
                                entry.authors.push(full);
                            }
                        }
                        last_name.clear();
                        fore_name.clear();
                    }
                    b"ArticleId" => article_id_type.clear(),
                    b"PubmedArticle" => {
                        if let Some(mut entry) = current.take() {
                            if !pmid.is_empty() {
                                entry.url = format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/");
                            }
                            if !entry.title.is_empty() {
                                candidates.push(entry);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(candidates)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EFETCH_XML: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">31452104</PMID>
      <Article>
        <Journal>
          <Title>Nature Medicine</Title>
          <JournalIssue><PubDate><Year>2023</Year><Month>Jun</Month></PubDate></JournalIssue>
        </Journal>
        <ArticleTitle>Deep learning for sepsis prediction</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Sepsis is deadly.</AbstractText>
          <AbstractText Label="METHODS">We trained a model.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Curie</LastName><ForeName>Marie</ForeName></Author>
          <Author><LastName>Salk</LastName><ForeName>Jonas</ForeName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">31452104</ArticleId>
        <ArticleId IdType="doi">10.1038/s41591-023-0001</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_efetch_xml() {
        let papers = parse_efetch_xml(EFETCH_XML).unwrap();
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.title, "Deep learning for sepsis prediction");
        assert_eq!(p.abstract_text, "Sepsis is deadly. We trained a model.");
        assert_eq!(p.journal.as_deref(), Some("Nature Medicine"));
        assert_eq!(p.year, Some(2023));
        assert_eq!(p.authors, vec!["Marie Curie", "Jonas Salk"]);
        assert_eq!(p.doi.as_deref(), Some("10.1038/s41591-023-0001"));
        assert_eq!(p.url, "https://pubmed.ncbi.nlm.nih.gov/31452104/");
        assert_eq!(p.source, "pubmed");
    }

    #[test]
    fn test_medline_date_fallback() {
        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation>
            <PMID>1</PMID>
            <Article>
              <Journal><JournalIssue><PubDate><MedlineDate>2019 Jan-Feb</MedlineDate></PubDate></JournalIssue></Journal>
              <ArticleTitle>Range dated article</ArticleTitle>
            </Article>
        </MedlineCitation></PubmedArticle></PubmedArticleSet>"#;
        let papers = parse_efetch_xml(xml).unwrap();
        assert_eq!(papers[0].year, Some(2019));
    }

    #[test]
    fn test_pubmed_id_not_taken_as_doi() {
        let papers = parse_efetch_xml(EFETCH_XML).unwrap();
        assert_ne!(papers[0].doi.as_deref(), Some("31452104"));
    }
}
