//! arXiv search adapter.
//!
//! Thin client over the arXiv Atom API (`export.arxiv.org/api/query`).
//! Field search uses `ti:`/`abs:` prefixes; year constraints are pushed down
//! as a `submittedDate` range, though the central hard filters re-check them.
//! Every arXiv record is open access with a direct PDF link.

use super::{build_http_client, SearchSource};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::paper::{PaperCandidate, SearchFilters};
use crate::query::{build_provider_query, FieldSyntax};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info};

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivSource {
    client: reqwest::Client,
}

impl ArxivSource {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config.contact_email, config.provider_timeout_secs)?,
        })
    }

    fn build_search_query(query: &str, filters: &SearchFilters) -> String {
        let mut q = build_provider_query(query, FieldSyntax::Arxiv);
        // Bare free text still needs a field function for the arXiv API
        if !q.contains(':') {
            q = format!("all:{q}");
        }
        if filters.year_filter_active() {
            let from = filters.year_from.unwrap_or(1900);
            let to = filters.year_to.unwrap_or(2100);
            q = format!("({q}) AND submittedDate:[{from}01010000 TO {to}12312359]");
        }
        q
    }
}

#[async_trait]
impl SearchSource for ArxivSource {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<PaperCandidate>> {
        let search_query = Self::build_search_query(query, filters);
        debug!(query = %search_query, "arXiv search");

        let response = self
            .client
            .get(ARXIV_API_URL)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", &max_results.to_string()),
                ("sortBy", "relevance"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Api {
                code: response.status().as_u16() as i32,
                message: format!("arXiv API error: {}", response.status()),
            });
        }

        let body = response.text().await?;
        let candidates = parse_atom_feed(&body)?;
        info!(count = candidates.len(), "arXiv search complete");
        Ok(candidates)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an arXiv Atom feed into candidates.
fn parse_atom_feed(xml: &str) -> Result<Vec<PaperCandidate>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut candidates = Vec::new();
    let mut current: Option<PaperCandidate> = None;
    let mut in_author = false;
    let mut tag: Vec<u8> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                tag = e.name().as_ref().to_vec();
                match tag.as_slice() {
                    b"entry" => {
                        current = Some(PaperCandidate {
                            source: "arxiv".to_string(),
                            open_access: true,
                            ..Default::default()
                        })
                    }
                    b"author" => in_author = true,
                    _ => {}
                }
            }
            Event::Empty(e) => {
                // Links are self-closing: pick the abs page and the PDF
                if e.name().as_ref() == b"link" {
                    if let Some(entry) = current.as_mut() {
                        let mut href = String::new();
                        let mut rel = String::new();
                        let mut title = String::new();
                        for attr in e.attributes().flatten() {
                            let value = attr.unescape_value().unwrap_or_default().into_owned();
                            match attr.key.as_ref() {
                                b"href" => href = value,
                                b"rel" => rel = value,
                                b"title" => title = value,
                                _ => {}
                            }
                        }
                        if title == "pdf" {
                            entry.pdf_url = Some(href);
                        } else if rel == "alternate" {
                            entry.url = href;
                        }
                    }
                }
            }
            Event::Text(t) => {
                let Some(entry) = current.as_mut() else {
                    continue;
                };
                let text = t.unescape()?.into_owned();
                match tag.as_slice() {
                    b"title" => entry.title = collapse_whitespace(&text),
                    b"summary" => entry.abstract_text = collapse_whitespace(&text),
                    b"published" => {
                        entry.year = text.get(..4).and_then(|y| y.parse().ok());
                    }
                    b"name" if in_author => entry.authors.push(text),
                    b"arxiv:doi" => entry.doi = Some(text),
                    b"arxiv:journal_ref" => entry.journal = Some(collapse_whitespace(&text)),
                    b"id" if entry.url.is_empty() => entry.url = text,
                    _ => {}
                }
            }
            Event::End(e) => {
                match e.name().as_ref() {
                    b"entry" => {
                        if let Some(entry) = current.take() {
                            if !entry.title.is_empty() {
                                candidates.push(entry);
                            }
                        }
                    }
                    b"author" => in_author = false,
                    _ => {}
                }
                tag.clear();
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

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/2101.01234v1</id>
    <published>2021-01-04T18:00:00Z</published>
    <title>Sparse  Attention
      Mechanisms</title>
    <summary>We study sparse attention.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <arxiv:doi xmlns:arxiv="http://arxiv.org/schemas/atom">10.1234/example</arxiv:doi>
    <link href="http://arxiv.org/abs/2101.01234v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2101.01234v1" rel="related" type="application/pdf"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let papers = parse_atom_feed(FEED).unwrap();
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.title, "Sparse Attention Mechanisms");
        assert_eq!(p.abstract_text, "We study sparse attention.");
        assert_eq!(p.year, Some(2021));
        assert_eq!(p.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(p.doi.as_deref(), Some("10.1234/example"));
        assert_eq!(p.url, "http://arxiv.org/abs/2101.01234v1");
        assert_eq!(p.pdf_url.as_deref(), Some("http://arxiv.org/pdf/2101.01234v1"));
        assert!(p.open_access);
        assert_eq!(p.source, "arxiv");
    }

    #[test]
    fn test_feed_title_not_mistaken_for_entry() {
        let papers = parse_atom_feed(FEED).unwrap();
        assert_ne!(papers[0].title, "ArXiv Query Results");
    }

    #[test]
    fn test_build_search_query_with_years() {
        let filters = SearchFilters {
            year_from: Some(2020),
            year_to: Some(2024),
            open_access_only: false,
        };
        let q = ArxivSource::build_search_query("protein folding", &filters);
        assert!(q.contains("submittedDate:[202001010000 TO 202412312359]"));
        assert!(q.contains("ti:\"protein folding\""));
    }

    #[test]
    fn test_free_text_gets_all_prefix() {
        let filters = SearchFilters::default();
        let q = ArxivSource::build_search_query(
            "a very long free text query about several different topics",
            &filters,
        );
        assert!(q.starts_with("all:"));
    }
}
