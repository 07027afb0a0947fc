//! LLM-assisted ranker.
//!
//! Sends one chat-completions request to an OpenAI-compatible endpoint,
//! scoring up to `llm_candidate_limit` leading candidates in a single batch.
//! Anything beyond the limit keeps a relevance of 0 and sorts after the
//! scored head. Every failure mode (no key, transport error, bad JSON)
//! degrades transparently to the minimal ranker.

use super::{minimal::MinimalRanker, sort_by_relevance, Ranker};
use crate::config::LlmConfig;
use crate::error::{DiscoveryError, Result};
use crate::paper::PaperCandidate;
use crate::prompts::relevance_rank;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub struct LlmRanker {
    client: reqwest::Client,
    config: LlmConfig,
    candidate_limit: usize,
    fallback: MinimalRanker,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ScoreSheet {
    scores: HashMap<String, f64>,
}

impl LlmRanker {
    pub fn new(config: LlmConfig, candidate_limit: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DiscoveryError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            candidate_limit: candidate_limit.max(1),
            fallback: MinimalRanker,
        })
    }

    async fn score_batch(&self, candidates: &[PaperCandidate], query: &str) -> Result<HashMap<usize, f64>> {
        if self.config.api_key.trim().is_empty() {
            return Err(DiscoveryError::Config("No LLM API key".to_string()));
        }

        let papers = render_paper_list(candidates);
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": relevance_rank::SYSTEM_PROMPT},
                {"role": "user", "content": relevance_rank::build_user_prompt(query, &papers)}
            ],
            "temperature": 0.0
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Api {
                code: status.as_u16() as i32,
                message: format!("LLM API error: {status}"),
            });
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        let raw = extract_json(content)
            .ok_or_else(|| DiscoveryError::Parse("No JSON object in LLM response".to_string()))?;
        let sheet: ScoreSheet = serde_json::from_str(&raw)?;

        Ok(sheet
            .scores
            .into_iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v.clamp(0.0, 1.0))))
            .collect())
    }
}

#[async_trait]
impl Ranker for LlmRanker {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn rank(
        &self,
        candidates: &mut Vec<PaperCandidate>,
        query: &str,
        target_text: Option<&str>,
        target_keywords: &[String],
    ) {
        if candidates.is_empty() {
            return;
        }

        let head = candidates.len().min(self.candidate_limit);
        match self.score_batch(&candidates[..head], query).await {
            Ok(scores) => {
                for (i, candidate) in candidates.iter_mut().enumerate().take(head) {
                    candidate.relevance = scores.get(&i).copied().unwrap_or(0.0);
                }
                for candidate in candidates.iter_mut().skip(head) {
                    candidate.relevance = 0.0;
                }
                sort_by_relevance(candidates);
                debug!(scored = head, "LLM ranking complete");
            }
            Err(e) => {
                warn!(error = %e, "LLM ranking failed, falling back to minimal");
                self.fallback
                    .rank(candidates, query, target_text, target_keywords)
                    .await;
            }
        }
    }
}

fn render_paper_list(candidates: &[PaperCandidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let year = c.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string());
            // Char-based cut so multibyte abstracts cannot split a codepoint
            let abstract_snippet: String = c.abstract_text.chars().take(500).collect();
            format!(
                "[{i}] {} ({year}, {})\n{abstract_snippet}",
                c.title, c.source
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extract the first JSON object from text that may be wrapped in markdown
/// fences or surrounded by prose.
fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed.to_string());
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return Some(inner.to_string());
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        Some(trimmed[start..=end].to_string())
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(
            extract_json(r#"{"scores": {"0": 0.5}}"#).unwrap(),
            r#"{"scores": {"0": 0.5}}"#
        );
    }

    #[test]
    fn test_extract_json_fenced() {
        let text = "Here you go:\n```json\n{\"scores\": {\"0\": 1.0}}\n```";
        assert_eq!(extract_json(text).unwrap(), "{\"scores\": {\"0\": 1.0}}");
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let text = "The scores are {\"scores\": {\"0\": 0.3}} as requested.";
        assert_eq!(extract_json(text).unwrap(), "{\"scores\": {\"0\": 0.3}}");
    }

    #[test]
    fn test_extract_json_none() {
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn test_render_paper_list() {
        let candidates = vec![PaperCandidate {
            title: "A Study".to_string(),
            year: Some(2021),
            source: "arxiv".to_string(),
            abstract_text: "Short abstract.".to_string(),
            ..Default::default()
        }];
        let rendered = render_paper_list(&candidates);
        assert!(rendered.starts_with("[0] A Study (2021, arxiv)"));
        assert!(rendered.contains("Short abstract."));
    }

    #[tokio::test]
    async fn test_missing_key_matches_minimal_order() {
        // Without a key no request is attempted and the minimal ranker's
        // order is reproduced exactly.
        let config = LlmConfig {
            base_url: "https://api.example.com/v1".to_string(),
            api_key: String::new(),
            model: "test".to_string(),
        };
        let llm = LlmRanker::new(config, 50).unwrap();

        let make = || {
            vec![
                PaperCandidate {
                    title: "Loosely related".to_string(),
                    abstract_text: "sparse attention transformers".to_string(),
                    ..Default::default()
                },
                PaperCandidate {
                    title: "Sparse attention transformers".to_string(),
                    ..Default::default()
                },
            ]
        };

        let mut via_llm = make();
        llm.rank(&mut via_llm, "sparse attention transformers", None, &[])
            .await;

        let mut via_minimal = make();
        MinimalRanker
            .rank(&mut via_minimal, "sparse attention transformers", None, &[])
            .await;

        let scored = |v: &[PaperCandidate]| {
            v.iter()
                .map(|c| (c.title.clone(), c.relevance))
                .collect::<Vec<_>>()
        };
        assert_eq!(scored(&via_llm), scored(&via_minimal));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back_to_minimal() {
        // A dead endpoint must degrade to the minimal ranker, producing the
        // same order the minimal ranker would on its own.
        let config = LlmConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "unused".to_string(),
            model: "test".to_string(),
        };
        let llm = LlmRanker::new(config, 50).unwrap();

        let make = || {
            vec![
                PaperCandidate {
                    title: "Background reading".to_string(),
                    abstract_text: "quantum error correction".to_string(),
                    ..Default::default()
                },
                PaperCandidate {
                    title: "Quantum error correction codes".to_string(),
                    ..Default::default()
                },
            ]
        };

        let mut via_llm = make();
        llm.rank(&mut via_llm, "quantum error correction", None, &[])
            .await;

        let mut via_minimal = make();
        MinimalRanker
            .rank(&mut via_minimal, "quantum error correction", None, &[])
            .await;

        let titles = |v: &[PaperCandidate]| v.iter().map(|c| c.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&via_llm), titles(&via_minimal));
    }
}
