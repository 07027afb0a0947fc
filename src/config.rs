//! Engine configuration.
//!
//! [`DiscoveryConfig`] carries everything the orchestrator and its strategies
//! need: API credentials, polite-pool emails, timeouts, concurrency caps,
//! lexical ranking weights, and the optional LLM/reranker settings. Callers
//! build it programmatically or from `PAPERSCOUT_*` environment variables.

use crate::rank::RankWeights;

/// OpenAI-compatible LLM endpoint settings for the LLM-assisted ranker.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Two-stage reranker settings.
#[derive(Debug, Clone)]
pub struct RerankConfig {
    /// Candidates retained after the embedding stage
    pub stage_one_k: usize,
    /// Candidates returned after the cross-encoder stage
    pub stage_two_k: usize,
    /// Weight of the bi-encoder cosine similarity in the blend
    pub embed_weight: f32,
    /// Weight of the sigmoid-normalized cross-encoder score in the blend
    pub cross_weight: f32,
    /// Truncation limit for title+abstract fed to the cross-encoder
    pub max_text_chars: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            stage_one_k: 50,
            stage_two_k: 20,
            embed_weight: 0.40,
            cross_weight: 0.60,
            max_text_chars: 2000,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Email for polite pools (Crossref, OpenAlex, PubMed tool param)
    pub contact_email: String,
    /// Unpaywall requires an email on every request
    pub unpaywall_email: String,
    pub semantic_scholar_api_key: Option<String>,
    pub core_api_key: Option<String>,
    pub sciencedirect_api_key: Option<String>,
    /// Per-provider search deadline in seconds
    pub provider_timeout_secs: u64,
    /// Cap on concurrent outbound enrichment calls
    pub enrich_concurrency: usize,
    /// Enabled providers, in priority order (first-seen wins at dedup)
    pub sources: Vec<String>,
    pub weights: RankWeights,
    /// When set, the LLM-assisted ranker is used instead of the lexical one
    pub llm: Option<LlmConfig>,
    /// How many leading candidates the LLM ranker scores per request
    pub llm_candidate_limit: usize,
    pub rerank: RerankConfig,
}

/// Default provider order. Order matters: it decides which duplicate survives.
pub const DEFAULT_SOURCES: &[&str] = &[
    "arxiv",
    "pubmed",
    "europepmc",
    "semanticscholar",
    "openalex",
    "sciencedirect",
    "core",
];

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            contact_email: "paperscout@example.com".to_string(),
            unpaywall_email: "paperscout@example.com".to_string(),
            semantic_scholar_api_key: None,
            core_api_key: None,
            sciencedirect_api_key: None,
            provider_timeout_secs: 20,
            enrich_concurrency: 3,
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            weights: RankWeights::default(),
            llm: None,
            llm_candidate_limit: 50,
            rerank: RerankConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    /// Build a config from `PAPERSCOUT_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(email) = env_nonempty("PAPERSCOUT_EMAIL") {
            config.contact_email = email.clone();
            config.unpaywall_email = email;
        }
        if let Some(email) = env_nonempty("PAPERSCOUT_UNPAYWALL_EMAIL") {
            config.unpaywall_email = email;
        }
        config.semantic_scholar_api_key = env_nonempty("PAPERSCOUT_S2_API_KEY");
        config.core_api_key = env_nonempty("PAPERSCOUT_CORE_API_KEY");
        config.sciencedirect_api_key = env_nonempty("PAPERSCOUT_ELSEVIER_API_KEY");

        if let Some(secs) = env_nonempty("PAPERSCOUT_PROVIDER_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
        {
            config.provider_timeout_secs = secs;
        }
        if let Some(cap) = env_nonempty("PAPERSCOUT_ENRICH_CONCURRENCY")
            .and_then(|v| v.parse().ok())
        {
            config.enrich_concurrency = cap;
        }
        if let Some(limit) = env_nonempty("PAPERSCOUT_LLM_CANDIDATE_LIMIT")
            .and_then(|v| v.parse().ok())
        {
            config.llm_candidate_limit = limit;
        }

        // LLM ranking activates only when both endpoint and key are present
        if let (Some(base_url), Some(api_key)) = (
            env_nonempty("PAPERSCOUT_LLM_BASE_URL"),
            env_nonempty("PAPERSCOUT_LLM_API_KEY"),
        ) {
            config.llm = Some(LlmConfig {
                base_url,
                api_key,
                model: env_nonempty("PAPERSCOUT_LLM_MODEL")
                    .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            });
        }

        config
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.sources.len(), DEFAULT_SOURCES.len());
        assert_eq!(config.sources[0], "arxiv");
        assert_eq!(config.llm_candidate_limit, 50);
        assert!(config.llm.is_none());
    }

    #[test]
    fn test_rerank_defaults() {
        let rerank = RerankConfig::default();
        assert_eq!(rerank.stage_one_k, 50);
        assert_eq!(rerank.stage_two_k, 20);
        assert!((rerank.embed_weight + rerank.cross_weight - 1.0).abs() < 1e-6);
    }
}
