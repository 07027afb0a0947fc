//! Two-stage neural reranker.
//!
//! Stage one embeds the query and every candidate's title+abstract with a
//! local bi-encoder and keeps the top K by cosine similarity. Stage two runs
//! a cross-encoder over (query, text) pairs for the survivors and blends both
//! signals into the final score. Models are ONNX files loaded lazily once per
//! process; first use downloads them. Inference is synchronous, so it runs on
//! the blocking pool.

use crate::config::RerankConfig;
use crate::error::{DiscoveryError, Result};
use crate::paper::{PaperCandidate, RerankedCandidate};
use fastembed::{
    EmbeddingModel, InitOptions, RerankInitOptions, RerankerModel, TextEmbedding, TextRerank,
};
use std::sync::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info};

static EMBEDDING_MODEL: OnceCell<Mutex<TextEmbedding>> = OnceCell::const_new();
static CROSS_MODEL: OnceCell<Mutex<TextRerank>> = OnceCell::const_new();

async fn embedding_model() -> Result<&'static Mutex<TextEmbedding>> {
    EMBEDDING_MODEL
        .get_or_try_init(|| async {
            info!("Loading embedding model");
            tokio::task::spawn_blocking(|| {
                TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
                    .map(Mutex::new)
                    .map_err(|e| DiscoveryError::Model(format!("Embedding model load: {e}")))
            })
            .await
            .map_err(|e| DiscoveryError::Model(format!("Model load task: {e}")))?
        })
        .await
}

async fn cross_model() -> Result<&'static Mutex<TextRerank>> {
    CROSS_MODEL
        .get_or_try_init(|| async {
            info!("Loading cross-encoder model");
            tokio::task::spawn_blocking(|| {
                TextRerank::try_new(RerankInitOptions::new(RerankerModel::BGERerankerBase))
                    .map(Mutex::new)
                    .map_err(|e| DiscoveryError::Model(format!("Cross-encoder load: {e}")))
            })
            .await
            .map_err(|e| DiscoveryError::Model(format!("Model load task: {e}")))?
        })
        .await
}

pub struct Reranker {
    config: RerankConfig,
}

impl Reranker {
    pub fn new(config: RerankConfig) -> Self {
        Self { config }
    }

    /// Full two-stage pass: bi-encoder shortlist, cross-encoder refinement,
    /// blended ordering. Input candidates are read-only.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[PaperCandidate],
    ) -> Result<Vec<RerankedCandidate>> {
        let mut shortlist = self.embed_stage(query, candidates).await?;
        shortlist.truncate(self.config.stage_one_k);
        if shortlist.is_empty() {
            return Ok(shortlist);
        }

        let pairs: Vec<String> = shortlist
            .iter()
            .map(|r| truncate_text(&r.candidate.scoring_text(), self.config.max_text_chars))
            .collect();
        let query_owned = query.to_string();

        let model = cross_model().await?;
        let results = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| DiscoveryError::Model("Cross-encoder lock poisoned".to_string()))?;
            let docs: Vec<&str> = pairs.iter().map(String::as_str).collect();
            model
                .rerank(query_owned.as_str(), docs, false, None)
                .map_err(|e| DiscoveryError::Model(format!("Cross-encoder inference: {e}")))
        })
        .await
        .map_err(|e| DiscoveryError::Model(format!("Inference task: {e}")))??;

        for result in results {
            if let Some(entry) = shortlist.get_mut(result.index) {
                entry.cross_score = result.score;
                entry.final_score =
                    blend(entry.embedding_score, result.score, &self.config);
            }
        }

        sort_reranked(&mut shortlist);
        shortlist.truncate(self.config.stage_two_k);
        debug!(count = shortlist.len(), "Two-stage rerank complete");
        Ok(shortlist)
    }

    /// Embedding-only variant; final score is the cosine similarity itself.
    pub async fn rerank_single_stage(
        &self,
        query: &str,
        candidates: &[PaperCandidate],
    ) -> Result<Vec<RerankedCandidate>> {
        let mut scored = self.embed_stage(query, candidates).await?;
        scored.truncate(self.config.stage_one_k);
        debug!(count = scored.len(), "Single-stage rerank complete");
        Ok(scored)
    }

    /// Embed query and candidates, score by cosine similarity, sort
    /// descending. Returns every candidate, untruncated.
    async fn embed_stage(
        &self,
        query: &str,
        candidates: &[PaperCandidate],
    ) -> Result<Vec<RerankedCandidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(query.to_string());
        texts.extend(candidates.iter().map(|c| c.scoring_text()));

        let model = embedding_model().await?;
        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| DiscoveryError::Model("Embedding lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| DiscoveryError::Model(format!("Embedding inference: {e}")))
        })
        .await
        .map_err(|e| DiscoveryError::Model(format!("Inference task: {e}")))??;

        let (query_vec, candidate_vecs) = embeddings
            .split_first()
            .ok_or_else(|| DiscoveryError::Model("Empty embedding batch".to_string()))?;

        let mut scored: Vec<RerankedCandidate> = candidates
            .iter()
            .zip(candidate_vecs)
            .map(|(candidate, vec)| {
                let sim = cosine_similarity(query_vec, vec);
                RerankedCandidate {
                    candidate: candidate.clone(),
                    embedding_score: sim,
                    cross_score: 0.0,
                    final_score: sim,
                }
            })
            .collect();

        sort_reranked(&mut scored);
        Ok(scored)
    }
}

fn sort_reranked(entries: &mut [RerankedCandidate]) {
    entries.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Blend the two stages into the final ordering score.
fn blend(embedding_score: f32, cross_score: f32, config: &RerankConfig) -> f32 {
    config.embed_weight * embedding_score + config.cross_weight * sigmoid(cross_score)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Truncate at a char boundary so multibyte text cannot split a codepoint.
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
