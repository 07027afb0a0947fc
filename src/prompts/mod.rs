//! Prompt templates for LLM-assisted ranking.

pub mod relevance_rank;
