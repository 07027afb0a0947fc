//! Relevance scoring prompt.
//!
//! One batched request scores a numbered candidate list against the research
//! query. The model must answer with strict JSON so the response survives
//! `extract_json`.

pub const SYSTEM_PROMPT: &str = r#"You are an expert research librarian. You judge how relevant academic papers are to a research query.

You respond ONLY with valid JSON, no prose, no markdown fences. The JSON object maps each paper's index (as a string) to a relevance score between 0.0 and 1.0:

{"scores": {"0": 0.95, "1": 0.2, "2": 0.7}}

Scoring guidance:
- 0.9-1.0: directly answers the query
- 0.6-0.8: same topic, different angle or method
- 0.3-0.5: adjacent field, partially related
- 0.0-0.2: unrelated

Score every paper in the list. Never omit an index."#;

pub const USER_PROMPT_TEMPLATE: &str = r#"Research query: {query}

Papers:
{papers}

Score each paper's relevance to the query. Respond with JSON only."#;

/// Fill the user prompt template with the query and a pre-rendered,
/// numbered paper list.
pub fn build_user_prompt(query: &str, papers: &str) -> String {
    USER_PROMPT_TEMPLATE
        .replace("{query}", query)
        .replace("{papers}", papers)
}
