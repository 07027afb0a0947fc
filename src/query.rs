//! Per-provider query translation.
//!
//! Providers disagree on field-search syntax: arXiv wants `ti:`/`abs:`
//! prefixes, PubMed wants `[tiab]` tags, Europe PMC wants `TITLE:`/`ABS:`
//! functions, and several engines rank best when handed the raw query. This
//! module turns one free-text query (possibly containing caller-quoted
//! phrases) into each provider's native syntax. Everything here is pure and
//! deterministic.

/// Words ignored when deciding whether a query is "short".
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it",
    "of", "on", "or", "that", "the", "to", "with",
];

/// How a provider expresses "this term must appear in title or abstract".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSyntax {
    /// arXiv API: `ti:"..."` / `abs:"..."`
    Arxiv,
    /// PubMed E-utilities: `"..."[tiab]`
    PubMed,
    /// Europe PMC: `TITLE:"..."` / `ABS:"..."`
    EuropePmc,
    /// No field syntax; the provider's own relevance engine is trusted
    Passthrough,
}

impl FieldSyntax {
    /// Field-match expression for a phrase or single word, or `None` for
    /// passthrough providers.
    fn field_match(&self, term: &str) -> Option<String> {
        match self {
            FieldSyntax::Arxiv => Some(format!("(ti:\"{term}\" OR abs:\"{term}\")")),
            FieldSyntax::PubMed => Some(format!("\"{term}\"[tiab]")),
            FieldSyntax::EuropePmc => Some(format!("(TITLE:\"{term}\" OR ABS:\"{term}\")")),
            FieldSyntax::Passthrough => None,
        }
    }
}

/// Split caller-supplied quoted phrases out of a raw query.
///
/// Returns the phrases (without quotes) and the leftover free text with
/// whitespace collapsed.
pub fn extract_quoted_phrases(raw: &str) -> (Vec<String>, String) {
    let mut phrases = Vec::new();
    let mut remainder = String::new();
    let mut rest = raw;

    while let Some(open) = rest.find('"') {
        remainder.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('"') {
            Some(close) => {
                let phrase = after[..close].trim();
                if !phrase.is_empty() {
                    phrases.push(phrase.to_string());
                }
                rest = &after[close + 1..];
            }
            None => {
                // Unbalanced quote: treat the tail as free text
                remainder.push_str(after);
                rest = "";
            }
        }
    }
    remainder.push_str(rest);

    let remainder = remainder.split_whitespace().collect::<Vec<_>>().join(" ");
    (phrases, remainder)
}

fn meaningful_words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .collect()
}

/// Translate a free-text query into one provider's search syntax.
///
/// 1. Caller-quoted phrases become a conjunction of per-phrase field matches,
///    plus any remaining free text.
/// 2. Without phrases, a short query (2-4 meaningful words) becomes a
///    disjunction of the exact short phrase and a conjunction of individual
///    field-matched words, balancing precision and recall for narrow topics.
/// 3. Anything else passes through unmodified so the provider's own relevance
///    engine is not over-constrained.
pub fn build_provider_query(raw: &str, syntax: FieldSyntax) -> String {
    let raw = raw.trim();
    if raw.is_empty() || syntax == FieldSyntax::Passthrough {
        return raw.to_string();
    }

    let (phrases, remainder) = extract_quoted_phrases(raw);

    if !phrases.is_empty() {
        let mut parts: Vec<String> = phrases
            .iter()
            .filter_map(|p| syntax.field_match(p))
            .collect();
        if !remainder.is_empty() {
            parts.push(remainder);
        }
        return parts.join(" AND ");
    }

    let words = meaningful_words(&remainder);
    if (2..=4).contains(&words.len()) {
        let exact = syntax.field_match(&remainder);
        let conjunction = words
            .iter()
            .filter_map(|w| syntax.field_match(w))
            .collect::<Vec<_>>()
            .join(" AND ");
        if let Some(exact) = exact {
            return format!("{exact} OR ({conjunction})");
        }
    }

    raw.to_string()
}
