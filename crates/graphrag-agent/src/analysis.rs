//! Shallow query analysis: keyword intent, capitalized entity spans, and
//! coarse location filters.
//!
//! This is deliberately pattern matching, not NLP. Classification is
//! first-match over an ordered chain, so a query containing both "who" and
//! "how" is factual, never explanatory.

use graphrag_types::Properties;
use serde_json::json;

const FACTUAL_WORDS: [&str; 3] = ["who", "what", "where"];
const EXPLANATORY_WORDS: [&str; 3] = ["how", "why", "explain"];
const RETRIEVAL_WORDS: [&str; 3] = ["find", "search", "list"];
const KNOWN_CITIES: [&str; 3] = ["delhi", "mumbai", "bangalore"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    Factual,
    Explanatory,
    Retrieval,
    General,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Factual => "factual",
            QueryIntent::Explanatory => "explanatory",
            QueryIntent::Retrieval => "retrieval",
            QueryIntent::General => "general",
        }
    }
}

/// Retrieval strategy derived from one query.
#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    pub intent: QueryIntent,
    /// Candidate entity names: capitalized words, in query order.
    pub entities: Vec<String>,
    /// Attribute filters, currently only `location` from the city vocabulary.
    pub filters: Properties,
}

pub fn analyze_query(query: &str) -> QueryAnalysis {
    let query_lower = query.to_lowercase();

    let intent = if FACTUAL_WORDS.iter().any(|w| query_lower.contains(w)) {
        QueryIntent::Factual
    } else if EXPLANATORY_WORDS.iter().any(|w| query_lower.contains(w)) {
        QueryIntent::Explanatory
    } else if RETRIEVAL_WORDS.iter().any(|w| query_lower.contains(w)) {
        QueryIntent::Retrieval
    } else {
        QueryIntent::General
    };

    let mut filters = Properties::new();
    if query_lower.contains("in") {
        for city in KNOWN_CITIES {
            if query_lower.contains(city) {
                filters.insert("location".to_string(), json!(capitalize(city)));
            }
        }
    }

    QueryAnalysis {
        intent,
        entities: extract_capitalized(query),
        filters,
    }
}

/// Capitalized-word spans: an uppercase ASCII letter followed by one or more
/// lowercase letters, delimited by non-letters.
fn extract_capitalized(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| {
            let bytes = word.as_bytes();
            bytes.len() >= 2
                && bytes[0].is_ascii_uppercase()
                && bytes[1..].iter().all(|b| b.is_ascii_lowercase())
        })
        .map(String::from)
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
