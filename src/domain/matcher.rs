//! Free-text symptom matching against the vocabulary.
//!
//! The user's text becomes an unanchored, case-sensitive regular expression
//! (spaces turned into underscores) searched in every vocabulary name.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::vocabulary::SymptomVocabulary;

/// Compiled size cap for user-supplied patterns.
const MAX_PATTERN_SIZE: usize = 1 << 16;

/// Outcome of a free-text lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub found: bool,
    /// Matching vocabulary names, in vocabulary order.
    pub candidates: Vec<String>,
}

impl MatchResult {
    fn none() -> Self {
        Self::default()
    }
}

/// Turn user text into the search pattern.
///
/// Leading/trailing whitespace is dropped and inner spaces become underscores.
#[must_use]
pub fn normalize_query(text: &str) -> String {
    text.trim().replace(' ', "_")
}

fn compile(pattern: &str) -> Option<Regex> {
    let build = |p: &str| RegexBuilder::new(p).size_limit(MAX_PATTERN_SIZE).build();
    match build(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            // Not a valid expression: search for it literally instead.
            tracing::debug!("Symptom query is not a valid pattern ({}), matching literally", e);
            build(&regex::escape(pattern)).ok()
        }
    }
}

/// Resolve free text to vocabulary symptoms.
///
/// A name is a candidate when the pattern matches it (or its spaces turned
/// into underscores), or when it contains the trimmed text literally.
#[must_use]
pub fn match_symptom(vocabulary: &SymptomVocabulary, text: &str) -> MatchResult {
    let literal = text.trim();
    let pattern = normalize_query(text);
    if pattern.is_empty() {
        return MatchResult::none();
    }
    let re = compile(&pattern);

    let candidates: Vec<String> = vocabulary
        .names()
        .filter(|name| {
            name.contains(literal)
                || re.as_ref().is_some_and(|re| {
                    re.is_match(name) || (name.contains(' ') && re.is_match(&normalize_query(name)))
                })
        })
        .map(str::to_string)
        .collect();

    MatchResult {
        found: !candidates.is_empty(),
        candidates,
    }
}
