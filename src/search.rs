//! Lexical retrieval over the knowledge library.
//!
//! Three stages, each a pure function:
//!
//! 1. [`normalize`] — lowercase, strip everything but `[a-z0-9]` and
//!    whitespace, collapse runs of whitespace.
//! 2. [`score_entry`] — count the distinct query tokens (length ≥
//!    `min_token_len`) that occur as a substring of the entry's
//!    normalized `title + tags + content`.
//! 3. [`rank_entries`] — stable sort by descending score, cap at
//!    `max_results`, then drop zero scores.
//!
//! Matching is substring containment, not word-boundary aware: `grip`
//! matches inside `gripping`, and `cat` matches inside `locate`.

use std::collections::HashSet;

use crate::config::RetrievalConfig;
use crate::models::{KnowledgeEntry, ScoredEntry};

/// Canonicalizes free text into lowercase ASCII alphanumeric tokens joined by
/// single spaces. Total: `None` and `""` both yield `""`.
///
/// ```
/// use golf_coach::search::normalize;
/// assert_eq!(normalize("  Grip-Pressure: 5/10! "), "grip pressure 5 10");
/// assert_eq!(normalize(None), "");
/// ```
pub fn normalize<'a>(text: impl Into<Option<&'a str>>) -> String {
    let Some(text) = text.into() else {
        return String::new();
    };

    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Distinct qualifying tokens of a question, normalized once per request.
#[derive(Debug, Clone, Default)]
pub struct QueryTokens {
    tokens: HashSet<String>,
}

impl QueryTokens {
    pub fn new(question: &str, min_token_len: usize) -> Self {
        let normalized = normalize(question);
        let tokens = normalized
            .split(' ')
            .filter(|t| t.len() >= min_token_len)
            .map(str::to_string)
            .collect();
        Self { tokens }
    }

    /// Number of tokens contained anywhere in `haystack`.
    pub fn count_matches(&self, haystack: &str) -> u32 {
        self.tokens
            .iter()
            .filter(|t| haystack.contains(t.as_str()))
            .count() as u32
    }
}

/// Normalized text an entry is matched against: title, tags, then content.
pub fn haystack(entry: &KnowledgeEntry) -> String {
    normalize(
        format!(
            "{} {} {}",
            entry.title,
            entry.tags.join(" "),
            entry.content
        )
        .as_str(),
    )
}

/// Relevance of `entry` to `question`: the number of distinct query tokens
/// found in the entry's haystack.
pub fn score_entry(question: &str, entry: &KnowledgeEntry, min_token_len: usize) -> u32 {
    QueryTokens::new(question, min_token_len).count_matches(&haystack(entry))
}

/// Ranks the library against a question.
///
/// Equal scores keep their library order. The cap is applied before the
/// zero-score filter, so the result holds between 0 and `max_results`
/// entries, all with a positive score.
pub fn rank_entries<'a>(
    question: &str,
    entries: &'a [KnowledgeEntry],
    retrieval: &RetrievalConfig,
) -> Vec<ScoredEntry<'a>> {
    let query = QueryTokens::new(question, retrieval.min_token_len);

    let mut scored: Vec<ScoredEntry<'a>> = entries
        .iter()
        .map(|entry| ScoredEntry {
            entry,
            score: query.count_matches(&haystack(entry)),
        })
        .collect();

    // `sort_by` is stable, which is what keeps ties in library order.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(retrieval.max_results);
    scored.retain(|s| s.score > 0);
    scored
}
