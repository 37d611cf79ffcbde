//! Free-text search over a metadata snapshot.
//!
//! Query syntax: whitespace separated terms, all of which must hold. `term` requires the
//! relative path to contain `term`; `-term` requires it not to. Matching is a case-insensitive
//! substring test against the whole path. Results keep snapshot order and are capped.

use crate::index::{IndexEntry, MetadataSnapshot};

/// Upper bound on results returned by `search`.
pub const MAX_RESULTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    /// Lowercased needle.
    pub needle: String,
    pub negated: bool,
}

/// A parsed conjunction of terms. An empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    terms: Vec<Term>,
}

impl Query {
    pub fn parse(text: &str) -> Self {
        let terms = text
            .split_whitespace()
            .filter_map(|raw| {
                let (negated, body) = match raw.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, raw),
                };
                if body.is_empty() { return None; }
                Some(Term { needle: body.to_lowercase(), negated })
            })
            .collect();
        Self { terms }
    }

    pub fn terms(&self) -> &[Term] { &self.terms }

    pub fn matches(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        self.terms.iter().all(|t| lower.contains(&t.needle) != t.negated)
    }
}

/// Evaluate `query` against `snapshot`, returning at most `MAX_RESULTS` entries.
pub fn search(query: &str, snapshot: &MetadataSnapshot) -> Vec<IndexEntry> {
    search_with_limit(query, snapshot, MAX_RESULTS)
}

pub fn search_with_limit(query: &str, snapshot: &MetadataSnapshot, limit: usize) -> Vec<IndexEntry> {
    let q = Query::parse(query);
    snapshot
        .iter()
        .filter(|e| q.matches(&e.path))
        .take(limit)
        .cloned()
        .collect()
}
