use std::cmp::Ordering;
use crate::analysis::analyzer::TermSet;

/// Relevance of one record for one query. Compared by match degree first,
/// then by rating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relevance {
    pub matched: u32,   // Query words (or their synonyms) found in the record
    pub rating: f64,
}

impl Eq for Relevance {}

impl PartialOrd for Relevance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Relevance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.matched
            .cmp(&other.matched)
            .then_with(|| self.rating.total_cmp(&other.rating))
    }
}

/// Scorer trait
pub trait Scorer: Send + Sync {
    /// `None` when the record does not match the query at all.
    fn score(&self, query: &[TermSet], terms: &TermSet, rating: f64) -> Option<Relevance>;

    fn name(&self) -> &str;
}

/// Counts how many query words hit the record's terms.
pub struct MatchDegreeScorer {
    pub require_all: bool,
}

impl Default for MatchDegreeScorer {
    fn default() -> Self {
        MatchDegreeScorer { require_all: false }
    }
}

impl Scorer for MatchDegreeScorer {
    fn score(&self, query: &[TermSet], terms: &TermSet, rating: f64) -> Option<Relevance> {
        let matched = query
            .iter()
            .filter(|group| group.iter().any(|term| terms.contains(term)))
            .count();

        if matched == 0 || (self.require_all && matched < query.len()) {
            return None;
        }

        Some(Relevance {
            matched: matched as u32,
            rating,
        })
    }

    fn name(&self) -> &str {
        "match_degree"
    }
}
