use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::analysis::analyzer::TermSet;

/// Term → slots holding the term. Slots are the index's internal handles for keys.
#[derive(Debug, Default, Clone)]
pub struct InvertedIndex {
    pub postings: HashMap<String, RoaringBitmap>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: u32, terms: &TermSet) {
        for term in terms {
            self.postings
                .entry(term.clone())
                .or_insert_with(RoaringBitmap::new)
                .insert(slot);
        }
    }

    pub fn remove(&mut self, slot: u32, terms: &TermSet) {
        for term in terms {
            if let Some(posting) = self.postings.get_mut(term) {
                posting.remove(slot);
            }
        }
    }

    /// Slots holding at least one term of any query group.
    pub fn candidates(&self, query: &[TermSet]) -> RoaringBitmap {
        let mut candidates = RoaringBitmap::new();
        for term in query.iter().flatten() {
            if let Some(posting) = self.postings.get(term) {
                candidates |= posting;
            }
        }
        candidates
    }

    /// Drop postings emptied by removals.
    pub fn compact(&mut self) -> usize {
        let before = self.postings.len();
        self.postings.retain(|_, posting| !posting.is_empty());
        self.postings.shrink_to_fit();
        before - self.postings.len()
    }

    pub fn clear(&mut self) {
        self.postings.clear();
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> TermSet {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn candidates_union_all_query_terms() {
        let mut index = InvertedIndex::new();
        index.insert(1, &set(&["red", "car"]));
        index.insert(2, &set(&["blue", "car"]));
        index.insert(3, &set(&["green"]));

        let hits = index.candidates(&[set(&["red"]), set(&["blue"])]);
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn compact_drops_empty_postings() {
        let mut index = InvertedIndex::new();
        index.insert(1, &set(&["red", "car"]));
        index.insert(2, &set(&["car"]));
        index.remove(1, &set(&["red", "car"]));

        assert_eq!(index.compact(), 1);
        assert_eq!(index.term_count(), 1);
        assert!(index.candidates(&[set(&["red"])]).is_empty());
    }
}
