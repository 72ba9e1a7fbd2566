use std::cmp::Ordering;
use crate::scoring::scorer::Relevance;

/// Search results, most relevant first.
#[derive(Debug, Clone)]
pub struct SearchResults<K, E> {
    pub hits: Vec<Hit<K, E>>,
}

/// One matching key with its summary entry and relevance.
#[derive(Debug, Clone)]
pub struct Hit<K, E> {
    pub key: K,
    pub entry: E,
    pub score: Relevance,
    pub(crate) sequence: u64,   // Insertion order, the last tie-break
}

impl<K, E> Hit<K, E> {
    pub fn new(key: K, entry: E, score: Relevance, sequence: u64) -> Self {
        Hit { key, entry, score, sequence }
    }

    fn rank(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl<K, E> SearchResults<K, E> {
    pub fn from_hits(mut hits: Vec<Hit<K, E>>) -> Self {
        hits.sort_by(Hit::rank);
        SearchResults { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.hits.iter().map(|hit| &hit.key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&K, &E)> {
        self.hits.iter().map(|hit| (&hit.key, &hit.entry))
    }

    pub fn contains_key(&self, key: &K) -> bool
    where
        K: PartialEq,
    {
        self.hits.iter().any(|hit| hit.key == *key)
    }

    pub fn first(&self) -> Option<&Hit<K, E>> {
        self.hits.first()
    }
}

impl<K, E> IntoIterator for SearchResults<K, E> {
    type Item = Hit<K, E>;
    type IntoIter = std::vec::IntoIter<Hit<K, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(key: &'static str, matched: u32, rating: f64, sequence: u64) -> Hit<&'static str, ()> {
        Hit::new(key, (), Relevance { matched, rating }, sequence)
    }

    #[test]
    fn hits_are_ordered_by_relevance_then_insertion() {
        let results = SearchResults::from_hits(vec![
            hit("late-tie", 1, 1.0, 9),
            hit("low", 1, 0.5, 1),
            hit("best", 2, 0.0, 5),
            hit("early-tie", 1, 1.0, 2),
        ]);

        let keys: Vec<_> = results.keys().copied().collect();
        assert_eq!(keys, vec!["best", "early-tie", "late-tie", "low"]);
    }
}
