use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::{debug, trace};
use crate::analysis::analyzer::TermSet;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::Record;
use crate::index::inverted::InvertedIndex;
use crate::index::pipeline::{AnalysisSettings, IndexPipeline};
use crate::schema::mapping::{Extraction, IndexMapping};
use crate::scoring::scorer::Scorer;
use crate::search::results::{Hit, SearchResults};

/// Summary entry as the index keeps it. The full record is never retained.
#[derive(Debug, Clone)]
pub(crate) struct StoredEntry<K, E> {
    pub key: K,
    pub entry: E,
    pub terms: Arc<TermSet>,
    pub rating_field: Option<Arc<str>>,
}

#[derive(Debug)]
pub(crate) struct IndexState<K, E> {
    pub slots: HashMap<K, u32>,
    pub entries: HashMap<u32, StoredEntry<K, E>>,
    pub inverted: InvertedIndex,
    pub next_slot: u32,
}

impl<K, E> Default for IndexState<K, E> {
    fn default() -> Self {
        IndexState {
            slots: HashMap::new(),
            entries: HashMap::new(),
            inverted: InvertedIndex::new(),
            next_slot: 0,
        }
    }
}

/// Key → summary entry store, searchable by text extracted from full records.
pub struct Index<K, E> {
    pub(crate) pipeline: RwLock<IndexPipeline>,
    pub(crate) state: RwLock<IndexState<K, E>>,
}

impl<K, E> Index<K, E>
where
    K: Eq + Hash + Clone + Debug,
    E: Record + Clone,
{
    pub fn new() -> Self {
        Index {
            pipeline: RwLock::new(IndexPipeline::default()),
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        Ok(Index {
            pipeline: RwLock::new(IndexPipeline::new(AnalysisSettings::from_config(config))?),
            state: RwLock::new(IndexState::default()),
        })
    }

    pub fn register_mapping(&self, record_type: impl Into<String>, mapping: IndexMapping) {
        self.pipeline.write().register_mapping(record_type, mapping);
    }

    pub fn register_supertype(&self, record_type: impl Into<String>, supertype: impl Into<String>) {
        self.pipeline.write().register_supertype(record_type, supertype);
    }

    pub fn set_scorer(&self, scorer: Arc<dyn Scorer>) {
        self.pipeline.write().set_scorer(scorer);
    }

    pub fn set_stop_words(&self, stop_words: Vec<String>) -> Result<()> {
        self.reconfigure(|settings| settings.stop_words = stop_words)
    }

    pub fn set_synonyms(&self, synonyms: HashMap<String, Vec<String>>) -> Result<()> {
        self.reconfigure(|settings| settings.synonyms = synonyms)
    }

    fn reconfigure(&self, change: impl FnOnce(&mut AnalysisSettings)) -> Result<()> {
        let mut pipeline = self.pipeline.write();
        if !self.state.read().entries.is_empty() {
            return Err(Error::invalid_state(
                "Analysis settings can only change before records are indexed",
            ));
        }
        let mut settings = pipeline.settings().clone();
        change(&mut settings);
        pipeline.reconfigure(settings)
    }

    /// Index `record` under `key` and keep `entry` as its summary. Re-adding an
    /// existing key replaces it.
    pub fn add(&self, key: K, record: &dyn Record, entry: E) -> Result<()> {
        let extraction = self.pipeline.read().extract(record)?;
        Self::store(&mut self.state.write(), key, extraction, entry);
        Ok(())
    }

    fn store(state: &mut IndexState<K, E>, key: K, extraction: Extraction, entry: E) {
        let slot = match state.slots.get(&key).copied() {
            Some(slot) => {
                let old_terms = state.entries.get(&slot).map(|e| e.terms.clone());
                if let Some(old_terms) = old_terms {
                    state.inverted.remove(slot, &old_terms);
                }
                slot
            }
            None => {
                let slot = state.next_slot;
                state.next_slot += 1;
                state.slots.insert(key.clone(), slot);
                slot
            }
        };

        trace!(?key, terms = extraction.terms.len(), "indexing record");
        state.inverted.insert(slot, &extraction.terms);
        state.entries.insert(slot, StoredEntry {
            key,
            entry,
            terms: Arc::new(extraction.terms),
            rating_field: extraction.rating_field.map(Arc::from),
        });
    }

    /// Re-extract and re-index an existing key.
    pub fn update(&self, key: K, record: &dyn Record, entry: E) -> Result<()> {
        let extraction = self.pipeline.read().extract(record)?;
        let mut state = self.state.write();
        if !state.slots.contains_key(&key) {
            return Err(Error::unknown_key(&key));
        }
        Self::store(&mut state, key, extraction, entry);
        Ok(())
    }

    /// Replace only the summary entry; indexed text is untouched.
    pub fn update_entry(&self, key: &K, entry: E) -> Result<()> {
        let mut state = self.state.write();
        let slot = *state.slots.get(key).ok_or_else(|| Error::unknown_key(key))?;
        match state.entries.get_mut(&slot) {
            Some(stored) => {
                stored.entry = entry;
                Ok(())
            }
            None => Err(Error::unknown_key(key)),
        }
    }

    pub fn remove(&self, key: &K) -> Result<E> {
        let mut state = self.state.write();
        let slot = state.slots.remove(key).ok_or_else(|| Error::unknown_key(key))?;
        let stored = state.entries.remove(&slot).ok_or_else(|| Error::unknown_key(key))?;
        state.inverted.remove(slot, &stored.terms);
        Ok(stored.entry)
    }

    pub fn get(&self, key: &K) -> Option<E> {
        let state = self.state.read();
        let slot = state.slots.get(key)?;
        state.entries.get(slot).map(|stored| stored.entry.clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.state.read().slots.contains_key(key)
    }

    pub fn search(&self, query: &str) -> SearchResults<K, E> {
        let pipeline = self.pipeline.read();
        let groups = pipeline.query(query);
        if groups.is_empty() {
            return SearchResults::from_hits(Vec::new());
        }

        let state = self.state.read();
        let mut hits = Vec::new();
        for slot in state.inverted.candidates(&groups) {
            let Some(stored) = state.entries.get(&slot) else {
                continue;
            };
            if let Some(score) =
                pipeline.score(&groups, &stored.terms, &stored.entry, stored.rating_field.as_deref())
            {
                hits.push(Hit::new(stored.key.clone(), stored.entry.clone(), score, slot as u64));
            }
        }
        SearchResults::from_hits(hits)
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        *state = IndexState::default();
        debug!("index cleared");
    }

    /// Compact postings emptied by removals.
    pub fn cleanup(&self) {
        let dropped = self.state.write().inverted.compact();
        debug!(dropped, "index cleanup");
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, E> Default for Index<K, E>
where
    K: Eq + Hash + Clone + Debug,
    E: Record + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
