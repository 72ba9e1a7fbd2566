use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use parking_lot::{RwLock, RwLockReadGuard};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::analysis::analyzer::TermSet;
use crate::index::inverted::InvertedIndex;

/// Transaction ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub u64);

/// Isolation levels, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn allows_dirty_reads(self) -> bool {
        self <= IsolationLevel::ReadUncommitted
    }

    pub fn takes_write_locks(self) -> bool {
        self != IsolationLevel::None
    }
}

/// One committed (or pending) state of a key.
#[derive(Debug, Clone)]
pub struct VersionValue<E> {
    pub entry: E,
    pub terms: Arc<TermSet>,
    pub rating_field: Option<Arc<str>>,
}

impl<E> VersionValue<E> {
    /// Same indexed text and rating field, new summary entry.
    pub fn with_entry(&self, entry: E) -> Self {
        VersionValue {
            entry,
            terms: self.terms.clone(),
            rating_field: self.rating_field.clone(),
        }
    }
}

/// A write as it sits in a transaction's write set.
#[derive(Debug, Clone)]
pub enum PendingWrite<E> {
    Put(VersionValue<E>),
    Delete,
}

impl<E> PendingWrite<E> {
    pub fn value(&self) -> Option<&VersionValue<E>> {
        match self {
            PendingWrite::Put(value) => Some(value),
            PendingWrite::Delete => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Version<E> {
    pub commit_ts: u64,
    pub value: Option<VersionValue<E>>,   // None = tombstone
}

#[derive(Debug)]
pub(crate) struct VersionChain<K, E> {
    pub key: K,
    pub versions: Vec<Version<E>>,        // Ascending commit_ts
}

impl<K, E> VersionChain<K, E> {
    fn latest(&self) -> Option<&Version<E>> {
        self.versions.last()
    }

    fn at(&self, ts: u64) -> Option<&Version<E>> {
        self.versions.iter().rev().find(|v| v.commit_ts <= ts)
    }
}

#[derive(Debug)]
pub(crate) struct VersionState<K, E> {
    slots: HashMap<K, u32>,
    chains: HashMap<u32, VersionChain<K, E>>,
    // Superset over every retained version; readers re-check the visible one.
    inverted: InvertedIndex,
    commit_log: BTreeMap<u64, Vec<u32>>,
    next_slot: u32,
    clock: u64,
}

impl<K, E> Default for VersionState<K, E> {
    fn default() -> Self {
        VersionState {
            slots: HashMap::new(),
            chains: HashMap::new(),
            inverted: InvertedIndex::new(),
            commit_log: BTreeMap::new(),
            next_slot: 0,
            clock: 0,
        }
    }
}

/// Multi-Version Concurrency Control store behind the transactional index.
/// Every commit gets the next timestamp and appends one version per written key.
pub struct MVCCController<K, E> {
    state: RwLock<VersionState<K, E>>,
}

/// Consistent read access to the committed versions.
pub struct StoreReader<'a, K, E> {
    state: RwLockReadGuard<'a, VersionState<K, E>>,
}

impl<K, E> MVCCController<K, E>
where
    K: Eq + Hash + Clone,
    E: Clone,
{
    pub fn new() -> Self {
        MVCCController {
            state: RwLock::new(VersionState::default()),
        }
    }

    pub fn read(&self) -> StoreReader<'_, K, E> {
        StoreReader {
            state: self.state.read(),
        }
    }

    pub fn current_ts(&self) -> u64 {
        self.state.read().clock
    }

    /// Make a batch of writes visible at once under a fresh timestamp.
    pub fn apply(&self, writes: Vec<(K, PendingWrite<E>)>) -> u64 {
        let mut state = self.state.write();
        state.clock += 1;
        let commit_ts = state.clock;

        let mut touched = Vec::with_capacity(writes.len());
        for (key, write) in writes {
            let slot = match state.slots.get(&key).copied() {
                Some(slot) => slot,
                None => {
                    let slot = state.next_slot;
                    state.next_slot += 1;
                    state.slots.insert(key.clone(), slot);
                    state.chains.insert(slot, VersionChain { key, versions: Vec::new() });
                    slot
                }
            };

            let value = match write {
                PendingWrite::Put(value) => {
                    state.inverted.insert(slot, &value.terms);
                    Some(value)
                }
                PendingWrite::Delete => None,
            };
            if let Some(chain) = state.chains.get_mut(&slot) {
                chain.versions.push(Version { commit_ts, value });
            }
            touched.push(slot);
        }

        state.commit_log.insert(commit_ts, touched);
        commit_ts
    }

    /// Drop every version no reader at or after `oldest_visible_ts` can reach,
    /// then rebuild postings from what is left.
    pub fn prune(&self, oldest_visible_ts: u64) -> usize {
        let mut state = self.state.write();
        let mut dropped = 0;
        let mut dead_slots = Vec::new();

        for (slot, chain) in state.chains.iter_mut() {
            let keep_from = chain
                .versions
                .iter()
                .rposition(|v| v.commit_ts <= oldest_visible_ts)
                .unwrap_or(0);
            dropped += keep_from;
            chain.versions.drain(..keep_from);

            let only_tombstone = chain.versions.len() == 1
                && chain.versions[0].value.is_none()
                && chain.versions[0].commit_ts <= oldest_visible_ts;
            if chain.versions.is_empty() || only_tombstone {
                dead_slots.push(*slot);
            }
        }

        for slot in dead_slots {
            if let Some(chain) = state.chains.remove(&slot) {
                dropped += chain.versions.len();
                state.slots.remove(&chain.key);
            }
        }

        let mut inverted = InvertedIndex::new();
        for (slot, chain) in &state.chains {
            for value in chain.versions.iter().filter_map(|v| v.value.as_ref()) {
                inverted.insert(*slot, &value.terms);
            }
        }
        state.inverted = inverted;

        let retained = state.commit_log.split_off(&(oldest_visible_ts + 1));
        state.commit_log = retained;
        debug!(dropped, oldest_visible_ts, "pruned versions");
        dropped
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        let clock = state.clock;
        *state = VersionState::default();
        // Timestamps keep rising so running snapshots never see reused stamps.
        state.clock = clock + 1;
    }
}

impl<K, E> Default for MVCCController<K, E>
where
    K: Eq + Hash + Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K, E> StoreReader<'a, K, E>
where
    K: Eq + Hash + Clone,
    E: Clone,
{
    pub fn slot_of(&self, key: &K) -> Option<u32> {
        self.state.slots.get(key).copied()
    }

    pub fn key_of(&self, slot: u32) -> Option<&K> {
        self.state.chains.get(&slot).map(|chain| &chain.key)
    }

    /// Latest committed value of a key.
    pub fn latest(&self, key: &K) -> Option<&VersionValue<E>> {
        let slot = self.slot_of(key)?;
        self.latest_at_slot(slot)
    }

    pub fn latest_at_slot(&self, slot: u32) -> Option<&VersionValue<E>> {
        self.state.chains.get(&slot)?.latest()?.value.as_ref()
    }

    /// Value of a key as of timestamp `ts`.
    pub fn at(&self, key: &K, ts: u64) -> Option<&VersionValue<E>> {
        let slot = self.slot_of(key)?;
        self.at_slot(slot, ts)
    }

    pub fn at_slot(&self, slot: u32, ts: u64) -> Option<&VersionValue<E>> {
        self.state.chains.get(&slot)?.at(ts)?.value.as_ref()
    }

    /// Commit timestamp of the newest version of a key, 0 if never written.
    pub fn last_commit(&self, key: &K) -> u64 {
        self.slot_of(key)
            .and_then(|slot| self.state.chains.get(&slot))
            .and_then(|chain| chain.latest())
            .map(|v| v.commit_ts)
            .unwrap_or(0)
    }

    pub fn candidates(&self, query: &[TermSet]) -> RoaringBitmap {
        self.state.inverted.candidates(query)
    }

    /// Terms any version of `slot` carried at or after `since_ts`, including the
    /// version that was current at `since_ts`.
    pub fn terms_touched_since(&self, slot: u32, since_ts: u64) -> TermSet {
        let mut terms = TermSet::new();
        if let Some(chain) = self.state.chains.get(&slot) {
            for version in &chain.versions {
                let relevant = version.commit_ts > since_ts
                    || chain.at(since_ts).map(|v| v.commit_ts) == Some(version.commit_ts);
                if let (true, Some(value)) = (relevant, version.value.as_ref()) {
                    terms.extend(value.terms.iter().cloned());
                }
            }
        }
        terms
    }

    /// Slots written by commits after `ts`.
    pub fn slots_committed_after(&self, ts: u64) -> Vec<u32> {
        let mut slots: Vec<u32> = self
            .state
            .commit_log
            .range(ts + 1..)
            .flat_map(|(_, slots)| slots.iter().copied())
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    /// Number of keys whose latest version is live.
    pub fn live_count(&self) -> usize {
        self.state
            .chains
            .values()
            .filter(|chain| chain.latest().map_or(false, |v| v.value.is_some()))
            .count()
    }
}
