use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};
use crate::analysis::analyzer::TermSet;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::transaction::{Pinned, Transaction, TransactionManager, TransactionState};
use crate::core::types::Record;
use crate::index::index::Index;
use crate::index::pipeline::{AnalysisSettings, IndexPipeline};
use crate::mvcc::controller::{IsolationLevel, MVCCController, PendingWrite, TxId, VersionValue};
use crate::mvcc::lock::LockManager;
use crate::schema::mapping::IndexMapping;
use crate::scoring::scorer::Scorer;
use crate::search::results::{Hit, SearchResults};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Index whose operations run inside transactions bound to the calling thread.
///
/// Visibility of other transactions' writes follows the configured isolation level:
///
/// | Level           | Dirty reads | Non-repeatable reads | Phantoms |
/// |-----------------|-------------|----------------------|----------|
/// | None / ReadUncommitted | yes  | yes                  | yes      |
/// | ReadCommitted   | no          | yes                  | yes      |
/// | RepeatableRead  | no          | no                   | yes      |
/// | Serializable    | no          | no                   | no       |
///
/// Readers never block. Writers take an exclusive lock per key until their
/// transaction ends; a wait longer than the lock timeout fails with
/// `ErrorKind::Deadlock`.
pub struct TransactionalIndex<K, E> {
    pipeline: RwLock<IndexPipeline>,
    store: MVCCController<K, E>,
    // Uncommitted writes, visible to ReadUncommitted readers only.
    pending: Mutex<HashMap<K, (TxId, PendingWrite<E>)>>,
    locks: LockManager<K>,
    transactions: TransactionManager<K, E>,
    commit_lock: Mutex<()>,
    mode: RwLock<IsolationLevel>,
}

impl<K, E> TransactionalIndex<K, E>
where
    K: Eq + Hash + Clone + Debug,
    E: Record + Clone,
{
    pub fn new() -> Self {
        Self::with_pipeline(IndexPipeline::default(), IsolationLevel::ReadCommitted, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        let pipeline = IndexPipeline::new(AnalysisSettings::from_config(config))?;
        Ok(Self::with_pipeline(pipeline, config.isolation_level, config.lock_timeout()))
    }

    fn with_pipeline(pipeline: IndexPipeline, mode: IsolationLevel, timeout: Duration) -> Self {
        TransactionalIndex {
            pipeline: RwLock::new(pipeline),
            store: MVCCController::new(),
            pending: Mutex::new(HashMap::new()),
            locks: LockManager::new(timeout),
            transactions: TransactionManager::new(),
            commit_lock: Mutex::new(()),
            mode: RwLock::new(mode),
        }
    }

    /// Wrap a plain index; its current contents become the first committed version.
    pub fn from_index(index: Index<K, E>) -> Self {
        let pipeline = index.pipeline.into_inner();
        let state = index.state.into_inner();

        let mut entries: Vec<_> = state.entries.into_iter().collect();
        entries.sort_by_key(|(slot, _)| *slot);
        let writes: Vec<_> = entries
            .into_iter()
            .map(|(_, stored)| {
                let value = VersionValue {
                    entry: stored.entry,
                    terms: stored.terms,
                    rating_field: stored.rating_field,
                };
                (stored.key, PendingWrite::Put(value))
            })
            .collect();

        let wrapped = Self::with_pipeline(pipeline, IsolationLevel::ReadCommitted, DEFAULT_LOCK_TIMEOUT);
        if !writes.is_empty() {
            wrapped.store.apply(writes);
        }
        wrapped
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
        if self.store.read().live_count() > 0 || !self.pending.lock().is_empty() {
            return Err(Error::invalid_state(
                "Analysis settings can only change before records are indexed",
            ));
        }
        let mut settings = pipeline.settings().clone();
        change(&mut settings);
        pipeline.reconfigure(settings)
    }

    /// Isolation level for transactions started from now on.
    pub fn set_transactional_mode(&self, level: IsolationLevel) {
        *self.mode.write() = level;
        debug!(?level, "transactional mode set");
    }

    pub fn transactional_mode(&self) -> IsolationLevel {
        *self.mode.read()
    }

    pub fn set_lock_timeout(&self, timeout: Duration) {
        self.locks.set_timeout(timeout);
    }

    // --- Transaction control ---------------------------------------------------------

    /// Start a transaction on the calling thread at the current mode.
    pub fn begin(&self) -> Result<TxId> {
        let level = self.transactional_mode();
        if level == IsolationLevel::None {
            return Err(Error::invalid_state(
                "Transactional mode is None: operations auto-commit and cannot be grouped",
            ));
        }
        let handle = self.transactions.begin(level, || self.store.current_ts())?;
        debug!(tx = handle.id.0, ?level, start_ts = handle.start_ts, "transaction started");
        Ok(handle.id)
    }

    /// Make the calling thread's writes visible atomically.
    pub fn commit(&self) -> Result<()> {
        let handle = self
            .transactions
            .current()
            .ok_or_else(|| Error::invalid_state("No transaction is active on this thread"))?;
        let result = {
            let mut tx = handle.inner.lock();
            tx.check_active().and_then(|_| self.finish_commit(&mut tx))
        };
        self.transactions.release_current()?;
        result
    }

    /// Discard the calling thread's writes. They are never applied.
    pub fn rollback(&self) -> Result<()> {
        let handle = self
            .transactions
            .current()
            .ok_or_else(|| Error::invalid_state("No transaction is active on this thread"))?;
        {
            let mut tx = handle.inner.lock();
            if tx.state == TransactionState::Active {
                self.abort(&mut tx);
            }
        }
        self.transactions.release_current()?;
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.transactions.current().is_some()
    }

    /// Run `op` in the thread's transaction, or in a single-operation transaction
    /// committed on the spot. Single operations read the latest committed state
    /// (a lone read-then-write under its key lock is already serializable).
    fn with_transaction<T>(&self, op: impl FnOnce(&Self, &mut Transaction<K, E>) -> Result<T>) -> Result<T> {
        if let Some(handle) = self.transactions.current() {
            let mut tx = handle.inner.lock();
            tx.check_active()?;
            return op(self, &mut tx);
        }

        let level = self.transactional_mode().min(IsolationLevel::ReadCommitted);
        let mut tx = Transaction::begin(self.transactions.next_id(), level, self.store.current_ts());
        match op(self, &mut tx) {
            Ok(value) => {
                self.finish_commit(&mut tx)?;
                Ok(value)
            }
            Err(err) => {
                self.abort(&mut tx);
                Err(err)
            }
        }
    }

    fn finish_commit(&self, tx: &mut Transaction<K, E>) -> Result<()> {
        let commit_guard = self.commit_lock.lock();

        if tx.isolation_level == IsolationLevel::Serializable && !tx.is_read_only() {
            if let Err(err) = self.validate(tx) {
                drop(commit_guard);
                warn!(tx = tx.id.0, "serializable validation failed, rolling back");
                self.abort(tx);
                return Err(err);
            }
        }

        let writes = tx.take_writes();
        let count = writes.len();
        let commit_ts = if writes.is_empty() {
            None
        } else {
            Some(self.store.apply(writes))
        };
        drop(commit_guard);

        self.unpublish(tx);
        self.locks.release_all(tx.id, &tx.locked);
        tx.locked.clear();
        tx.finish(TransactionState::Committed);
        debug!(tx = tx.id.0, writes = count, ?commit_ts, "transaction committed");
        Ok(())
    }

    fn abort(&self, tx: &mut Transaction<K, E>) {
        self.unpublish(tx);
        self.locks.release_all(tx.id, &tx.locked);
        tx.locked.clear();
        tx.finish(TransactionState::RolledBack);
        debug!(tx = tx.id.0, "transaction rolled back");
    }

    /// Serializable commit check: nothing this transaction read, wrote or searched
    /// for was changed by a commit after its snapshot.
    fn validate(&self, tx: &Transaction<K, E>) -> Result<()> {
        let reader = self.store.read();
        let conflict = |what: String| {
            Error::new(
                ErrorKind::SerializationFailure,
                format!("Transaction {} conflicts with a concurrent commit on {}", tx.id.0, what),
            )
        };

        for key in tx.read_set.iter().chain(tx.write_set.keys()) {
            if reader.last_commit(key) > tx.start_ts {
                return Err(conflict(format!("{:?}", key)));
            }
        }

        if !tx.searches.is_empty() {
            let searched: TermSet = tx.searches.iter().flatten().flatten().cloned().collect();
            for slot in reader.slots_committed_after(tx.start_ts) {
                let touched = reader.terms_touched_since(slot, tx.start_ts);
                if !touched.is_disjoint(&searched) {
                    let key = reader.key_of(slot).map(|k| format!("{:?}", k)).unwrap_or_default();
                    return Err(conflict(format!("search results ({})", key)));
                }
            }
        }
        Ok(())
    }

    // --- Reads -----------------------------------------------------------------------

    fn read_value(&self, tx: &mut Transaction<K, E>, key: &K) -> Option<VersionValue<E>> {
        if let Some(own) = tx.own_write(key) {
            return own.cloned();
        }

        match tx.isolation_level {
            IsolationLevel::None | IsolationLevel::ReadUncommitted => {
                if let Some((owner, write)) = self.pending.lock().get(key) {
                    if *owner != tx.id {
                        return write.value().cloned();
                    }
                }
                self.store.read().latest(key).cloned()
            }
            IsolationLevel::ReadCommitted => self.store.read().latest(key).cloned(),
            IsolationLevel::RepeatableRead => {
                if let Some(pinned) = tx.repeatable.get(key) {
                    return pinned.value.clone();
                }
                let reader = self.store.read();
                let value = reader.latest(key).cloned();
                let commit_ts = reader.last_commit(key);
                drop(reader);
                tx.repeatable.insert(key.clone(), Pinned { commit_ts, value: value.clone() });
                value
            }
            IsolationLevel::Serializable => {
                tx.read_set.insert(key.clone());
                self.store.read().at(key, tx.start_ts).cloned()
            }
        }
    }

    /// Current value a write builds on: own write, else the transaction's snapshot
    /// (Serializable), the pinned value (RepeatableRead) or the latest commit.
    /// Called with the key's write lock held.
    fn value_for_write(&self, tx: &mut Transaction<K, E>, key: &K) -> Result<Option<VersionValue<E>>> {
        if let Some(own) = tx.own_write(key) {
            return Ok(own.cloned());
        }
        match tx.isolation_level {
            IsolationLevel::Serializable => Ok(self.read_value(tx, key)),
            IsolationLevel::RepeatableRead => match tx.repeatable.get(key) {
                Some(pinned) if self.store.read().last_commit(key) > pinned.commit_ts => Err(Error::new(
                    ErrorKind::SerializationFailure,
                    format!("{:?} was committed by another transaction after this one read it", key),
                )),
                Some(pinned) => Ok(pinned.value.clone()),
                None => Ok(self.store.read().latest(key).cloned()),
            },
            _ => Ok(self.store.read().latest(key).cloned()),
        }
    }

    pub fn get(&self, key: &K) -> Result<Option<E>> {
        self.with_transaction(|index, tx| Ok(index.read_value(tx, key).map(|v| v.entry)))
    }

    pub fn search(&self, query: &str) -> Result<SearchResults<K, E>> {
        let pipeline = self.pipeline.read();
        let groups = pipeline.query(query);
        if groups.is_empty() {
            return Ok(SearchResults::from_hits(Vec::new()));
        }
        self.with_transaction(|index, tx| Ok(index.search_in(tx, &pipeline, groups)))
    }

    fn search_in(
        &self,
        tx: &mut Transaction<K, E>,
        pipeline: &IndexPipeline,
        groups: Vec<TermSet>,
    ) -> SearchResults<K, E> {
        let level = tx.isolation_level;

        // Keys whose visible value does not come from the committed store.
        let mut overrides: HashMap<K, Option<VersionValue<E>>> = HashMap::new();
        if level.allows_dirty_reads() {
            for (key, (owner, write)) in self.pending.lock().iter() {
                if *owner != tx.id {
                    overrides.insert(key.clone(), write.value().cloned());
                }
            }
        }
        if level == IsolationLevel::RepeatableRead {
            for (key, pinned) in &tx.repeatable {
                overrides.insert(key.clone(), pinned.value.clone());
            }
        }
        for (key, write) in &tx.write_set {
            overrides.insert(key.clone(), write.value().cloned());
        }

        let reader = self.store.read();
        let mut hits = Vec::new();
        let mut first_seen = Vec::new();

        for slot in reader.candidates(&groups) {
            let Some(key) = reader.key_of(slot) else {
                continue;
            };
            if overrides.contains_key(key) {
                continue;
            }
            let value = if level == IsolationLevel::Serializable {
                reader.at_slot(slot, tx.start_ts)
            } else {
                reader.latest_at_slot(slot)
            };
            let Some(value) = value else {
                continue;
            };
            if let Some(score) =
                pipeline.score(&groups, &value.terms, &value.entry, value.rating_field.as_deref())
            {
                hits.push(Hit::new(key.clone(), value.entry.clone(), score, slot as u64));
                if level == IsolationLevel::RepeatableRead {
                    first_seen.push((key.clone(), reader.last_commit(key), value.clone()));
                }
            }
        }

        for (key, value) in overrides {
            let Some(value) = value else {
                continue;
            };
            if let Some(score) =
                pipeline.score(&groups, &value.terms, &value.entry, value.rating_field.as_deref())
            {
                let sequence = reader.slot_of(&key).map(u64::from).unwrap_or(u64::MAX);
                hits.push(Hit::new(key, value.entry, score, sequence));
            }
        }
        drop(reader);

        match level {
            IsolationLevel::RepeatableRead => {
                for (key, commit_ts, value) in first_seen {
                    tx.repeatable.entry(key).or_insert(Pinned { commit_ts, value: Some(value) });
                }
            }
            IsolationLevel::Serializable => {
                for hit in &hits {
                    tx.read_set.insert(hit.key.clone());
                }
                tx.searches.push(groups);
            }
            _ => {}
        }

        trace!(tx = tx.id.0, hits = hits.len(), "search");
        SearchResults::from_hits(hits)
    }

    // --- Writes ----------------------------------------------------------------------

    fn lock_key(&self, tx: &mut Transaction<K, E>, key: &K) -> Result<()> {
        if !tx.isolation_level.takes_write_locks() {
            return Ok(());
        }
        if self.locks.acquire(key, tx.id)? {
            tx.locked.push(key.clone());
        }
        if tx.isolation_level == IsolationLevel::Serializable
            && self.store.read().last_commit(key) > tx.start_ts
        {
            return Err(Error::new(
                ErrorKind::SerializationFailure,
                format!("{:?} was committed by another transaction after this one started", key),
            ));
        }
        Ok(())
    }

    fn stage(&self, tx: &mut Transaction<K, E>, key: K, write: PendingWrite<E>) {
        trace!(tx = tx.id.0, ?key, delete = write.value().is_none(), "staged write");
        if tx.isolation_level != IsolationLevel::None {
            self.pending.lock().insert(key.clone(), (tx.id, write.clone()));
        }
        tx.write(key, write);
    }

    fn unpublish(&self, tx: &Transaction<K, E>) {
        let mut pending = self.pending.lock();
        for key in &tx.locked {
            if pending.get(key).map(|(owner, _)| *owner) == Some(tx.id) {
                pending.remove(key);
            }
        }
    }

    fn extract(&self, record: &dyn Record, entry: E) -> Result<VersionValue<E>> {
        let extraction = self.pipeline.read().extract(record)?;
        Ok(VersionValue {
            entry,
            terms: Arc::new(extraction.terms),
            rating_field: extraction.rating_field.map(Arc::from),
        })
    }

    /// Index `record` under `key`; re-adding an existing key replaces it.
    pub fn add(&self, key: K, record: &dyn Record, entry: E) -> Result<()> {
        let value = self.extract(record, entry)?;
        self.with_transaction(|index, tx| {
            index.lock_key(tx, &key)?;
            index.stage(tx, key, PendingWrite::Put(value));
            Ok(())
        })
    }

    pub fn update(&self, key: K, record: &dyn Record, entry: E) -> Result<()> {
        let value = self.extract(record, entry)?;
        self.with_transaction(|index, tx| {
            index.lock_key(tx, &key)?;
            if index.value_for_write(tx, &key)?.is_none() {
                return Err(Error::unknown_key(&key));
            }
            index.stage(tx, key, PendingWrite::Put(value));
            Ok(())
        })
    }

    /// Replace only the summary entry; indexed text is carried over.
    pub fn update_entry(&self, key: &K, entry: E) -> Result<()> {
        self.with_transaction(|index, tx| {
            index.lock_key(tx, key)?;
            let current = index
                .value_for_write(tx, key)?
                .ok_or_else(|| Error::unknown_key(key))?;
            index.stage(tx, key.clone(), PendingWrite::Put(current.with_entry(entry)));
            Ok(())
        })
    }

    pub fn remove(&self, key: &K) -> Result<()> {
        self.with_transaction(|index, tx| {
            index.lock_key(tx, key)?;
            if index.value_for_write(tx, key)?.is_none() {
                return Err(Error::unknown_key(key));
            }
            index.stage(tx, key.clone(), PendingWrite::Delete);
            Ok(())
        })
    }

    // --- Maintenance -----------------------------------------------------------------

    /// Empty the index. Refused while transactions are active.
    pub fn clear(&self) -> Result<()> {
        if self.transactions.active_count() > 0 {
            return Err(Error::invalid_state("Cannot clear while transactions are active"));
        }
        self.store.clear();
        debug!("transactional index cleared");
        Ok(())
    }

    /// Drop versions no active transaction can read any more.
    pub fn cleanup(&self) -> usize {
        let oldest = self.transactions.oldest_start_or(|| self.store.current_ts());
        self.store.prune(oldest)
    }

    /// Number of keys live in the latest committed state.
    pub fn len(&self) -> usize {
        self.store.read().live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, E> Default for TransactionalIndex<K, E>
where
    K: Eq + Hash + Clone + Debug,
    E: Record + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Document;

    fn index(level: IsolationLevel) -> TransactionalIndex<u32, Document> {
        let index = TransactionalIndex::new();
        index.register_mapping("Note", IndexMapping::new(["text"]).with_rating("rating"));
        index.set_transactional_mode(level);
        index
    }

    fn note(text: &str) -> Document {
        Document::new("Note").with_field("text", text)
    }

    fn summary(label: &str) -> Document {
        Document::new("Summary").with_field("label", label).with_field("rating", 1.0)
    }

    #[test]
    fn own_writes_are_visible_before_commit() {
        let index = index(IsolationLevel::Serializable);
        index.begin().unwrap();
        index.add(1, &note("draft"), summary("a")).unwrap();

        assert!(index.search("draft").unwrap().contains_key(&1));
        assert!(index.get(&1).unwrap().is_some());
        index.commit().unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn rollback_discards_writes() {
        let index = index(IsolationLevel::ReadCommitted);
        index.begin().unwrap();
        index.add(1, &note("draft"), summary("a")).unwrap();
        index.rollback().unwrap();

        assert!(index.search("draft").unwrap().is_empty());
        assert!(index.get(&1).unwrap().is_none());
        assert!(!index.in_transaction());
    }

    #[test]
    fn operations_outside_transactions_auto_commit() {
        let index = index(IsolationLevel::RepeatableRead);
        index.add(1, &note("hello"), summary("a")).unwrap();
        assert!(index.search("hello").unwrap().contains_key(&1));

        index.remove(&1).unwrap();
        assert!(index.search("hello").unwrap().is_empty());
        assert_eq!(index.remove(&1).unwrap_err().kind, ErrorKind::UnknownKey);
    }

    #[test]
    fn mode_none_forbids_explicit_transactions() {
        let index = index(IsolationLevel::None);
        assert_eq!(index.begin().unwrap_err().kind, ErrorKind::InvalidState);
        index.add(1, &note("direct"), summary("a")).unwrap();
        assert!(index.search("direct").unwrap().contains_key(&1));
    }

    #[test]
    fn commit_without_transaction_is_an_error() {
        let index = index(IsolationLevel::ReadCommitted);
        assert_eq!(index.commit().unwrap_err().kind, ErrorKind::InvalidState);
        assert_eq!(index.rollback().unwrap_err().kind, ErrorKind::InvalidState);
    }

    #[test]
    fn unknown_key_inside_transaction_keeps_it_usable() {
        let index = index(IsolationLevel::ReadCommitted);
        index.begin().unwrap();
        assert_eq!(index.update_entry(&5, summary("x")).unwrap_err().kind, ErrorKind::UnknownKey);
        index.add(5, &note("fine"), summary("x")).unwrap();
        index.commit().unwrap();
        assert!(index.get(&5).unwrap().is_some());
    }

    #[test]
    fn wrapping_a_plain_index_keeps_its_records() {
        let plain: Index<u32, Document> = Index::new();
        plain.register_mapping("Note", IndexMapping::new(["text"]));
        plain.add(1, &note("carried over"), summary("a")).unwrap();

        let index = TransactionalIndex::from_index(plain);
        assert!(index.search("carried").unwrap().contains_key(&1));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn cleanup_prunes_superseded_versions() {
        let index = index(IsolationLevel::ReadCommitted);
        index.add(1, &note("one"), summary("a")).unwrap();
        index.update(1, &note("two"), summary("b")).unwrap();
        index.update(1, &note("three"), summary("c")).unwrap();

        assert_eq!(index.cleanup(), 2);
        assert!(index.search("one").unwrap().is_empty());
        assert!(index.search("three").unwrap().contains_key(&1));
    }

    #[test]
    fn clear_is_refused_inside_a_transaction() {
        let index = index(IsolationLevel::ReadCommitted);
        index.add(1, &note("one"), summary("a")).unwrap();
        index.begin().unwrap();
        assert!(index.clear().is_err());
        index.rollback().unwrap();
        index.clear().unwrap();
        assert!(index.is_empty());
    }
}
