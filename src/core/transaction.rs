use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use crate::analysis::analyzer::TermSet;
use crate::core::error::{Error, Result};
use crate::mvcc::controller::{IsolationLevel, PendingWrite, TxId, VersionValue};

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Value a RepeatableRead transaction first saw for a key, with the commit that
/// produced it (0 when the key had never been committed).
#[derive(Debug, Clone)]
pub struct Pinned<E> {
    pub commit_ts: u64,
    pub value: Option<VersionValue<E>>,
}

/// Per-transaction bookkeeping. Only the owning thread touches it.
pub struct Transaction<K, E> {
    pub id: TxId,
    pub isolation_level: IsolationLevel,
    pub state: TransactionState,
    pub start_ts: u64,                                   // Snapshot for Serializable reads
    pub started_at: DateTime<Utc>,
    pub write_set: HashMap<K, PendingWrite<E>>,
    pub locked: Vec<K>,                                  // Write locks held, in acquisition order
    pub repeatable: HashMap<K, Pinned<E>>,               // RepeatableRead: first value seen
    pub read_set: HashSet<K>,                            // Serializable: keys read
    pub searches: Vec<Vec<TermSet>>,                     // Serializable: predicates read
}

impl<K, E> Transaction<K, E>
where
    K: Eq + Hash + Clone,
    E: Clone,
{
    pub fn begin(id: TxId, isolation_level: IsolationLevel, start_ts: u64) -> Self {
        Transaction {
            id,
            isolation_level,
            state: TransactionState::Active,
            start_ts,
            started_at: Utc::now(),
            write_set: HashMap::new(),
            locked: Vec::new(),
            repeatable: HashMap::new(),
            read_set: HashSet::new(),
            searches: Vec::new(),
        }
    }

    pub fn check_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::invalid_state(format!(
                "Transaction {} is not active ({:?})",
                self.id.0, self.state
            )));
        }
        Ok(())
    }

    /// Record a write. Later writes to the same key replace earlier ones.
    pub fn write(&mut self, key: K, write: PendingWrite<E>) {
        self.write_set.insert(key, write);
    }

    /// Own uncommitted write for a key: `Some(None)` means deleted here.
    pub fn own_write(&self, key: &K) -> Option<Option<&VersionValue<E>>> {
        self.write_set.get(key).map(PendingWrite::value)
    }

    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty()
    }

    pub fn take_writes(&mut self) -> Vec<(K, PendingWrite<E>)> {
        self.write_set.drain().collect()
    }

    pub fn finish(&mut self, state: TransactionState) {
        self.state = state;
        self.write_set.clear();
        self.repeatable.clear();
        self.read_set.clear();
        self.searches.clear();
    }
}

/// Handle shared between the manager and the owning thread. The start stamp is
/// kept outside the mutex so pruning never waits on a busy transaction.
pub struct TransactionHandle<K, E> {
    pub id: TxId,
    pub start_ts: u64,
    pub inner: Mutex<Transaction<K, E>>,
}

/// Binds at most one active transaction to each thread.
pub struct TransactionManager<K, E> {
    next_id: AtomicU64,
    active: Mutex<HashMap<ThreadId, Arc<TransactionHandle<K, E>>>>,
}

impl<K, E> TransactionManager<K, E>
where
    K: Eq + Hash + Clone,
    E: Clone,
{
    pub fn new() -> Self {
        TransactionManager {
            next_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn next_id(&self) -> TxId {
        TxId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Bind a new transaction to the calling thread. The start stamp is read
    /// under the registry lock so a concurrent prune cannot miss it.
    pub fn begin(
        &self,
        isolation_level: IsolationLevel,
        start_ts: impl FnOnce() -> u64,
    ) -> Result<Arc<TransactionHandle<K, E>>> {
        let mut active = self.active.lock();
        let thread = thread::current().id();
        if active.contains_key(&thread) {
            return Err(Error::invalid_state("A transaction is already active on this thread"));
        }

        let start_ts = start_ts();
        let id = self.next_id();
        let handle = Arc::new(TransactionHandle {
            id,
            start_ts,
            inner: Mutex::new(Transaction::begin(id, isolation_level, start_ts)),
        });
        active.insert(thread, handle.clone());
        Ok(handle)
    }

    /// The calling thread's transaction, if any.
    pub fn current(&self) -> Option<Arc<TransactionHandle<K, E>>> {
        self.active.lock().get(&thread::current().id()).cloned()
    }

    /// Unbind and return the calling thread's transaction.
    pub fn release_current(&self) -> Result<Arc<TransactionHandle<K, E>>> {
        self.active
            .lock()
            .remove(&thread::current().id())
            .ok_or_else(|| Error::invalid_state("No transaction is active on this thread"))
    }

    /// Oldest snapshot any active transaction may still read from, or `now()`
    /// when none is active.
    pub fn oldest_start_or(&self, now: impl FnOnce() -> u64) -> u64 {
        let active = self.active.lock();
        active.values().map(|h| h.start_ts).min().unwrap_or_else(now)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

impl<K, E> Default for TransactionManager<K, E>
where
    K: Eq + Hash + Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
