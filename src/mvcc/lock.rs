use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use tracing::warn;
use crate::core::error::{Error, ErrorKind, Result};
use crate::mvcc::controller::TxId;

/// Exclusive per-key write locks, held until the owning transaction ends.
/// Waits are bounded so a deadlock surfaces as an error instead of a hang.
pub struct LockManager<K> {
    owners: Mutex<HashMap<K, TxId>>,
    released: Condvar,
    timeout: Mutex<Duration>,
}

impl<K> LockManager<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new(timeout: Duration) -> Self {
        LockManager {
            owners: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            timeout: Mutex::new(timeout),
        }
    }

    pub fn set_timeout(&self, timeout: Duration) {
        *self.timeout.lock() = timeout;
    }

    /// Returns true if the lock was newly taken, false if `tx` already held it.
    pub fn acquire(&self, key: &K, tx: TxId) -> Result<bool> {
        let deadline = Instant::now() + *self.timeout.lock();
        let mut owners = self.owners.lock();

        loop {
            let holder = owners.get(key).copied();
            match holder {
                None => {
                    owners.insert(key.clone(), tx);
                    return Ok(true);
                }
                Some(owner) if owner == tx => return Ok(false),
                Some(owner) => {
                    if self.released.wait_until(&mut owners, deadline).timed_out() {
                        warn!(?key, waiter = tx.0, holder = owner.0, "lock wait timed out");
                        return Err(Error::new(
                            ErrorKind::Deadlock,
                            format!(
                                "Transaction {} timed out waiting for {:?} held by transaction {}",
                                tx.0, key, owner.0
                            ),
                        ));
                    }
                }
            }
        }
    }

    pub fn release_all<'a, I>(&self, tx: TxId, keys: I)
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let mut owners = self.owners.lock();
        for key in keys {
            if owners.get(key) == Some(&tx) {
                owners.remove(key);
            }
        }
        drop(owners);
        self.released.notify_all();
    }

    pub fn holder(&self, key: &K) -> Option<TxId> {
        self.owners.lock().get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn reentrant_for_the_same_transaction() {
        let locks = LockManager::new(Duration::from_millis(50));
        assert!(locks.acquire(&"k", TxId(1)).unwrap());
        assert!(!locks.acquire(&"k", TxId(1)).unwrap());
        assert_eq!(locks.holder(&"k"), Some(TxId(1)));
    }

    #[test]
    fn conflicting_waiter_times_out() {
        let locks = LockManager::new(Duration::from_millis(20));
        locks.acquire(&"k", TxId(1)).unwrap();
        let err = locks.acquire(&"k", TxId(2)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Deadlock);
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let locks = Arc::new(LockManager::new(Duration::from_secs(5)));
        locks.acquire(&"k", TxId(1)).unwrap();

        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || locks.acquire(&"k", TxId(2)))
        };
        thread::sleep(Duration::from_millis(20));
        locks.release_all(TxId(1), [&"k"]);

        assert!(waiter.join().unwrap().unwrap());
        assert_eq!(locks.holder(&"k"), Some(TxId(2)));
    }
}
