use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::key;
use crate::traits::{Item, Mapper, Readable, Storage, Writable};

/// A key's first-write registration in the listing log.
#[derive(Clone, Debug)]
struct Registration {
    record_type: String,
    key: String,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Vec<u8>>,
    /// First-write order of every live key. A key is present here exactly
    /// when it is present in `records`.
    registrations: Vec<Registration>,
}

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. One `RwLock` guards the records and the
/// registration log together: writers exclude everything, readers share.
///
/// Listing follows first-write order. Rewriting a record keeps its position;
/// deleting it drops the registration, so a later rewrite goes to the end.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    // Every critical section is a single map/log update, so a poisoned lock
    // still guards consistent data.
    fn shared(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.shared().records.len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.shared().records.is_empty()
    }

    /// Returns `true` if a record exists for `id` in `record_type`.
    pub fn contains(&self, id: &str, record_type: &str) -> bool {
        self.shared()
            .records
            .contains_key(&key::encode(id, record_type))
    }

    /// Remove all records.
    pub fn clear(&self) {
        let mut inner = self.exclusive();
        inner.records.clear();
        inner.registrations.clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn write(&self, item: &dyn Writable) -> StoreResult<()> {
        let key = key::encode(item.id(), item.record_type());
        let mut inner = self.exclusive();
        let previous = inner
            .records
            .insert(key.clone(), item.payload().into_owned());
        if previous.is_none() {
            inner.registrations.push(Registration {
                record_type: item.record_type().to_owned(),
                key,
            });
        }
        debug!(id = item.id(), record_type = item.record_type(), "memory write");
        Ok(())
    }

    async fn read(&self, item: &mut dyn Readable) -> StoreResult<()> {
        let key = key::encode(item.id(), item.record_type());
        let payload = self
            .shared()
            .records
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))?;
        item.set_payload(payload);
        Ok(())
    }

    async fn delete(&self, item: &dyn Item) -> StoreResult<()> {
        let key = key::encode(item.id(), item.record_type());
        let mut inner = self.exclusive();
        if inner.records.remove(&key).is_some() {
            inner.registrations.retain(|r| r.key != key);
            debug!(id = item.id(), record_type = item.record_type(), "memory delete");
        }
        Ok(())
    }

    async fn list(&self, mapper: &mut dyn Mapper) -> StoreResult<()> {
        // Snapshot under the lock; the mapper runs caller code and is fed
        // after the lock is released.
        let matches: Vec<(String, Vec<u8>)> = {
            let inner = self.shared();
            inner
                .registrations
                .iter()
                .filter(|r| r.record_type == mapper.record_type())
                .filter_map(|r| {
                    let payload = inner.records.get(&r.key)?;
                    let (id, _) = key::decode(&r.key);
                    Some((id, payload.clone()))
                })
                .collect()
        };

        let record_type = mapper.record_type().to_owned();
        for (id, payload) in &matches {
            mapper.append(id, &record_type, payload.clone());
        }
        mapper.set_count(matches.len() as u64);
        debug!(record_type = %record_type, count = matches.len(), "memory list");
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("MemoryStore")
            .field("record_count", &count)
            .finish()
    }
}
