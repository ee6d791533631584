use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::key;
use crate::traits::{Item, Mapper, Readable, Storage, Writable};

/// Bucket used when none is configured.
pub const DEFAULT_BUCKET: &str = "records";

type Bucket<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

fn bucket(name: &str) -> Bucket<'_> {
    TableDefinition::new(name)
}

fn engine<E: Into<redb::Error>>(err: E) -> StoreError {
    StoreError::Internal(err.into().to_string())
}

/// Single-file transactional store backed by redb.
///
/// All records share one bucket keyed by `id-|-type`. Every call runs in its
/// own transaction on the blocking thread pool: writes and deletes in a write
/// transaction (serialized by the engine), reads and lists in a read
/// transaction that sees one consistent snapshot.
pub struct EmbeddedStore {
    db: Arc<Database>,
    bucket: Arc<str>,
    path: PathBuf,
}

impl EmbeddedStore {
    /// Open (or create) the database file at `path` with the default bucket.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_bucket(path, DEFAULT_BUCKET)
    }

    /// Open (or create) the database file at `path`, creating `bucket_name`
    /// if it does not exist yet.
    pub fn open_with_bucket(path: impl AsRef<Path>, bucket_name: &str) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(engine)?;

        let txn = db.begin_write().map_err(engine)?;
        txn.open_table(bucket(bucket_name)).map_err(engine)?;
        txn.commit().map_err(engine)?;

        info!(path = %path.display(), bucket = bucket_name, "embedded store opened");
        Ok(Self {
            db: Arc::new(db),
            bucket: Arc::from(bucket_name),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    /// Run `op` against the database on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &str) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let bucket_name = Arc::clone(&self.bucket);
        tokio::task::spawn_blocking(move || op(&db, &bucket_name))
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?
    }
}

#[async_trait]
impl Storage for EmbeddedStore {
    async fn write(&self, item: &dyn Writable) -> StoreResult<()> {
        let key = key::encode(item.id(), item.record_type()).into_bytes();
        let payload = item.payload().into_owned();

        self.blocking(move |db, bucket_name| {
            let txn = db.begin_write().map_err(engine)?;
            {
                let mut table = txn.open_table(bucket(bucket_name)).map_err(engine)?;
                table
                    .insert(key.as_slice(), payload.as_slice())
                    .map_err(engine)?;
            }
            txn.commit().map_err(engine)
        })
        .await?;

        debug!(id = item.id(), record_type = item.record_type(), "embedded write");
        Ok(())
    }

    async fn read(&self, item: &mut dyn Readable) -> StoreResult<()> {
        let key = key::encode(item.id(), item.record_type());
        let lookup = key.clone().into_bytes();

        let value = self
            .blocking(move |db, bucket_name| {
                let txn = db.begin_read().map_err(engine)?;
                let table = txn.open_table(bucket(bucket_name)).map_err(engine)?;
                let value = table.get(lookup.as_slice()).map_err(engine)?;
                Ok(value.map(|guard| guard.value().to_vec()))
            })
            .await?;

        match value {
            Some(payload) => {
                item.set_payload(payload);
                Ok(())
            }
            None => Err(StoreError::not_found(key)),
        }
    }

    async fn delete(&self, item: &dyn Item) -> StoreResult<()> {
        let key = key::encode(item.id(), item.record_type()).into_bytes();

        self.blocking(move |db, bucket_name| {
            let txn = db.begin_write().map_err(engine)?;
            {
                let mut table = txn.open_table(bucket(bucket_name)).map_err(engine)?;
                table.remove(key.as_slice()).map_err(engine)?;
            }
            txn.commit().map_err(engine)
        })
        .await?;

        debug!(id = item.id(), record_type = item.record_type(), "embedded delete");
        Ok(())
    }

    async fn list(&self, mapper: &mut dyn Mapper) -> StoreResult<()> {
        let wanted = mapper.record_type().to_owned();
        let filter = wanted.clone();

        let matches = self
            .blocking(move |db, bucket_name| {
                let txn = db.begin_read().map_err(engine)?;
                let table = txn.open_table(bucket(bucket_name)).map_err(engine)?;
                let mut matches = Vec::new();
                for entry in table.iter().map_err(engine)? {
                    let (raw_key, payload) = entry.map_err(engine)?;
                    let (id, record_type) = key::decode(&String::from_utf8_lossy(raw_key.value()));
                    if record_type == filter {
                        matches.push((id, payload.value().to_vec()));
                    }
                }
                Ok(matches)
            })
            .await?;

        let count = matches.len() as u64;
        for (id, payload) in matches {
            mapper.append(&id, &wanted, payload);
        }
        mapper.set_count(count);
        debug!(record_type = %wanted, count, "embedded list");
        Ok(())
    }
}

impl std::fmt::Debug for EmbeddedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedStore")
            .field("path", &self.path)
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::conformance;
    use crate::record::{Record, RecordList};

    #[tokio::test(flavor = "multi_thread")]
    async fn conforms() {
        let dir = tempfile::tempdir().unwrap();
        let n = AtomicUsize::new(0);
        conformance::run_all(|| {
            let file = dir
                .path()
                .join(format!("db-{}.redb", n.fetch_add(1, Ordering::SeqCst)));
            Box::new(EmbeddedStore::open(file).unwrap())
        })
        .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_are_all_visible() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(EmbeddedStore::open(dir.path().join("c.redb")).unwrap());
        conformance::concurrent_writers(store).await;
    }

    #[tokio::test]
    async fn reopen_keeps_records_and_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("inventory.redb");

        {
            let store = EmbeddedStore::open(&file).unwrap();
            store
                .write(&Record::new("e1", "inventory.Entry", b"{}".to_vec()))
                .await
                .unwrap();
        }

        let store = EmbeddedStore::open(&file).unwrap();
        let mut read = Record::key("e1", "inventory.Entry");
        store.read(&mut read).await.unwrap();
        assert_eq!(read.payload, b"{}");
    }

    #[tokio::test]
    async fn list_uses_native_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedStore::open(dir.path().join("order.redb")).unwrap();
        for id in ["m", "c", "x", "a"] {
            store.write(&Record::new(id, "t", vec![])).await.unwrap();
        }

        let mut list = RecordList::new("t");
        store.list(&mut list).await.unwrap();
        let order: Vec<&str> = list.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "m", "x"]);
    }

    #[tokio::test]
    async fn empty_payload_is_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedStore::open(dir.path().join("empty.redb")).unwrap();
        store.write(&Record::new("e", "t", Vec::new())).await.unwrap();

        let mut read = Record::new("e", "t", vec![0xff]);
        store.read(&mut read).await.unwrap();
        assert!(read.payload.is_empty());
    }

    #[tokio::test]
    async fn foreign_keys_in_bucket_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            EmbeddedStore::open_with_bucket(dir.path().join("mixed.redb"), "shared").unwrap();
        assert_eq!(store.bucket_name(), "shared");

        {
            let txn = store.db.begin_write().unwrap();
            {
                let mut table = txn.open_table(bucket("shared")).unwrap();
                table.insert(b"no-separator".as_slice(), b"?".as_slice()).unwrap();
            }
            txn.commit().unwrap();
        }
        store.write(&Record::new("r1", "t", vec![1])).await.unwrap();

        let mut list = RecordList::new("t");
        store.list(&mut list).await.unwrap();
        assert_eq!(list.count(), Some(1));
        assert_eq!(list.ids(), vec!["r1"]);
    }

    #[test]
    fn open_fails_on_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = EmbeddedStore::open(dir.path()).unwrap_err();
        assert_eq!(err.code(), crate::error::CODE_INTERNAL);
    }
}
