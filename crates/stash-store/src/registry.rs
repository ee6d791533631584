use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::StoreResult;
use crate::traits::{Item, Mapper, Readable, Storage, Writable};

/// Swappable handle to the active backend.
///
/// Every delegated call holds a read lock until the backend returns, so calls
/// run concurrently with each other. [`register`](Registry::register) takes
/// the write lock: it waits for in-flight calls to finish and no new call
/// starts until the swap is done.
pub struct Registry {
    active: RwLock<Arc<dyn Storage>>,
}

impl Registry {
    pub fn new(backend: Arc<dyn Storage>) -> Self {
        Self {
            active: RwLock::new(backend),
        }
    }

    /// Replace the active backend and return the previous one.
    pub async fn register(&self, backend: Arc<dyn Storage>) -> Arc<dyn Storage> {
        let mut active = self.active.write().await;
        let previous = std::mem::replace(&mut *active, backend);
        info!("storage backend registered");
        previous
    }

    /// The backend new calls are routed to.
    pub async fn current(&self) -> Arc<dyn Storage> {
        Arc::clone(&*self.active.read().await)
    }
}

#[async_trait]
impl Storage for Registry {
    async fn write(&self, item: &dyn Writable) -> StoreResult<()> {
        let active = self.active.read().await;
        active.write(item).await
    }

    async fn read(&self, item: &mut dyn Readable) -> StoreResult<()> {
        let active = self.active.read().await;
        active.read(item).await
    }

    async fn delete(&self, item: &dyn Item) -> StoreResult<()> {
        let active = self.active.read().await;
        active.delete(item).await
    }

    async fn list(&self, mapper: &mut dyn Mapper) -> StoreResult<()> {
        let active = self.active.read().await;
        active.list(mapper).await
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}
