use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Addresses one record: a caller-assigned id inside a typed collection.
pub trait Item: Send + Sync {
    /// Globally unique, caller-assigned identifier.
    fn id(&self) -> &str;

    /// Name of the logical collection the record belongs to.
    fn record_type(&self) -> &str;
}

/// An [`Item`] that can be persisted.
pub trait Writable: Item {
    /// The opaque bytes to store. Serialization is the implementor's concern.
    fn payload(&self) -> Cow<'_, [u8]>;
}

/// An [`Item`] that can receive the bytes stored for it.
pub trait Readable: Item {
    /// Called exactly once by a successful read.
    fn set_payload(&mut self, payload: Vec<u8>);
}

/// Caller-owned sink for list results.
///
/// A successful list calls [`append`](Mapper::append) once per matching record,
/// in no particular order, then [`set_count`](Mapper::set_count) exactly once
/// with the number of appends. A failed list never calls `set_count`, but any
/// appends made before the failure remain.
pub trait Mapper: Send {
    /// The collection to list.
    fn record_type(&self) -> &str;

    fn append(&mut self, id: &str, record_type: &str, payload: Vec<u8>);

    fn set_count(&mut self, count: u64);
}

/// Record storage over a single physical namespace.
///
/// All implementations must satisfy these invariants:
/// - `write` upserts: a second write with the same id and type replaces the
///   payload in full.
/// - `read` of an absent record fails with
///   [`StoreError::NotFound`](crate::StoreError::NotFound).
/// - `delete` of an absent record succeeds.
/// - `list` visits every record in the namespace and reports only those whose
///   type equals the mapper's type.
/// - Native engine and transport errors are translated into
///   [`StoreError`](crate::StoreError) before they are returned; nothing is
///   retried.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn write(&self, item: &dyn Writable) -> StoreResult<()>;

    async fn read(&self, item: &mut dyn Readable) -> StoreResult<()>;

    async fn delete(&self, item: &dyn Item) -> StoreResult<()>;

    async fn list(&self, mapper: &mut dyn Mapper) -> StoreResult<()>;
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for Arc<S> {
    async fn write(&self, item: &dyn Writable) -> StoreResult<()> {
        (**self).write(item).await
    }

    async fn read(&self, item: &mut dyn Readable) -> StoreResult<()> {
        (**self).read(item).await
    }

    async fn delete(&self, item: &dyn Item) -> StoreResult<()> {
        (**self).delete(item).await
    }

    async fn list(&self, mapper: &mut dyn Mapper) -> StoreResult<()> {
        (**self).list(mapper).await
    }
}
