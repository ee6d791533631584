//! Typed record storage over interchangeable backends.
//!
//! A record is an opaque payload addressed by a caller-assigned id inside a
//! named collection (its type). Every backend implements the same four
//! operations of the [`Storage`] trait, so callers can move between an
//! in-process map, an embedded file, a cloud document table and a cloud
//! object bucket without code changes.
//!
//! # Backends
//!
//! - [`MemoryStore`] -- `HashMap`-based store for tests and embedding
//! - [`EmbeddedStore`] -- single-file transactional store (redb)
//! - [`DocumentStore`] -- one document per record in a DynamoDB table
//! - [`BucketStore`] -- one object per record in an S3-compatible bucket
//!
//! [`Registry`] wraps any of them behind a handle that can be swapped at
//! runtime, and [`open`] builds one from a [`StoreConfig`].
//!
//! # Design Rules
//!
//! 1. Payloads are opaque bytes. Serialization belongs to the caller.
//! 2. Writes replace the whole payload; there is no merge.
//! 3. Deleting an absent record succeeds; reading one is [`StoreError::NotFound`].
//! 4. Native errors are translated at the backend boundary and never retried.
//! 5. A failed list never reports a count.

pub mod bucket;
pub mod config;
pub mod document;
pub mod embedded;
pub mod error;
pub mod key;
pub mod memory;
pub mod record;
pub mod registry;
pub mod traits;

#[cfg(test)]
mod conformance;

// Re-export primary types at crate root for ergonomic imports.
pub use bucket::{BucketConfig, BucketStore};
pub use config::{open, StoreConfig};
pub use document::DocumentStore;
pub use embedded::EmbeddedStore;
pub use error::{ErrorPayload, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use record::{next_id, Record, RecordList};
pub use registry::Registry;
pub use traits::{Item, Mapper, Readable, Storage, Writable};
