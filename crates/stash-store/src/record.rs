//! Ready-made carriers for the storage traits.
//!
//! Domain types usually implement [`Item`], [`Writable`] and [`Readable`]
//! themselves. [`Record`] and [`RecordList`] cover the cases where the caller
//! just wants bytes in and bytes out.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::traits::{Item, Mapper, Readable, Writable};

/// Generate a fresh, time-ordered record id.
pub fn next_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// One `(id, type, payload)` unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub record_type: String,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(id: impl Into<String>, record_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
            payload,
        }
    }

    /// A record with no payload, for reads and deletes.
    pub fn key(id: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self::new(id, record_type, Vec::new())
    }

    /// Build a record whose payload is the JSON encoding of `value`.
    pub fn json<T: Serialize>(
        id: impl Into<String>,
        record_type: impl Into<String>,
        value: &T,
    ) -> StoreResult<Self> {
        let payload =
            serde_json::to_vec(value).map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(Self::new(id, record_type, payload))
    }

    /// Decode the payload as JSON.
    pub fn decode_json<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_slice(&self.payload).map_err(|e| StoreError::Internal(e.to_string()))
    }
}

impl Item for Record {
    fn id(&self) -> &str {
        &self.id
    }

    fn record_type(&self) -> &str {
        &self.record_type
    }
}

impl Writable for Record {
    fn payload(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.payload)
    }
}

impl Readable for Record {
    fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }
}

/// A [`Mapper`] that collects every appended record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordList {
    record_type: String,
    records: Vec<Record>,
    count: Option<u64>,
}

impl RecordList {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            records: Vec::new(),
            count: None,
        }
    }

    /// The count reported by the last successful list, if any.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of the collected records, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.records.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Decode every collected payload as JSON.
    pub fn decode_json<T: DeserializeOwned>(&self) -> StoreResult<Vec<T>> {
        self.records.iter().map(Record::decode_json).collect()
    }
}

impl Mapper for RecordList {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn append(&mut self, id: &str, record_type: &str, payload: Vec<u8>) {
        self.records.push(Record::new(id, record_type, payload));
    }

    fn set_count(&mut self, count: u64) {
        self.count = Some(count);
    }
}
