//! Cloud document-table backend.
//!
//! Each record is one document `{id, type, payload}` whose table key is the
//! `(id, type)` pair. Listing is a server-side filtered scan, followed page by
//! page until the service stops returning a resume key.

pub mod client;

#[cfg(test)]
pub(crate) mod fake;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::traits::{Item, Mapper, Readable, Storage, Writable};

pub use client::{Document, DynamoClient, ScanPage, ScanRequest, ServiceError, TableClient};

/// Attribute holding the record id (table partition key).
pub const ID_ATTRIBUTE: &str = "id";
/// Attribute holding the record type (table sort key).
pub const TYPE_ATTRIBUTE: &str = "type";
/// Attribute holding the opaque payload.
pub const PAYLOAD_ATTRIBUTE: &str = "payload";

/// Translate a service error. Codes naming a missing resource become
/// [`StoreError::NotFound`]; the service message is kept as-is.
pub fn translate(err: ServiceError) -> StoreError {
    let missing = err.code.as_deref().is_some_and(|code| {
        let code: String = code
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        code.contains("notfound") || code.starts_with("nosuch")
    });

    if missing {
        StoreError::NotFound(err.message)
    } else {
        StoreError::Internal(err.message)
    }
}

fn key_of(id: &str, record_type: &str) -> Document {
    HashMap::from([
        (ID_ATTRIBUTE.to_owned(), AttributeValue::S(id.to_owned())),
        (TYPE_ATTRIBUTE.to_owned(), AttributeValue::S(record_type.to_owned())),
    ])
}

fn payload_of(document: &Document) -> StoreResult<Vec<u8>> {
    match document.get(PAYLOAD_ATTRIBUTE) {
        Some(AttributeValue::B(blob)) => Ok(blob.as_ref().to_vec()),
        Some(other) => Err(StoreError::Internal(format!(
            "attribute `{PAYLOAD_ATTRIBUTE}` is not binary: {other:?}"
        ))),
        None => Err(StoreError::Internal(format!(
            "document has no `{PAYLOAD_ATTRIBUTE}` attribute"
        ))),
    }
}

fn id_of(document: &Document) -> StoreResult<String> {
    match document.get(ID_ATTRIBUTE) {
        Some(AttributeValue::S(id)) => Ok(id.clone()),
        _ => Err(StoreError::Internal(format!(
            "document has no string `{ID_ATTRIBUTE}` attribute"
        ))),
    }
}

/// Record storage over a remote document table.
pub struct DocumentStore {
    client: Arc<dyn TableClient>,
    table: String,
}

impl DocumentStore {
    /// Wrap an existing transport. Fails if `table` is empty.
    pub fn new(client: Arc<dyn TableClient>, table: impl Into<String>) -> StoreResult<Self> {
        let table = table.into();
        if table.is_empty() {
            return Err(StoreError::internal("document table name empty"));
        }
        Ok(Self { client, table })
    }

    /// Connect to DynamoDB in `region` using the ambient AWS credentials.
    ///
    /// The table name is checked before any network setup.
    pub async fn connect(region: &str, table: &str) -> StoreResult<Self> {
        if table.is_empty() {
            return Err(StoreError::internal("document table name empty"));
        }
        let client = DynamoClient::from_region(region).await;
        info!(region, table, "document store connected");
        Self::new(Arc::new(client), table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn scan_request(&self, record_type: &str) -> ScanRequest {
        ScanRequest {
            table_name: self.table.clone(),
            filter_expression: "#type = :type".to_owned(),
            projection_expression: "#id, #payload".to_owned(),
            expression_attribute_names: HashMap::from([
                ("#id".to_owned(), ID_ATTRIBUTE.to_owned()),
                ("#type".to_owned(), TYPE_ATTRIBUTE.to_owned()),
                ("#payload".to_owned(), PAYLOAD_ATTRIBUTE.to_owned()),
            ]),
            expression_attribute_values: HashMap::from([(
                ":type".to_owned(),
                AttributeValue::S(record_type.to_owned()),
            )]),
            exclusive_start_key: None,
        }
    }
}

#[async_trait]
impl Storage for DocumentStore {
    async fn write(&self, item: &dyn Writable) -> StoreResult<()> {
        let mut document = key_of(item.id(), item.record_type());
        document.insert(
            PAYLOAD_ATTRIBUTE.to_owned(),
            AttributeValue::B(Blob::new(item.payload().into_owned())),
        );

        self.client
            .put_item(&self.table, document)
            .await
            .map_err(translate)?;
        debug!(id = item.id(), record_type = item.record_type(), "document write");
        Ok(())
    }

    async fn read(&self, item: &mut dyn Readable) -> StoreResult<()> {
        let document = self
            .client
            .get_item(&self.table, key_of(item.id(), item.record_type()))
            .await
            .map_err(translate)?
            .ok_or_else(|| {
                StoreError::NotFound(format!("{} ({})", item.id(), item.record_type()))
            })?;

        item.set_payload(payload_of(&document)?);
        Ok(())
    }

    async fn delete(&self, item: &dyn Item) -> StoreResult<()> {
        self.client
            .delete_item(&self.table, key_of(item.id(), item.record_type()))
            .await
            .map_err(translate)?;
        debug!(id = item.id(), record_type = item.record_type(), "document delete");
        Ok(())
    }

    /// Appends made for earlier pages are not rolled back if a later page
    /// fails; the mapper is then left without a count.
    async fn list(&self, mapper: &mut dyn Mapper) -> StoreResult<()> {
        let record_type = mapper.record_type().to_owned();
        let mut request = self.scan_request(&record_type);
        let mut count = 0u64;
        let mut pages = 0usize;

        loop {
            let page = self.client.scan(request.clone()).await.map_err(translate)?;
            pages += 1;

            for document in &page.items {
                let id = id_of(document)?;
                let payload = payload_of(document)?;
                mapper.append(&id, &record_type, payload);
            }
            count += page.count;

            match page.last_evaluated_key {
                Some(resume) if !resume.is_empty() => request.exclusive_start_key = Some(resume),
                _ => break,
            }
        }

        mapper.set_count(count);
        debug!(record_type = %record_type, count, pages, "document list");
        Ok(())
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("table", &self.table)
            .finish()
    }
}
