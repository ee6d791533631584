//! Transport for the document-table backend.
//!
//! [`TableClient`] is the narrow slice of the DynamoDB API the backend needs.
//! [`DynamoClient`] implements it over `aws-sdk-dynamodb`; tests substitute an
//! in-process table.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

/// One document: attribute name to value.
pub type Document = HashMap<String, AttributeValue>;

/// A single scan page request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanRequest {
    pub table_name: String,
    pub filter_expression: String,
    pub projection_expression: String,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: Document,
    /// Resume point returned by the previous page.
    pub exclusive_start_key: Option<Document>,
}

/// One page of scan results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Document>,
    /// Number of items the service reports as matching in this page.
    pub count: u64,
    /// Present when more pages follow.
    pub last_evaluated_key: Option<Document>,
}

/// Error reported by the table service, reduced to its code and message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", .code.as_deref().unwrap_or("unknown"))]
pub struct ServiceError {
    pub code: Option<String>,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// Minimal document-table API.
#[async_trait]
pub trait TableClient: Send + Sync {
    async fn put_item(&self, table: &str, item: Document) -> Result<(), ServiceError>;

    async fn get_item(&self, table: &str, key: Document) -> Result<Option<Document>, ServiceError>;

    async fn delete_item(&self, table: &str, key: Document) -> Result<(), ServiceError>;

    async fn scan(&self, request: ScanRequest) -> Result<ScanPage, ServiceError>;
}

/// [`TableClient`] over the AWS SDK.
#[derive(Clone, Debug)]
pub struct DynamoClient {
    client: Client,
}

impl DynamoClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration, pinned to `region`.
    pub async fn from_region(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_owned()))
            .load()
            .await;
        Self::new(Client::new(&config))
    }
}

fn service_error<E, R>(err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = match err.message() {
        Some(message) => message.to_owned(),
        None => DisplayErrorContext(&err).to_string(),
    };
    ServiceError {
        code: err.code().map(str::to_owned),
        message,
    }
}

#[async_trait]
impl TableClient for DynamoClient {
    async fn put_item(&self, table: &str, item: Document) -> Result<(), ServiceError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn get_item(&self, table: &str, key: Document) -> Result<Option<Document>, ServiceError> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(service_error)?;
        Ok(output.item)
    }

    async fn delete_item(&self, table: &str, key: Document) -> Result<(), ServiceError> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanPage, ServiceError> {
        let output = self
            .client
            .scan()
            .table_name(request.table_name)
            .filter_expression(request.filter_expression)
            .projection_expression(request.projection_expression)
            .set_expression_attribute_names(Some(request.expression_attribute_names))
            .set_expression_attribute_values(Some(request.expression_attribute_values))
            .set_exclusive_start_key(request.exclusive_start_key)
            .send()
            .await
            .map_err(service_error)?;

        Ok(ScanPage {
            items: output.items.unwrap_or_default(),
            count: u64::try_from(output.count).unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
        })
    }
}
