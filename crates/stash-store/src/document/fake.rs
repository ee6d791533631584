//! In-process document table that pages like the real service: a page holds at
//! most `page_size` scanned documents, the filter runs after the page is cut,
//! and a resume key is returned while documents remain.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;

use super::client::{Document, ScanPage, ScanRequest, ServiceError, TableClient};

fn text(document: &Document, name: &str) -> String {
    match document.get(name) {
        Some(AttributeValue::S(value)) => value.clone(),
        _ => String::new(),
    }
}

fn key_tuple(document: &Document) -> (String, String) {
    (text(document, "id"), text(document, "type"))
}

#[derive(Default)]
struct State {
    documents: BTreeMap<(String, String), Document>,
    scans: Vec<ScanRequest>,
    fail_at: Option<(usize, ServiceError)>,
    dropped: bool,
}

pub(crate) struct FakeTable {
    page_size: usize,
    state: Mutex<State>,
}

impl FakeTable {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            page_size,
            state: Mutex::new(State::default()),
        }
    }

    pub(crate) fn document(&self, id: &str, record_type: &str) -> Option<Document> {
        let state = self.state.lock().unwrap();
        state
            .documents
            .get(&(id.to_owned(), record_type.to_owned()))
            .cloned()
    }

    pub(crate) fn insert_raw(&self, document: Document) {
        let mut state = self.state.lock().unwrap();
        state.documents.insert(key_tuple(&document), document);
    }

    pub(crate) fn scan_requests(&self) -> Vec<ScanRequest> {
        self.state.lock().unwrap().scans.clone()
    }

    /// Make the `page`-th scan call from now (1-based) fail with `err`.
    pub(crate) fn fail_scan_on_page(&self, page: usize, err: ServiceError) {
        let mut state = self.state.lock().unwrap();
        let target = state.scans.len() + page;
        state.fail_at = Some((target, err));
    }

    /// Every call afterwards fails as if the table did not exist.
    pub(crate) fn drop_table(&self) {
        self.state.lock().unwrap().dropped = true;
    }

    fn check_table(state: &State) -> Result<(), ServiceError> {
        if state.dropped {
            return Err(ServiceError::new(
                "ResourceNotFoundException",
                "Requested resource not found",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TableClient for FakeTable {
    async fn put_item(&self, _table: &str, item: Document) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        Self::check_table(&state)?;
        state.documents.insert(key_tuple(&item), item);
        Ok(())
    }

    async fn get_item(&self, _table: &str, key: Document) -> Result<Option<Document>, ServiceError> {
        let state = self.state.lock().unwrap();
        Self::check_table(&state)?;
        Ok(state.documents.get(&key_tuple(&key)).cloned())
    }

    async fn delete_item(&self, _table: &str, key: Document) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        Self::check_table(&state)?;
        state.documents.remove(&key_tuple(&key));
        Ok(())
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanPage, ServiceError> {
        let mut state = self.state.lock().unwrap();
        Self::check_table(&state)?;
        state.scans.push(request.clone());

        if let Some((target, err)) = &state.fail_at {
            if *target == state.scans.len() {
                return Err(err.clone());
            }
        }

        let filter_attribute = request
            .expression_attribute_names
            .get("#type")
            .cloned()
            .unwrap_or_default();
        let wanted = request.expression_attribute_values.get(":type").cloned();
        let projected: Vec<String> = request
            .projection_expression
            .split(',')
            .filter_map(|name| request.expression_attribute_names.get(name.trim()).cloned())
            .collect();

        let start = request.exclusive_start_key.as_ref().map(key_tuple);
        let scanned: Vec<(&(String, String), &Document)> = state
            .documents
            .iter()
            .filter(|(key, _)| start.as_ref().map_or(true, |s| *key > s))
            .take(self.page_size)
            .collect();

        let more = match scanned.last() {
            Some((last, _)) => state.documents.keys().any(|key| key > *last),
            None => false,
        };
        let last_evaluated_key = if more {
            scanned.last().map(|(_, document)| {
                HashMap::from([
                    ("id".to_owned(), document["id"].clone()),
                    ("type".to_owned(), document["type"].clone()),
                ])
            })
        } else {
            None
        };

        let items: Vec<Document> = scanned
            .into_iter()
            .filter(|(_, document)| document.get(&filter_attribute) == wanted.as_ref())
            .map(|(_, document)| {
                document
                    .iter()
                    .filter(|(name, _)| projected.contains(*name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .collect();

        Ok(ScanPage {
            count: items.len() as u64,
            items,
            last_evaluated_key,
        })
    }
}
