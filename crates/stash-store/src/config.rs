use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bucket::{BucketConfig, BucketStore};
use crate::document::DocumentStore;
use crate::embedded::{EmbeddedStore, DEFAULT_BUCKET};
use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::traits::Storage;

/// Backend selection, as read from a TOML file:
///
/// ```toml
/// backend = "embedded"
/// path = "/var/lib/app/records.redb"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Memory,
    Embedded(EmbeddedConfig),
    Document(DocumentConfig),
    Object(ObjectConfig),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    pub path: PathBuf,
    pub bucket: String,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stash.redb"),
            bucket: DEFAULT_BUCKET.to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub region: String,
    pub table: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_owned(),
            table: String::new(),
        }
    }
}

/// Object-store settings. The key codec and content type use their defaults;
/// custom functions are set on [`BucketConfig`] in code.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    pub bucket: String,
    pub region: Option<String>,
    pub domain: String,
    /// RFC 3339, e.g. `"2030-01-01T00:00:00Z"`.
    pub expires: Option<DateTime<Utc>>,
}

impl From<&ObjectConfig> for BucketConfig {
    fn from(config: &ObjectConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            expires: config.expires,
            ..Default::default()
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(raw: &str) -> StoreResult<Self> {
        toml::from_str(raw).map_err(|e| StoreError::Internal(format!("invalid store config: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Name of the selected backend.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Embedded(_) => "embedded",
            Self::Document(_) => "document",
            Self::Object(_) => "object",
        }
    }
}

/// Construct the backend `config` selects.
pub async fn open(config: &StoreConfig) -> StoreResult<Arc<dyn Storage>> {
    let backend: Arc<dyn Storage> = match config {
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
        StoreConfig::Embedded(embedded) => Arc::new(EmbeddedStore::open_with_bucket(
            &embedded.path,
            &embedded.bucket,
        )?),
        StoreConfig::Document(document) => {
            Arc::new(DocumentStore::connect(&document.region, &document.table).await?)
        }
        StoreConfig::Object(object) => Arc::new(BucketStore::s3(object.into())?),
    };
    info!(backend = config.backend(), "storage backend ready");
    Ok(backend)
}
