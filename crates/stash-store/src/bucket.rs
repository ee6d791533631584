//! Cloud object-store backend.
//!
//! Every record is one object named `stem-|-type.ext`. The store has no notion
//! of type, so listing enumerates the whole bucket and filters names locally.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::key;
use crate::traits::{Item, Mapper, Readable, Storage, Writable};

/// Content type used when no resolver is configured.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// User metadata key carrying the configured expiry, as RFC 3339.
pub const EXPIRES_METADATA: &str = "expires";

/// `(id, type)` to object name.
pub type KeyEncoder = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;
/// Object name to `(id, type)`.
pub type KeyDecoder = Arc<dyn Fn(&str) -> (String, String) + Send + Sync>;
/// Record id to content type.
pub type ContentTypeResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Settings for a [`BucketStore`]. Unset functions fall back to the
/// object-name codec in [`key`] and [`DEFAULT_CONTENT_TYPE`].
#[derive(Clone, Default)]
pub struct BucketConfig {
    /// Public base URL of the bucket, used by [`BucketStore::url_for`].
    pub domain: String,
    pub bucket: String,
    /// Region for [`BucketStore::s3`]; the environment decides when unset.
    pub region: Option<String>,
    /// Expiry stamped on every uploaded object as user metadata
    /// ([`EXPIRES_METADATA`]). It is informational only and does not set the
    /// HTTP `Expires` header, so response caching is unaffected.
    pub expires: Option<DateTime<Utc>>,
    pub key_encoder: Option<KeyEncoder>,
    pub key_decoder: Option<KeyDecoder>,
    pub content_type: Option<ContentTypeResolver>,
}

impl fmt::Debug for BucketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketConfig")
            .field("domain", &self.domain)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("expires", &self.expires)
            .field("custom_key_encoder", &self.key_encoder.is_some())
            .field("custom_key_decoder", &self.key_decoder.is_some())
            .field("custom_content_type", &self.content_type.is_some())
            .finish()
    }
}

/// Translate an object-store error. Missing objects become
/// [`StoreError::NotFound`]; everything else is internal.
pub fn translate(err: object_store::Error) -> StoreError {
    match err {
        object_store::Error::NotFound { .. } => StoreError::NotFound(err.to_string()),
        other => StoreError::Internal(other.to_string()),
    }
}

/// The location of an object named `name`, kept byte for byte.
fn object_path(name: &str) -> StoreResult<Path> {
    Path::parse(name)
        .map_err(|e| StoreError::Internal(format!("invalid object name {name:?}: {e}")))
}

/// Record storage over an object store bucket.
pub struct BucketStore {
    session: Arc<dyn ObjectStore>,
    domain: String,
    bucket: String,
    expires: Option<DateTime<Utc>>,
    encode: KeyEncoder,
    decode: KeyDecoder,
    content_type: ContentTypeResolver,
}

impl BucketStore {
    /// Build over an existing object-store session.
    pub fn new(session: Arc<dyn ObjectStore>, config: BucketConfig) -> Self {
        let encode = config
            .key_encoder
            .unwrap_or_else(|| Arc::new(key::encode_object_name));
        let decode = config
            .key_decoder
            .unwrap_or_else(|| Arc::new(key::decode_object_name));
        let content_type = config
            .content_type
            .unwrap_or_else(|| Arc::new(|_: &str| DEFAULT_CONTENT_TYPE.to_owned()));

        Self {
            session,
            domain: config.domain,
            bucket: config.bucket,
            expires: config.expires,
            encode,
            decode,
            content_type,
        }
    }

    /// Connect to S3 using credentials from the environment.
    pub fn s3(config: BucketConfig) -> StoreResult<Self> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&config.bucket);
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        let session = builder.build().map_err(translate)?;
        info!(bucket = %config.bucket, "bucket store connected");
        Ok(Self::new(Arc::new(session), config))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public URL of the object holding `item`. Each path segment is
    /// URL-encoded, so the separator's `|` appears as `%7C`.
    pub fn url_for(&self, item: &dyn Item) -> String {
        let name = (self.encode)(item.id(), item.record_type());
        let path: Vec<_> = name.split('/').map(urlencoding::encode).collect();
        format!("{}/{}", self.domain.trim_end_matches('/'), path.join("/"))
    }

    /// Recover the record id from a URL produced by [`url_for`](Self::url_for)
    /// or from a bare object name.
    pub fn id_from_url(&self, url: &str) -> String {
        let domain = self.domain.trim_end_matches('/');
        let name = url
            .strip_prefix(domain)
            .filter(|_| !domain.is_empty())
            .map_or(url, |rest| rest.trim_start_matches('/'));
        let name = urlencoding::decode(name).unwrap_or(Cow::Borrowed(name));
        let (id, _) = (self.decode)(&name);
        id
    }
}

#[async_trait]
impl Storage for BucketStore {
    async fn write(&self, item: &dyn Writable) -> StoreResult<()> {
        let name = (self.encode)(item.id(), item.record_type());
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, (self.content_type)(item.id()).into());
        if let Some(expires) = self.expires {
            attributes.insert(
                Attribute::Metadata(EXPIRES_METADATA.into()),
                expires.to_rfc3339().into(),
            );
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        let location = object_path(&name)?;

        self.session
            .put_opts(
                &location,
                PutPayload::from(item.payload().into_owned()),
                options,
            )
            .await
            .map_err(translate)?;
        debug!(object = %name, "bucket write");
        Ok(())
    }

    async fn read(&self, item: &mut dyn Readable) -> StoreResult<()> {
        let name = (self.encode)(item.id(), item.record_type());
        let object = self
            .session
            .get(&object_path(&name)?)
            .await
            .map_err(translate)?;
        let payload = object.bytes().await.map_err(translate)?;
        item.set_payload(payload.to_vec());
        Ok(())
    }

    async fn delete(&self, item: &dyn Item) -> StoreResult<()> {
        let name = (self.encode)(item.id(), item.record_type());
        match self.session.delete(&object_path(&name)?).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                debug!(object = %name, "bucket delete");
                Ok(())
            }
            Err(err) => Err(translate(err)),
        }
    }

    /// Downloads each matching object. An object removed between enumeration
    /// and download is skipped.
    async fn list(&self, mapper: &mut dyn Mapper) -> StoreResult<()> {
        let wanted = mapper.record_type().to_owned();
        let mut listing = self.session.list(None);
        let mut scanned = 0u64;
        let mut count = 0u64;

        while let Some(meta) = listing.next().await {
            let meta = meta.map_err(translate)?;
            scanned += 1;

            let (id, record_type) = (self.decode)(meta.location.as_ref());
            if record_type != wanted {
                continue;
            }

            let payload = match self.session.get(&meta.location).await {
                Ok(object) => object.bytes().await.map_err(translate)?,
                Err(object_store::Error::NotFound { .. }) => {
                    warn!(object = %meta.location, "object vanished during list");
                    continue;
                }
                Err(err) => return Err(translate(err)),
            };

            mapper.append(&id, &wanted, payload.to_vec());
            count += 1;
        }

        mapper.set_count(count);
        debug!(record_type = %wanted, count, scanned, "bucket list");
        Ok(())
    }
}

impl fmt::Debug for BucketStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketStore")
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .field("expires", &self.expires)
            .finish()
    }
}
