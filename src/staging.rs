//! Object store client
//!
//! A handle on one bucket and key prefix. Every staged export gets a fresh
//! key so that repeated or concurrent exports of the same table never
//! overwrite each other's objects.
//!
//! The store API is async; this client owns a current-thread runtime and
//! blocks on each call, so it must not be used from inside another runtime.

use std::sync::Arc;

use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload, TagSet};
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ObjectOptions, StoreConfig};
use crate::error::{StageError, StageResult};
use crate::statement::Authorization;

/// An object written by [`StagingStore::put`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedObject {
    pub key: String,
    /// Location the warehouse loader reads from
    pub uri: String,
    pub size: usize,
}

/// Blocking client for a bucket and optional key prefix
pub struct StagingStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: Option<String>,
    authorization: Option<Authorization>,
    runtime: Runtime,
}

impl std::fmt::Debug for StagingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingStore")
            .field("store", &self.store.to_string())
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("authorization", &self.authorization)
            .finish()
    }
}

impl StagingStore {
    /// Open an S3 handle from the store configuration
    ///
    /// Without an access key pair the ambient AWS environment supplies the
    /// upload credentials. The configured key pair or IAM role becomes the
    /// authorization the warehouse uses to read staged objects.
    pub fn connect(config: &StoreConfig) -> StageResult<Self> {
        let mut builder = match config.access_key_id.as_deref() {
            Some(_) => AmazonS3Builder::new(),
            None => AmazonS3Builder::from_env(),
        }
        .with_bucket_name(&config.bucket)
        .with_allow_http(config.allow_http);

        if let Some(key) = &config.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(token) = &config.session_token {
            builder = builder.with_token(token);
        }
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder.build()?;
        info!(bucket = %config.bucket, prefix = ?config.normalized_prefix(), "opened object store");
        let staging = Self::with_store(Arc::new(store), &config.bucket, config.normalized_prefix())?;
        Ok(match config.authorization() {
            Ok(authorization) => staging.with_authorization(authorization),
            Err(_) => staging,
        })
    }

    /// Wrap an existing store, such as an in-memory one
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: &str, prefix: Option<&str>) -> StageResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(StagingStore {
            store,
            bucket: bucket.to_string(),
            prefix: prefix
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            authorization: None,
            runtime,
        })
    }

    /// Set the credentials the warehouse uses to read staged objects
    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    /// Credentials for the bulk-load statement
    pub fn authorization(&self) -> StageResult<&Authorization> {
        self.authorization.as_ref().ok_or_else(|| {
            StageError::Configuration(
                "no credentials for the warehouse loader: set an access key pair or an IAM role"
                    .to_string(),
            )
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// A new, unique key for an export of `table_name`
    pub fn key_for(&self, table_name: &str) -> String {
        let file = format!("{}-{}.csv", table_name, Uuid::new_v4());
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, file),
            None => file,
        }
    }

    /// The loader-facing location of `key`
    pub fn uri_for(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    /// Upload `bytes` under `key` with the given metadata
    pub fn put(&self, key: &str, bytes: Vec<u8>, options: &ObjectOptions) -> StageResult<StagedObject> {
        let path = Path::parse(key)?;
        let size = bytes.len();
        let opts = put_options(options);

        self.runtime
            .block_on(self.store.put_opts(&path, PutPayload::from(bytes), opts))?;

        let uri = self.uri_for(key);
        debug!(%uri, size, "staged object");
        Ok(StagedObject {
            key: key.to_string(),
            uri,
            size,
        })
    }

    /// Download the object stored under `key`
    pub fn get(&self, key: &str) -> StageResult<Vec<u8>> {
        let path = Path::parse(key)?;
        let bytes = self.runtime.block_on(async {
            let result = self.store.get(&path).await?;
            result.bytes().await
        })?;
        Ok(bytes.to_vec())
    }

    /// Remove the object stored under `key`
    pub fn delete(&self, key: &str) -> StageResult<()> {
        let path = Path::parse(key)?;
        self.runtime.block_on(self.store.delete(&path))?;
        debug!(key, "deleted staged object");
        Ok(())
    }

    /// Keys of every object under the configured prefix
    pub fn list_keys(&self) -> StageResult<Vec<String>> {
        let prefix = self.prefix.as_deref().map(Path::parse).transpose()?;
        let keys = self.runtime.block_on(
            self.store
                .list(prefix.as_ref())
                .map_ok(|meta| meta.location.to_string())
                .try_collect::<Vec<_>>(),
        )?;
        Ok(keys)
    }
}

fn put_options(options: &ObjectOptions) -> PutOptions {
    let mut attributes = Attributes::new();
    let fixed = [
        (Attribute::ContentType, &options.content_type),
        (Attribute::ContentEncoding, &options.content_encoding),
        (Attribute::ContentDisposition, &options.content_disposition),
        (Attribute::ContentLanguage, &options.content_language),
        (Attribute::CacheControl, &options.cache_control),
    ];
    for (attribute, value) in fixed {
        if let Some(value) = value {
            attributes.insert(attribute, value.clone().into());
        }
    }
    for (name, value) in &options.metadata {
        attributes.insert(Attribute::Metadata(name.clone().into()), value.clone().into());
    }

    let mut tags = TagSet::default();
    for (name, value) in &options.tags {
        tags.push(name, value);
    }

    PutOptions {
        tags,
        attributes,
        ..Default::default()
    }
}
