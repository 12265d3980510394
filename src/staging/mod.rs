//! Staging store for batch files
//!
//! Every flush writes its rows to a uniquely named object that the warehouse
//! bulk-loads from. Objects live in an S3 bucket, or in a local directory
//! when `use_local_copy` is set.

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::Utc;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a staged object can be read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedLocation {
    /// Object in an S3 bucket
    S3 { bucket: String, key: String },
    /// File on the local filesystem
    Local(PathBuf),
}

impl std::fmt::Display for StagedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StagedLocation::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            StagedLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A batch file written to the staging store
#[derive(Debug, Clone)]
pub struct StagedObject {
    /// Location the warehouse reads from
    pub location: StagedLocation,
    /// Path within the object store
    path: ObjectPath,
    /// File contents
    pub data: Bytes,
}

#[derive(Debug, Clone)]
enum StoreKind {
    S3 { bucket: String },
    Local { root: PathBuf },
}

/// Object store holding staged batch files
#[derive(Debug, Clone)]
pub struct StagingStore {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Key prefix within the bucket or directory
    prefix: String,
    kind: StoreKind,
}

impl StagingStore {
    /// Create the store configured for the loader
    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        let prefix = config.s3_key_prefix.clone().unwrap_or_default();

        if config.use_local_copy {
            let dir = config
                .temp_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("redshift-loader"));
            return Self::local(&dir, prefix);
        }

        let bucket = config
            .s3_bucket
            .as_deref()
            .ok_or_else(|| Error::missing_field("s3_bucket"))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(key_id) = &config.aws_access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &config.aws_secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(token) = &config.aws_session_token {
            builder = builder.with_token(token);
        }
        if let Some(region) = &config.aws_region {
            builder = builder.with_region(region);
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create s3 client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            kind: StoreKind::S3 {
                bucket: bucket.to_string(),
            },
        })
    }

    /// Create a store in a local directory
    pub fn local(dir: &Path, prefix: String) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::config(format!("Failed to create directory {}: {e}", dir.display()))
        })?;
        let root = dir.canonicalize()?;

        let store = LocalFileSystem::new_with_prefix(&root)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            kind: StoreKind::Local { root },
        })
    }

    /// Check if objects are staged locally
    pub fn is_local(&self) -> bool {
        matches!(self.kind, StoreKind::Local { .. })
    }

    /// Unique key for a new batch file of `stream`
    ///
    /// Format: `{prefix}{stream}_{timestamp}_{uuid}.csv`
    pub fn object_key(&self, stream: &str) -> String {
        let sanitized: String = stream
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "{}{sanitized}_{}_{}.csv",
            self.prefix,
            Utc::now().format("%Y%m%d-%H%M%S%6f"),
            uuid::Uuid::new_v4().simple()
        )
    }

    /// Write a batch file
    pub async fn put(&self, stream: &str, data: Bytes) -> Result<StagedObject> {
        let key = self.object_key(stream);
        let path = ObjectPath::from(key.as_str());

        self.store
            .put(&path, data.clone().into())
            .await
            .map_err(|e| Error::staging(format!("Failed to write {path}: {e}")))?;

        let location = match &self.kind {
            StoreKind::S3 { bucket } => StagedLocation::S3 {
                bucket: bucket.clone(),
                key: path.to_string(),
            },
            StoreKind::Local { root } => StagedLocation::Local(root.join(path.to_string())),
        };
        tracing::debug!("Staged {} bytes at {}", data.len(), location);

        Ok(StagedObject {
            location,
            path,
            data,
        })
    }

    /// Remove a batch file
    pub async fn delete(&self, object: &StagedObject) -> Result<()> {
        self.store
            .delete(&object.path)
            .await
            .map_err(|e| Error::staging(format!("Failed to delete {}: {e}", object.location)))
    }
}
