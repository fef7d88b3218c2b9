//! Object storage for uploaded product images.
//!
//! The upload handler only sees the [`ImageStorage`] trait: it hands over the bytes of one
//! uploaded file and gets back a durable, publicly resolvable URL once the provider has
//! acknowledged the write. Which provider sits behind the trait is a deployment decision, made by
//! `storage.type` in the configuration:
//!
//! - [`CloudinaryStorage`]: signed uploads to Cloudinary (the default)
//! - [`S3Storage`]: `PutObject` into any S3-compatible bucket
//! - [`MemoryStorage`]: keeps objects in process memory, for local development and tests
//!
//! Every backend writes under a single folder dedicated to product images (`storage.folder`).
//! No backend retries, and none deletes objects: an image replaced by a newer upload stays in
//! the bucket.

pub mod cloudinary;
pub mod memory;
pub mod s3;

pub use cloudinary::CloudinaryStorage;
pub use memory::MemoryStorage;
pub use s3::S3Storage;

use crate::config::{StorageBackendConfig, StorageConfig};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A file received in an upload request, held in memory for the duration of that request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    /// Content type declared by the client, if any
    pub content_type: Option<String>,
    /// Original file name declared by the client, if any
    pub file_name: Option<String>,
}

/// The provider's acknowledgment of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Public URL of the stored object
    pub url: String,
    /// Provider-side identifier (Cloudinary public id, S3 key, ...)
    pub public_id: String,
}

#[derive(Debug, Error)]
pub enum StorageError {
    /// The provider answered, but refused the upload
    #[error("Storage provider rejected the upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never got a usable answer (connection, TLS, body read)
    #[error("Request to storage provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with success but the body was not what we expect
    #[error("Unexpected response from storage provider: {0}")]
    InvalidResponse(String),

    /// S3 SDK failure
    #[error("S3 upload failed: {0}")]
    S3(String),
}

/// A place to put uploaded product images.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Store one image and return its public URL.
    ///
    /// Returns only after the provider has confirmed the write.
    async fn upload(&self, image: UploadedImage) -> Result<StoredImage, StorageError>;
}

/// Construct the configured storage backend.
pub async fn build_storage(config: &StorageConfig, http_client: reqwest::Client) -> anyhow::Result<Arc<dyn ImageStorage>> {
    let folder = config.folder.clone();

    let storage: Arc<dyn ImageStorage> = match &config.backend {
        StorageBackendConfig::Cloudinary {
            cloud_name,
            api_key,
            api_secret,
            api_base_url,
        } => Arc::new(CloudinaryStorage::new(
            http_client,
            api_base_url,
            cloud_name.clone(),
            api_key.clone(),
            api_secret.clone(),
            folder,
        )?),
        StorageBackendConfig::S3 {
            bucket,
            public_base_url,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let credentials = match (access_key_id, secret_access_key) {
                (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
                _ => None,
            };
            let client = s3::build_client(region.clone(), endpoint.as_ref(), credentials, *force_path_style).await;
            Arc::new(S3Storage::new(client, bucket.clone(), public_base_url.clone(), folder))
        }
        StorageBackendConfig::Memory { base_url } => {
            warn!(%base_url, "Memory storage selected: uploads are kept in process and their URLs are not served");
            Arc::new(MemoryStorage::new(base_url.clone(), folder))
        }
    };

    info!(backend = storage.name(), folder = %config.folder, "Image storage configured");
    Ok(storage)
}

/// Pick a file extension for a stored object: the client's file name first, then the declared
/// content type, then `bin`.
pub(crate) fn extension_for(image: &UploadedImage) -> String {
    let from_name = image
        .file_name
        .as_deref()
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase());

    let from_mime = || {
        image
            .content_type
            .as_deref()
            .and_then(mime_guess::get_mime_extensions_str)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
    };

    from_name.or_else(from_mime).unwrap_or_else(|| "bin".to_string())
}
