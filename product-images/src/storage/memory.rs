use super::{ImageStorage, StorageError, StoredImage, UploadedImage};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Keeps uploaded images in process memory. Objects are keyed `<folder>/<uuid>` and the returned
/// URL is `<base_url>/<key>`.
///
/// Objects are never evicted and nothing serves them over HTTP; see [`objects`](Self::objects).
#[derive(Clone)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, MemoryObject>>>,
    base_url: Url,
    folder: String,
    upload_count: Arc<Mutex<usize>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new(base_url: Url, folder: String) -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            base_url,
            folder,
            upload_count: Arc::new(Mutex::new(0)),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Make every following upload fail with the given provider message
    pub fn fail_uploads(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    /// Number of upload attempts, failed ones included
    pub fn upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn objects(&self) -> HashMap<String, MemoryObject> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), key)
    }
}

#[async_trait]
impl ImageStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload(&self, image: UploadedImage) -> Result<StoredImage, StorageError> {
        *self.upload_count.lock().unwrap_or_else(|e| e.into_inner()) += 1;

        if let Some(message) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(StorageError::Rejected { status: 500, message });
        }

        let key = format!("{}/{}", self.folder.trim_matches('/'), Uuid::new_v4());
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).insert(
            key.clone(),
            MemoryObject {
                bytes: image.bytes,
                content_type: image.content_type,
            },
        );

        Ok(StoredImage {
            url: self.url_for(&key),
            public_id: key,
        })
    }
}
