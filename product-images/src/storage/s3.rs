//! S3-compatible bucket storage.
//!
//! Objects are written under `<folder>/<uuid>.<ext>` and addressed through `public_base_url`,
//! which is whatever serves the bucket publicly (a CDN, a bucket website endpoint, ...). Works with
//! AWS S3 and with S3-compatible providers through a custom endpoint.

use super::{ImageStorage, StorageError, StoredImage, UploadedImage, extension_for};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client as S3Client, config::Region};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base_url: Url,
    folder: String,
}

/// Build an S3 client from the shared AWS config, with optional overrides.
///
/// Without static credentials the default provider chain (env, profile, IMDS, ...) applies.
pub async fn build_client(
    region: Option<String>,
    endpoint: Option<&Url>,
    credentials: Option<(String, String)>,
    force_path_style: bool,
) -> S3Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    if let Some((access_key_id, secret_access_key)) = credentials {
        loader = loader.credentials_provider(Credentials::new(access_key_id, secret_access_key, None, None, "product-images-config"));
    }

    let shared = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(force_path_style);
    if let Some(endpoint) = endpoint {
        builder = builder.endpoint_url(endpoint.as_str());
    }

    S3Client::from_conf(builder.build())
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String, public_base_url: Url, folder: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
            folder,
        }
    }

    fn object_key(&self, image: &UploadedImage) -> String {
        format!("{}/{}.{}", self.folder.trim_matches('/'), Uuid::new_v4(), extension_for(image))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.as_str().trim_end_matches('/'), key)
    }
}

#[async_trait]
impl ImageStorage for S3Storage {
    fn name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self, image), fields(bucket = %self.bucket, size = image.bytes.len()), err)]
    async fn upload(&self, image: UploadedImage) -> Result<StoredImage, StorageError> {
        let key = self.object_key(&image);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .set_content_type(image.content_type)
            .body(ByteStream::from(image.bytes))
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("Failed to upload {key}: {}", aws_sdk_s3::error::DisplayErrorContext(&e))))?;

        let url = self.public_url(&key);
        debug!(%url, %key, "S3 upload complete");

        Ok(StoredImage { url, public_id: key })
    }
}
