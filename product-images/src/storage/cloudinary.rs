//! Cloudinary signed uploads.
//!
//! Uploads go to `POST {api_base_url}/v1_1/{cloud_name}/image/upload` as a multipart form holding
//! the file, the API key, a timestamp, the target folder and a signature. The signature is the hex
//! SHA-1 of the signed parameters, sorted by name and joined as `k=v&k=v`, followed by the API
//! secret.

use super::{ImageStorage, StorageError, StoredImage, UploadedImage};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::{debug, instrument};
use url::Url;

pub struct CloudinaryStorage {
    client: reqwest::Client,
    upload_url: Url,
    api_key: String,
    api_secret: String,
    folder: String,
}

/// The parts of Cloudinary's upload response we use. Errors come back as `{"error": {"message"}}`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryStorage {
    pub fn new(
        client: reqwest::Client,
        api_base_url: &Url,
        cloud_name: String,
        api_key: String,
        api_secret: String,
        folder: String,
    ) -> Result<Self, url::ParseError> {
        // `join` replaces the last segment unless the base ends in a slash
        let mut base = api_base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let upload_url = base.join(&format!("v1_1/{cloud_name}/image/upload"))?;

        Ok(Self {
            client,
            upload_url,
            api_key,
            api_secret,
            folder,
        })
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }
}

/// Compute a Cloudinary request signature.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn file_part(image: UploadedImage) -> Result<Part, StorageError> {
    let file_name = image.file_name.unwrap_or_else(|| "upload".to_string());
    let part = Part::bytes(image.bytes.to_vec()).file_name(file_name);

    // Cloudinary sniffs the format itself; only forward content types that parse
    let part = match image.content_type {
        Some(content_type) if content_type.parse::<mime_guess::mime::Mime>().is_ok() => part.mime_str(&content_type)?,
        _ => part,
    };

    Ok(part)
}

#[async_trait]
impl ImageStorage for CloudinaryStorage {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    #[instrument(skip(self, image), fields(folder = %self.folder, size = image.bytes.len()), err)]
    async fn upload(&self, image: UploadedImage) -> Result<StoredImage, StorageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(&[("folder", self.folder.as_str()), ("timestamp", timestamp.as_str())], &self.api_secret);

        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.folder.clone())
            .text("signature", signature)
            .part("file", file_part(image)?);

        let response = self.client.post(self.upload_url.clone()).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed = serde_json::from_str::<UploadResponse>(&body);

        if !status.is_success() {
            let message = match parsed {
                Ok(UploadResponse { error: Some(error), .. }) => error.message,
                _ => body,
            };
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = parsed.map_err(|e| StorageError::InvalidResponse(format!("invalid JSON body: {e}")))?;
        let url = parsed
            .secure_url
            .ok_or_else(|| StorageError::InvalidResponse("missing secure_url".to_string()))?;
        let public_id = parsed.public_id.unwrap_or_default();

        debug!(%url, %public_id, "Cloudinary upload complete");
        Ok(StoredImage { url, public_id })
    }
}
