//! Avatar image storage.
//!
//! [`AvatarStore`] uploads a user's image and returns the URL to store on the
//! user row. [`CloudinaryStore`] performs a signed upload to Cloudinary and
//! returns a 100x100 fill-cropped delivery URL.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::{get, Lookup};

/// Edge length of the square avatar delivered to clients.
pub const AVATAR_SIZE: u32 = 100;

/// Errors from the avatar storage layer.
#[derive(Debug, thiserror::Error)]
pub enum AvatarError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The image host returned a non-2xx status code.
    #[error("Avatar upload rejected ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

#[async_trait]
pub trait AvatarStore: Send + Sync {
    /// Upload `bytes` into `folder` and return the public delivery URL.
    async fn upload(
        &self,
        folder: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AvatarError>;
}

// ---------------------------------------------------------------------------
// Cloudinary
// ---------------------------------------------------------------------------

/// Cloudinary account credentials.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl CloudinaryConfig {
    /// `Some` only when `CLOUD_NAME`, `API_KEY` and `API_SECRET` are all set.
    pub fn from_lookup(lookup: Lookup<'_>) -> Option<Self> {
        Some(Self {
            cloud_name: get(lookup, "CLOUD_NAME")?,
            api_key: get(lookup, "API_KEY")?,
            api_secret: get(lookup, "API_SECRET")?,
        })
    }
}

/// Subset of the Cloudinary upload response we use.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
}

/// Signed uploads to the Cloudinary image API.
pub struct CloudinaryStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        )
    }
}

#[async_trait]
impl AvatarStore for CloudinaryStore {
    async fn upload(
        &self,
        folder: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AvatarError> {
        let mut params = BTreeMap::new();
        params.insert("folder", folder.to_string());
        params.insert("overwrite", "true".to_string());
        params.insert("public_id", "avatar".to_string());
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        let signature = sign_params(&params, &self.config.api_secret);

        let mut form = reqwest::multipart::Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        form = form.part("file", part);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AvatarError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::info!(public_id = %uploaded.public_id, "Avatar uploaded");
        Ok(delivery_url(&self.config.cloud_name, &uploaded.public_id))
    }
}

/// Cloudinary request signature: `k=v` pairs sorted by key and joined with
/// `&`, followed by the API secret, SHA-256 hex encoded.
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let joined = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{:x}", Sha256::digest(format!("{joined}{api_secret}")))
}

/// Square, fill-cropped JPEG delivery URL for an uploaded image.
pub fn delivery_url(cloud_name: &str, public_id: &str) -> String {
    format!(
        "https://res.cloudinary.com/{cloud_name}/image/upload/c_fill,h_{AVATAR_SIZE},w_{AVATAR_SIZE}/{public_id}.jpg"
    )
}
