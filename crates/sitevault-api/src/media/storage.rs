//! Object storage signing
//!
//! The hosted backend exposes a storage API that issues short-lived signed
//! URLs. Only the proxy ever sees them.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sitevault_core::StorageConfig;
use std::time::Duration;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),

    #[error("Storage request failed: {0}")]
    RequestFailed(String),

    #[error("Storage returned status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected storage response: {0}")]
    InvalidResponse(String),
}

/// Issues time-limited retrieval URLs for stored objects
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, StorageError>;
}

#[derive(Debug, Serialize)]
struct SignRequest {
    #[serde(rename = "expiresIn")]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

/// Storage API client for the hosted backend
#[derive(Clone)]
pub struct HostedStorage {
    http: reqwest::Client,
    backend_url: String,
    service_key: String,
    bucket: String,
}

impl HostedStorage {
    pub fn new(config: &StorageConfig, timeout: Duration) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            backend_url: config.backend_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            bucket: config.bucket.clone(),
        })
    }

    fn sign_endpoint(&self, path: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(&format!("{}/storage/v1/object/sign", self.backend_url))
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidUrl(self.backend_url.clone()))?
            .push(&self.bucket)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn absolute(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            return signed.to_string();
        }
        let signed = signed.trim_start_matches('/');
        format!("{}/storage/v1/{}", self.backend_url, signed)
    }
}

#[async_trait]
impl ObjectStorage for HostedStorage {
    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, StorageError> {
        let endpoint = self.sign_endpoint(path)?;

        let response = self
            .http
            .post(endpoint)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&SignRequest {
                expires_in: expires_in_secs,
            })
            .send()
            .await
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        Ok(self.absolute(&body.signed_url))
    }
}
