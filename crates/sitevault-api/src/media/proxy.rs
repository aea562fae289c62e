//! Ranged media delivery
//!
//! Resolves a gallery object to a short-lived signed URL, discovers its size
//! with a HEAD request and relays one byte window from storage to the client.
//! The body is streamed through; nothing is buffered.

use super::repository::MediaRepository;
use super::storage::ObjectStorage;
use axum::http::{header, HeaderMap};
use sitevault_core::{ByteRange, MediaConfig, RangeWindow};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Media proxy errors
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media not found")]
    NotFound,

    #[error("Failed to sign media URL: {0}")]
    SigningFailed(String),

    #[error("Storage unreachable: {0}")]
    UpstreamUnavailable(String),

    #[error("Storage returned unexpected status {0}")]
    UpstreamFetchFailed(u16),

    #[error("Range not satisfiable for object of {total} bytes")]
    RangeNotSatisfiable { total: u64 },

    #[error("Media lookup failed: {0}")]
    Lookup(String),
}

/// An upstream response ready to be relayed
#[derive(Debug)]
pub struct ProxiedMedia {
    /// Window actually being served
    pub window: RangeWindow,
    pub content_type: String,
    pub content_length: Option<u64>,
    /// Upstream response whose body is relayed as-is
    pub upstream: reqwest::Response,
}

impl ProxiedMedia {
    pub fn is_partial(&self) -> bool {
        self.window.is_partial()
    }
}

/// Media range proxy
#[derive(Clone)]
pub struct MediaProxy {
    media: Arc<dyn MediaRepository>,
    storage: Arc<dyn ObjectStorage>,
    http: reqwest::Client,
    config: MediaConfig,
}

impl MediaProxy {
    pub fn new(
        media: Arc<dyn MediaRepository>,
        storage: Arc<dyn ObjectStorage>,
        config: MediaConfig,
    ) -> Result<Self, MediaError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()
            .map_err(|e| MediaError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            media,
            storage,
            http,
            config,
        })
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.upstream_timeout_secs)
    }

    /// Wait for upstream response headers, bounded by the configured deadline.
    /// The body stream itself is not bounded.
    async fn send_with_deadline<F>(&self, request: F) -> Result<reqwest::Response, MediaError>
    where
        F: Future<Output = reqwest::Result<reqwest::Response>>,
    {
        match tokio::time::timeout(self.deadline(), request).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(MediaError::UpstreamUnavailable(e.to_string())),
            Err(_) => Err(MediaError::UpstreamUnavailable(format!(
                "no response within {}s",
                self.config.upstream_timeout_secs
            ))),
        }
    }

    /// Fetch one window of a stored media object
    pub async fn fetch(
        &self,
        id: Uuid,
        range_header: Option<&str>,
    ) -> Result<ProxiedMedia, MediaError> {
        let media = self
            .media
            .find_media(id)
            .await
            .map_err(|e| MediaError::Lookup(e.to_string()))?
            .ok_or(MediaError::NotFound)?;
        let path = media.storage_path().ok_or(MediaError::NotFound)?;

        let url = self
            .storage
            .signed_url(path, self.config.signed_url_ttl_secs)
            .await
            .map_err(|e| MediaError::SigningFailed(e.to_string()))?;

        let head = self.send_with_deadline(self.http.head(&url).send()).await?;
        let total = if head.status().is_success() {
            header_u64(head.headers(), header::CONTENT_LENGTH)
        } else {
            tracing::debug!(media_id = %id, status = %head.status(), "HEAD did not report a size");
            None
        };

        // Malformed ranges fall back to the default window
        let requested = range_header.and_then(ByteRange::parse);
        let window = RangeWindow::resolve(requested, total, self.config.chunk_bytes);
        if let RangeWindow::Unsatisfiable { total } = window {
            return Err(MediaError::RangeNotSatisfiable { total });
        }

        let mut request = self.http.get(&url);
        if let Some(range) = window.upstream_range() {
            request = request.header(header::RANGE, range);
        }
        let upstream = self.send_with_deadline(request.send()).await?;

        let status = upstream.status();
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::PARTIAL_CONTENT {
            return Err(MediaError::UpstreamFetchFailed(status.as_u16()));
        }

        // The body is whatever storage sent; its own framing headers win
        let window = match status {
            reqwest::StatusCode::PARTIAL_CONTENT => upstream
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(RangeWindow::from_content_range)
                .unwrap_or(window),
            _ if window.is_partial() => RangeWindow::Full { total },
            _ => window,
        };

        let content_length = header_u64(upstream.headers(), header::CONTENT_LENGTH)
            .or_else(|| window.content_length());

        let content_type = media
            .file_type
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                upstream
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        tracing::debug!(
            media_id = %id,
            window = ?window,
            upstream_status = %status,
            "Relaying media"
        );

        Ok(ProxiedMedia {
            window,
            content_type,
            content_length,
            upstream,
        })
    }
}

fn header_u64(headers: &HeaderMap, name: header::HeaderName) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
