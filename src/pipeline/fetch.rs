//! Image byte retrieval.
//!
//! The embedder only needs "bytes for this URL", so fetching sits behind the
//! [`ImageFetcher`] trait and tests plug in in-memory fakes. The default
//! [`HttpImageFetcher`] GETs `http(s)://` URLs with `reqwest`. Reading
//! anything else as a local file path is opt-in: photo references usually
//! come from the remote assistant and must not reach the file system.

use crate::error::ImageLoadFailure;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Source of raw image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadFailure>;
}

/// Check if the reference looks like a URL.
pub fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// `reqwest`-backed fetcher with an optional local-file fallback.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    local_files: bool,
}

impl HttpImageFetcher {
    /// `timeout` bounds a single request including the body download.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("itinerary-pdf/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            local_files: false,
        }
    }

    /// Also read non-URL references as local paths (`/a.png`, `file://…`).
    pub fn with_local_files(mut self, enabled: bool) -> Self {
        self.local_files = enabled;
        self
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageLoadFailure> {
        let transport = |e: reqwest::Error| ImageLoadFailure::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageLoadFailure::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(transport)?;
        debug!(url, bytes = bytes.len(), "Downloaded image");
        Ok(bytes.to_vec())
    }

    async fn read_local(&self, path: &str) -> Result<Vec<u8>, ImageLoadFailure> {
        let path = path.strip_prefix("file://").unwrap_or(path);
        let bytes = tokio::fs::read(Path::new(path))
            .await
            .map_err(|e| ImageLoadFailure::Transport {
                url: path.to_string(),
                reason: e.to_string(),
            })?;
        debug!(path, bytes = bytes.len(), "Read local image");
        Ok(bytes)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadFailure> {
        if is_url(url) {
            self.download(url).await
        } else if self.local_files {
            self.read_local(url).await
        } else {
            Err(ImageLoadFailure::LocalPathRejected {
                url: url.to_string(),
            })
        }
    }
}
