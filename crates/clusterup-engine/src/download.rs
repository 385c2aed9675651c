//! HTTP retrieval of release archives.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;

/// Fetches a URL into memory.
///
/// The orchestrator only needs whole-body downloads of archives that are a few
/// tens of megabytes, so there is no streaming interface.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`Downloader`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("clusterup/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Http {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url = %url, "Downloading");

        let response = self.client.get(url).send().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;

        debug!(url = %url, bytes = body.len(), "Download complete");
        Ok(body.to_vec())
    }
}
