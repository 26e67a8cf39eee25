//! Source retrieval
//!
//! `ResourceFetcher` is the network boundary: it returns the raw payload for a
//! URL. `fetch_into_scope` turns that payload into a registered temporary
//! resource, releasing the resource again if anything fails so no partial file
//! stays registered.

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info};

use super::plan::TrackBinding;
use super::resources::{ResourceRole, ResourceScope, TemporaryResource};
use crate::error::MixError;

const USER_AGENT: &str = concat!("vmix-mx/", env!("CARGO_PKG_VERSION"));

/// Retrieves the bytes behind a source URL
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Full payload, or `FetchFailed` on transport error / non-2xx status
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, MixError>;
}

/// HTTP GET fetcher with a fixed per-request timeout
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, MixError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| MixError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, MixError> {
        let fetch_failed = |cause: String| MixError::FetchFailed {
            url: url.to_string(),
            cause,
        };

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        Ok(body.to_vec())
    }
}

/// Download one binding's source into a new resource registered with `scope`
pub async fn fetch_into_scope(
    fetcher: &dyn ResourceFetcher,
    scope: &ResourceScope,
    binding: &TrackBinding,
) -> Result<TemporaryResource, MixError> {
    let handle = scope.register(
        ResourceRole::Input(binding.role),
        binding.file_extension_hint,
    );

    match materialize(fetcher, handle.path(), &binding.source).await {
        Ok(byte_length) => {
            info!(
                role = %binding.role,
                input_index = binding.input_index,
                bytes = byte_length,
                "Fetched source"
            );
            Ok(TemporaryResource {
                handle,
                byte_length,
            })
        }
        Err(e) => {
            debug!(role = %binding.role, error = %e, "Fetch failed, releasing resource");
            scope.release(handle.id());
            Err(e)
        }
    }
}

async fn materialize(
    fetcher: &dyn ResourceFetcher,
    path: &std::path::Path,
    url: &Url,
) -> Result<u64, MixError> {
    let payload = fetcher.fetch_bytes(url).await?;
    tokio::fs::write(path, &payload).await?;

    let written = tokio::fs::metadata(path).await?.len();
    if written != payload.len() as u64 {
        return Err(MixError::FetchFailed {
            url: url.to_string(),
            cause: format!(
                "wrote {} bytes but payload was {} bytes",
                written,
                payload.len()
            ),
        });
    }
    Ok(written)
}
