//! Remote content-addressable store

use super::storage_errors::RemoteStoreError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hash plus retrieval URL of an uploaded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReceipt {
    pub hash: String,
    pub url: Option<String>,
}

/// Remote store capability
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Credentials present. An unconfigured store fails every call with
    /// [`RemoteStoreError::NotConfigured`].
    fn is_configured(&self) -> bool;

    /// Configured and known reachable
    fn is_available(&self) -> bool {
        self.is_configured()
    }

    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        redundancy: u8,
    ) -> Result<RemoteReceipt, RemoteStoreError>;

    async fn retrieve(&self, hash: &str) -> Result<Vec<u8>, RemoteStoreError>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        redundancy: u8,
    ) -> Result<RemoteReceipt, RemoteStoreError> {
        (**self).upload(name, content_type, bytes, redundancy).await
    }

    async fn retrieve(&self, hash: &str) -> Result<Vec<u8>, RemoteStoreError> {
        (**self).retrieve(hash).await
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    hash: String,
}

/// HTTP client for the remote store service
pub struct HttpRemoteStore {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    network: String,
    initialized: AtomicBool,
}

impl HttpRemoteStore {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        network: &str,
        request_timeout: Duration,
    ) -> Result<Self, RemoteStoreError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            network: network.to_string(),
            initialized: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retrieval_url(&self, hash: &str) -> String {
        format!("{}/storage/retrieve/{}", self.endpoint, hash)
    }

    /// Health check, run once before the first upload
    pub async fn initialize(&self) -> Result<(), RemoteStoreError> {
        if !self.is_configured() {
            return Err(RemoteStoreError::NotConfigured);
        }
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let response = self
            .http
            .get(format!("{}/health", self.endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| RemoteStoreError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(endpoint = %self.endpoint, status = %status, "Remote store health check failed");
            return Err(RemoteStoreError::Unavailable(format!("health check returned {}", status)));
        }

        self.initialized.store(true, Ordering::Release);
        info!(endpoint = %self.endpoint, network = %self.network, "Remote store initialized");
        Ok(())
    }

    async fn error_from(response: reqwest::Response) -> RemoteStoreError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        RemoteStoreError::Http { status, message }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn is_available(&self) -> bool {
        self.is_configured() && self.initialized.load(Ordering::Acquire)
    }

    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        redundancy: u8,
    ) -> Result<RemoteReceipt, RemoteStoreError> {
        self.initialize().await?;

        let size = bytes.len();
        let file = Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(content_type)
            .map_err(|e| RemoteStoreError::InvalidRequest(format!("bad content type: {}", e)))?;
        let form = Form::new()
            .part("file", file)
            .text("network", self.network.clone())
            .text("redundancy", redundancy.to_string());

        let response = self
            .http
            .post(format!("{}/storage/upload", self.endpoint))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: UploadResponse = response.json().await?;
        if body.hash.is_empty() {
            return Err(RemoteStoreError::InvalidResponse("empty hash".to_string()));
        }
        debug!(hash = %body.hash, size, "Uploaded to remote store");
        Ok(RemoteReceipt {
            url: Some(self.retrieval_url(&body.hash)),
            hash: body.hash,
        })
    }

    async fn retrieve(&self, hash: &str) -> Result<Vec<u8>, RemoteStoreError> {
        if !self.is_configured() {
            return Err(RemoteStoreError::NotConfigured);
        }
        let response = self
            .http
            .get(self.retrieval_url(hash))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}
