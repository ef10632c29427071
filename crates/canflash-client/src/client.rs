//! Bridge HTTP client implementation

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use canflash_core::{
    Bridge, BridgeError, BridgeResult, Directive, FlashProgress, MetadataRecord, PollResult,
    StatusCode as SessionStatus,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::BridgeConfig;
use crate::error::{request_error, Result};
use crate::types::*;

/// HTTP client for the command/status bridge
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: Client,
    base_url: Url,
    download_timeout: Duration,
}

impl BridgeClient {
    /// Create a client with default timeouts
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the bridge (e.g., "http://localhost:5000")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::from_config(&BridgeConfig::builder(base_url).build())
    }

    /// Create a client from configuration
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        let mut base_url = Url::parse(&config.base_url)?;
        // Paths are joined relative to the base, which keeps any prefix
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            download_timeout: config.download_timeout(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> BridgeResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| BridgeError::Parse(format!("Invalid bridge path {}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BridgeResult<T> {
        let url = self.url(path)?;
        let response = self.client.get(url).send().await.map_err(request_error)?;
        self.handle_response(response).await
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> BridgeResult<()> {
        let url = self.url(path)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        self.check_status(response).await
    }

    /// Handle a response, parsing JSON or extracting error
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> BridgeResult<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| BridgeError::Parse(e.to_string()))
        } else {
            Err(self.extract_error(response, status).await)
        }
    }

    async fn check_status(&self, response: reqwest::Response) -> BridgeResult<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.extract_error(response, status).await)
        }
    }

    async fn extract_error(&self, response: reqwest::Response, status: StatusCode) -> BridgeError {
        let url = response.url().path().to_string();

        // Try to parse error response body
        let message = match response.json::<ErrorResponse>().await {
            Ok(err) => err.error,
            Err(_) => format!("HTTP {}", status),
        };

        match status {
            StatusCode::NOT_FOUND => BridgeError::NotFound(format!("{}: {}", url, message)),
            _ => BridgeError::server(status.as_u16(), message),
        }
    }
}

#[async_trait]
impl Bridge for BridgeClient {
    #[instrument(skip(self))]
    async fn poll_next_command(&self) -> BridgeResult<PollResult> {
        let response: NextCommandResponse = self.get_json("/next-command").await?;
        Ok(PollResult {
            directive: response.command.as_deref().map(Directive::parse),
            keep_alive: response.ping_active,
        })
    }

    #[instrument(skip(self))]
    async fn report_status(&self, status: SessionStatus, detail: &str) -> BridgeResult<()> {
        let body = StatusRequest {
            status: status.as_str().to_string(),
            detail: detail.to_string(),
        };
        self.post_json("/status", &body).await
    }

    #[instrument(skip(self))]
    async fn report_unit_id(&self, unit_id: u16) -> BridgeResult<()> {
        self.post_json("/unit-id", &UnitIdRequest { unit_id }).await
    }

    #[instrument(skip(self))]
    async fn fetch_security_key(&self, unit_id: u16) -> BridgeResult<Option<Vec<u8>>> {
        match self
            .get_json::<SecurityKeyResponse>(&format!("/security-key/{}", unit_id))
            .await
        {
            Ok(response) => Ok(response.key.filter(|key| !key.is_empty())),
            Err(BridgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn report_unit_metadata(
        &self,
        unit_id: u16,
        records: &[MetadataRecord],
    ) -> BridgeResult<()> {
        let body = UnitMetadataRequest {
            unit_id,
            metadata: records.iter().map(MetadataEntry::from).collect(),
        };
        self.post_json("/unit-metadata", &body).await
    }

    async fn report_flash_progress(&self, progress: &FlashProgress) -> BridgeResult<()> {
        self.post_json("/flashing-progress", &FlashProgressRequest::from(progress))
            .await
    }

    #[instrument(skip(self))]
    async fn request_soft_reset(&self) -> BridgeResult<()> {
        let url = self.url("/soft-reset")?;
        let response = self.client.post(url).send().await.map_err(request_error)?;
        self.check_status(response).await
    }

    #[instrument(skip(self))]
    async fn fetch_firmware_archive(&self, unit_id: u16) -> BridgeResult<Bytes> {
        let url = self.url(&format!("/firmware/{}", unit_id))?;
        debug!("Downloading firmware archive from {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.extract_error(response, status).await);
        }

        let archive = response.bytes().await.map_err(request_error)?;
        debug!(bytes = archive.len(), "Firmware archive downloaded");
        Ok(archive)
    }
}
