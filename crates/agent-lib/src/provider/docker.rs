//! Docker Engine API workload counter
//!
//! Reads `ContainersRunning` from the engine's `/info` endpoint.

use super::{async_trait, WorkloadCounter};
use crate::error::ProviderError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::trace;
use url::Url;

pub const DEFAULT_DOCKER_HOST: &str = "http://127.0.0.1:2375";
pub const DEFAULT_DOCKER_API_VERSION: &str = "v1.29";

/// Subset of the engine's info document we rely on
#[derive(Debug, Deserialize)]
struct EngineInfo {
    #[serde(rename = "ContainersRunning")]
    containers_running: i64,
}

/// Counts running containers through the Docker Engine HTTP API
pub struct DockerInfoCounter {
    client: Client,
    info_url: Url,
}

impl DockerInfoCounter {
    /// Create a counter for `docker_host` (e.g. `http://127.0.0.1:2375`)
    pub fn new(
        docker_host: &str,
        api_version: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut base = Url::parse(docker_host)
            .map_err(|_| ProviderError::InvalidAddress(docker_host.to_string()))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ProviderError::InvalidAddress(docker_host.to_string()));
        }

        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let info_url = base
            .join(&format!("{}/info", api_version.trim_matches('/')))
            .map_err(|_| ProviderError::InvalidAddress(docker_host.to_string()))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        Ok(Self { client, info_url })
    }

    pub fn info_url(&self) -> &Url {
        &self.info_url
    }
}

#[async_trait]
impl WorkloadCounter for DockerInfoCounter {
    async fn running_workloads(&self) -> Result<i64, ProviderError> {
        trace!(url = %self.info_url, "Querying engine info");

        let response = self
            .client
            .get(self.info_url.clone())
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let info: EngineInfo = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(info.containers_running)
    }
}
