//! HTTP replication sink backed by the remote agent

use std::time::Duration;

use async_trait::async_trait;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use reqwest::StatusCode;
use tracing::debug;

use syncbox_core::ReplicationSink;
use syncbox_core::protocol::{CreateFileBody, DeleteFileBody, RenameFileBody, UpdateFileBody};

/// Replication sink that forwards each operation as one wire call to the
/// destination agent. Any non-200 response is a failure; response bodies
/// are not interpreted.
pub struct HttpSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSink {
    /// Create a sink for the agent at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Probe `GET /v1/health/live`; true only on a 200 response
    pub async fn is_live(&self) -> bool {
        let url = format!("{}/v1/health/live", self.base_url);
        match self.client.get(url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(err) => {
                debug!("liveness probe failed: {err}");
                false
            }
        }
    }

    /// Block until the agent reports live, probing every `retry_delay`
    pub async fn wait_until_live(&self, retry_delay: Duration) {
        while !self.is_live().await {
            tokio::time::sleep(retry_delay).await;
        }
    }

    fn file_url(&self) -> String {
        format!("{}/v1/file", self.base_url)
    }

    fn expect_ok(response: &reqwest::Response) -> Result<()> {
        if response.status() != StatusCode::OK {
            return Err(eyre!(
                "request failed with status code {}",
                response.status()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplicationSink for HttpSink {
    async fn create(&self, path: &str, data: &[u8], is_directory: bool) -> Result<()> {
        let body = CreateFileBody {
            path: path.to_string(),
            data: data.to_vec(),
            is_directory,
        };
        let response = self.client.post(self.file_url()).json(&body).send().await?;
        Self::expect_ok(&response)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let body = DeleteFileBody {
            path: path.to_string(),
        };
        let response = self
            .client
            .delete(self.file_url())
            .json(&body)
            .send()
            .await?;
        Self::expect_ok(&response)
    }

    async fn rename(&self, previous_path: &str, path: &str) -> Result<()> {
        let body = RenameFileBody {
            path: path.to_string(),
            previous_path: previous_path.to_string(),
        };
        let response = self
            .client
            .patch(self.file_url())
            .json(&body)
            .send()
            .await?;
        Self::expect_ok(&response)
    }

    async fn update(&self, path: &str, data: &[u8]) -> Result<()> {
        let body = UpdateFileBody {
            path: path.to_string(),
            data: data.to_vec(),
        };
        let response = self.client.put(self.file_url()).json(&body).send().await?;
        Self::expect_ok(&response)
    }
}
