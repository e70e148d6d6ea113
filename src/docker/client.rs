//! Docker Engine HTTP API client

use super::types::{
    ContainerInspect, ContainerSummary, CreateContainerRequest, CreateContainerResponse,
    ImageSummary,
};
use super::ContainerEngine;
use crate::error::{MinimesosError, Result};
use async_trait::async_trait;

/// Default engine endpoint when `DOCKER_HOST` is not set.
pub const DEFAULT_DOCKER_HOST: &str = "http://localhost:2375";

/// Client for the Docker Engine HTTP API.
pub struct DockerClient {
    /// Engine endpoint, e.g. `http://localhost:2375`
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl DockerClient {
    /// Create a client against an explicit engine endpoint.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a client from the `DOCKER_HOST` environment variable,
    /// falling back to [`DEFAULT_DOCKER_HOST`].
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("DOCKER_HOST")
            .map(|h| normalize_docker_host(&h))
            .unwrap_or_else(|_| DEFAULT_DOCKER_HOST.to_string());
        Self::new(&host)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(&self, response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MinimesosError::EngineNotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MinimesosError::Engine(format!(
                "{} failed: {} {}",
                what, status, body
            )));
        }
        Ok(response)
    }
}

/// `tcp://host:port` (docker-machine style) becomes `http://host:port`.
fn normalize_docker_host(host: &str) -> String {
    if let Some(rest) = host.strip_prefix("tcp://") {
        format!("http://{}", rest)
    } else {
        host.to_string()
    }
}

/// Strip the 8-byte frame headers of Docker's multiplexed log stream,
/// concatenating stdout and stderr payloads in arrival order.
pub fn demux_log_stream(raw: &[u8]) -> String {
    let mut output = String::new();
    let mut rest = raw;
    while rest.len() >= 8 {
        let size = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let end = (8 + size).min(rest.len());
        output.push_str(&String::from_utf8_lossy(&rest[8..end]));
        rest = &rest[end..];
    }
    // A stream without frame headers (tty mode) is passed through as-is.
    if output.is_empty() && !raw.is_empty() {
        return String::from_utf8_lossy(raw).into_owned();
    }
    output
}

#[async_trait]
impl ContainerEngine for DockerClient {
    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let response = self
            .client
            .get(self.url("/images/json"))
            .send()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        let response = self.check(response, "list images").await?;
        response
            .json()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))
    }

    async fn pull_image(&self, image: &str, tag: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/images/create"))
            .query(&[("fromImage", image), ("tag", tag)])
            .send()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        let response = self.check(response, "pull image").await?;
        // The engine streams pull progress; drain it so the pull completes.
        response
            .bytes()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        request: &CreateContainerRequest,
    ) -> Result<String> {
        let response = self
            .client
            .post(self.url("/containers/create"))
            .query(&[("name", name)])
            .json(request)
            .send()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        let response = self.check(response, "create container").await?;
        let created: CreateContainerResponse = response
            .json()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;
        Ok(created.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/containers/{}/start", id)))
            .send()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        self.check(response, "start container").await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/containers/{}", id)))
            .query(&[("force", "true"), ("v", "true")])
            .send()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        self.check(response, id).await?;
        Ok(())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let response = self
            .client
            .get(self.url("/containers/json"))
            .query(&[("all", if all { "true" } else { "false" })])
            .send()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        let response = self.check(response, "list containers").await?;
        response
            .json()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))
    }

    async fn ip_address(&self, id: &str) -> Result<String> {
        let response = self
            .client
            .get(self.url(&format!("/containers/{}/json", id)))
            .send()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        let response = self.check(response, id).await?;
        let inspect: ContainerInspect = response
            .json()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;
        Ok(inspect.network_settings.ip_address)
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        let response = self
            .client
            .get(self.url(&format!("/containers/{}/logs", id)))
            .query(&[("stdout", "true"), ("stderr", "true")])
            .send()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        let response = self.check(response, id).await?;
        let raw = response
            .bytes()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;
        Ok(demux_log_stream(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_host_tcp_scheme_is_rewritten() {
        assert_eq!(
            normalize_docker_host("tcp://192.168.99.100:2376"),
            "http://192.168.99.100:2376"
        );
        assert_eq!(
            normalize_docker_host("http://localhost:2375"),
            "http://localhost:2375"
        );
    }

    #[test]
    fn multiplexed_frames_are_stripped() {
        // stdout frame "hello\n" followed by stderr frame "oops\n"
        let mut raw = vec![1u8, 0, 0, 0, 0, 0, 0, 6];
        raw.extend_from_slice(b"hello\n");
        raw.extend_from_slice(&[2u8, 0, 0, 0, 0, 0, 0, 5]);
        raw.extend_from_slice(b"oops\n");

        assert_eq!(demux_log_stream(&raw), "hello\noops\n");
    }

    #[test]
    fn tty_stream_passes_through() {
        assert_eq!(demux_log_stream(b"plain"), "plain");
        assert_eq!(demux_log_stream(b""), "");
    }
}
