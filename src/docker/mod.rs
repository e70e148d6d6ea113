//! Docker Engine API client
//!
//! The orchestrator never talks to Docker directly; everything goes
//! through the [`ContainerEngine`] trait so the engine client can be
//! injected by the caller (and faked in tests).

pub mod client;
pub mod types;

#[cfg(test)]
pub mod fake;

use crate::error::Result;
use async_trait::async_trait;

pub use client::DockerClient;
pub use types::{ContainerSummary, CreateContainerRequest, HostConfig, ImageSummary, PortBinding};

/// Operations the orchestrator needs from a container engine.
///
/// All calls are request/response against the engine's HTTP API; none
/// of them block beyond a single round trip.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// List images known to the engine.
    async fn list_images(&self) -> Result<Vec<ImageSummary>>;

    /// Pull `image:tag` from its registry, waiting for completion.
    async fn pull_image(&self, image: &str, tag: &str) -> Result<()>;

    /// Create a container with the given name, returning its id.
    async fn create_container(&self, name: &str, request: &CreateContainerRequest)
        -> Result<String>;

    /// Start a created container.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Force-remove a container and its volumes.
    ///
    /// Returns [`crate::MinimesosError::EngineNotFound`] when the engine
    /// no longer knows the container.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// List containers; `all = false` restricts to running ones.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>>;

    /// The engine-assigned IP address of a container.
    async fn ip_address(&self, id: &str) -> Result<String>;

    /// Combined stdout/stderr of a container, demultiplexed.
    async fn container_logs(&self, id: &str) -> Result<String>;
}
