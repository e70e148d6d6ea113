//! Container lifecycle management

use super::spec::{ContainerSpec, ResolvedDeps};
use crate::docker::ContainerEngine;
use crate::error::{MinimesosError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Interval of the running-confirmation poll.
const RUN_CONFIRMATION_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle state of a managed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Not yet realized
    Pending,
    /// Image pull in progress
    Pulling,
    /// Created but not started
    Created,
    /// Started, running not yet confirmed
    Starting,
    /// Confirmed running by the engine
    Running,
    /// Realization failed
    Failed,
    /// Removed from the engine
    Removed,
}

/// Wraps the full lifecycle of exactly one container: image pull,
/// creation, start, running confirmation, address lookup and removal.
///
/// A handle is owned exclusively by the cluster that created it.
pub struct ContainerHandle {
    spec: ContainerSpec,
    name: String,
    engine: Arc<dyn ContainerEngine>,
    container_id: Option<String>,
    ip_address: Option<String>,
    state: ContainerState,
    removed: bool,
}

impl ContainerHandle {
    /// Create a pending handle. The container name embeds the role, the
    /// cluster id and a random disambiguator so concurrent clusters on
    /// one host cannot collide.
    pub fn new(spec: ContainerSpec, cluster_id: &str, engine: Arc<dyn ContainerEngine>) -> Self {
        let name = format!(
            "minimesos-{}-{}-{:08x}",
            spec.role,
            cluster_id,
            rand::random::<u32>()
        );
        Self {
            spec,
            name,
            engine,
            container_id: None,
            ip_address: None,
            state: ContainerState::Pending,
            removed: false,
        }
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> super::ContainerRole {
        self.spec.role
    }

    /// Runtime container id; absent until created.
    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    /// Engine-assigned address; absent until running.
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Ensure the spec's `image:tag` exists locally; a pull failure is
    /// reported but does not abort (creation will fail instead).
    pub async fn pull_image(&mut self) -> Result<()> {
        let images = self.engine.list_images().await?;
        if images
            .iter()
            .any(|i| i.has_tag(&self.spec.image, &self.spec.tag))
        {
            tracing::debug!(
                "Image {} already exists, no need to pull",
                self.spec.image_ref()
            );
            return Ok(());
        }

        tracing::info!("Image {} not found, pulling...", self.spec.image_ref());
        self.state = ContainerState::Pulling;
        if let Err(e) = self.engine.pull_image(&self.spec.image, &self.spec.tag).await {
            tracing::error!("Failed to pull {}: {}", self.spec.image_ref(), e);
        }
        Ok(())
    }

    /// Pull, create and start the container, then wait until the engine
    /// reports it running, up to `timeout`.
    ///
    /// Start confirmation is best-effort: on timeout the container's
    /// output is logged and the handle is left in whatever state the
    /// engine reports. The cluster readiness poll is the strict gate.
    pub async fn start(&mut self, timeout: Duration, deps: &ResolvedDeps) -> Result<()> {
        self.pull_image().await?;

        let request = self.spec.resolve(deps)?;
        tracing::debug!("Creating container [{}]", self.name);
        let id = match self.engine.create_container(&self.name, &request).await {
            Ok(id) => id,
            Err(e) => {
                self.state = ContainerState::Failed;
                return Err(e);
            }
        };
        self.container_id = Some(id.clone());
        self.state = ContainerState::Created;

        if let Err(e) = self.engine.start_container(&id).await {
            self.state = ContainerState::Failed;
            return Err(e);
        }
        self.state = ContainerState::Starting;

        if self.await_running(&id, timeout).await {
            self.state = ContainerState::Running;
            tracing::debug!("Container [{}] is up and running", self.name);
        } else {
            tracing::error!(
                "Container [{}] did not reach running within {:?}",
                self.name,
                timeout
            );
            match self.engine.container_logs(&id).await {
                Ok(logs) => tracing::error!("Container [{}] output:\n{}", self.name, logs),
                Err(e) => tracing::error!("Could not fetch container logs: {}", e),
            }
        }

        self.ip_address = Some(self.engine.ip_address(&id).await?);
        Ok(())
    }

    /// Poll the engine's running list for this container id, once per
    /// second, until `timeout` elapses. Engine errors count as retries.
    async fn await_running(&self, id: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let running = self
                .engine
                .list_containers(false)
                .await
                .map(|containers| containers.iter().any(|c| c.id == id))
                .unwrap_or(false);
            if running {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(RUN_CONFIRMATION_INTERVAL).await;
        }
    }

    /// Force-remove the container and its volumes. A container the
    /// engine no longer knows counts as removed.
    pub async fn remove(&mut self) -> Result<()> {
        let Some(id) = self.container_id.clone() else {
            // Never created; nothing to remove.
            self.removed = true;
            self.state = ContainerState::Removed;
            return Ok(());
        };

        match self.engine.remove_container(&id).await {
            Ok(()) => {}
            Err(MinimesosError::EngineNotFound(_)) => {
                tracing::debug!("Container [{}] already removed", self.name);
            }
            Err(e) => return Err(e),
        }
        self.removed = true;
        self.state = ContainerState::Removed;
        Ok(())
    }
}

impl std::fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("name", &self.name)
            .field("container_id", &self.container_id)
            .field("state", &self.state)
            .finish()
    }
}
