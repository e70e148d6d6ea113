//! Cluster orchestration
//!
//! [`MesosCluster`] owns the realized containers of one cluster
//! instance. Starting realizes the architecture's specs in declaration
//! order, confirms aggregate readiness against the master, and leaves
//! every realized handle in a managed collection so teardown is
//! deterministic. Recovery after process death goes through the
//! persisted ClusterId and the engine's container listing instead of
//! any in-memory state.

use super::architecture::ClusterArchitecture;
use super::cleanup::{self, CleanupToken};
use super::readiness::ReadinessPoller;
use super::state_file::ClusterStateFile;
use crate::container::{ContainerHandle, ContainerRole, ContainerState, ResolvedDeps};
use crate::docker::types::ContainerSummary;
use crate::docker::ContainerEngine;
use crate::error::{MinimesosError, Result};
use crate::marathon::MarathonClient;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Default overall timeout for `start()`.
pub const DEFAULT_CLUSTER_TIMEOUT: Duration = Duration::from_secs(60);

/// Lightweight, copyable view of a managed container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub role: ContainerRole,
    pub name: String,
    pub container_id: Option<String>,
    pub ip_address: Option<String>,
    pub state: ContainerState,
}

/// Orchestrates the lifecycle of one emulated Mesos cluster.
pub struct MesosCluster {
    cluster_id: String,
    architecture: ClusterArchitecture,
    engine: Arc<dyn ContainerEngine>,
    containers: Arc<RwLock<Vec<ContainerHandle>>>,
    cleanup_token: Mutex<Option<CleanupToken>>,
}

impl MesosCluster {
    /// Create an orchestrator for the given blueprint. A fresh, random
    /// ClusterId is assigned and a teardown action is registered with
    /// the process-exit cleanup registry.
    pub fn new(architecture: ClusterArchitecture, engine: Arc<dyn ContainerEngine>) -> Self {
        let cluster_id = rand::random::<u32>().to_string();
        let cleanup_token = cleanup::global().register(&cluster_id, engine.clone());
        Self {
            cluster_id,
            architecture,
            engine,
            containers: Arc::new(RwLock::new(Vec::new())),
            cleanup_token: Mutex::new(Some(cleanup_token)),
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn architecture(&self) -> &ClusterArchitecture {
        &self.architecture
    }

    /// Start the cluster: realize every spec in order, then wait until
    /// the master reports all agents activated.
    ///
    /// A single container failing aborts the start with a fatal error
    /// carrying the cause; already-started containers are left running
    /// for inspection (no automatic rollback).
    pub async fn start(&self, timeout: Duration) -> Result<()> {
        if self.architecture.is_empty() {
            return Err(MinimesosError::InvalidConfig(
                "no cluster architecture specified".to_string(),
            ));
        }

        let mut deps = ResolvedDeps::new();
        for spec in self.architecture.specs().iter().cloned() {
            let role = spec.role;
            let mut handle = ContainerHandle::new(spec, &self.cluster_id, self.engine.clone());
            tracing::info!("Starting {} container [{}]", role, handle.name());

            if let Err(e) = handle.start(timeout, &deps).await {
                let name = handle.name().to_string();
                tracing::error!("Failed to start {} container [{}]: {}", role, name, e);
                return Err(MinimesosError::start_failure(&name, e));
            }

            if let Some(ip) = handle.ip_address() {
                deps.record(role, ip);
            }
            self.add_handle(handle)?;
        }

        let state_url = self.state_url()?;
        ReadinessPoller::new(&state_url, self.architecture.worker_count())
            .wait_until_ready(timeout)
            .await?;

        tracing::info!("Cluster {} is up", self.cluster_id);
        Ok(())
    }

    /// Start one ad hoc container and add it to the managed collection
    /// so it is cleaned up with the cluster. Returns the container id.
    pub async fn add_and_start_container(
        &self,
        mut handle: ContainerHandle,
        timeout: Duration,
    ) -> Result<String> {
        let deps = self.realized_deps()?;
        tracing::debug!("Starting {} container [{}]", handle.role(), handle.name());

        if let Err(e) = handle.start(timeout, &deps).await {
            let name = handle.name().to_string();
            return Err(MinimesosError::start_failure(&name, e));
        }

        let id = handle.container_id().unwrap_or_default().to_string();
        self.add_handle(handle)?;
        Ok(id)
    }

    /// Best-effort teardown: every managed handle is offered a removal
    /// attempt, failures are logged, and the collection is cleared.
    /// Calling `stop()` twice is harmless.
    pub async fn stop(&self) {
        let handles: Vec<ContainerHandle> = {
            match self.containers.write() {
                Ok(mut containers) => std::mem::take(&mut *containers),
                Err(_) => {
                    tracing::warn!("Managed container collection lock poisoned; skipping stop");
                    return;
                }
            }
        };

        for mut handle in handles {
            tracing::debug!("Removing container [{:?}]", handle.container_id());
            if let Err(e) = handle.remove().await {
                tracing::warn!("Cannot remove container {}: {}", handle.name(), e);
            }
        }

        if let Ok(mut token) = self.cleanup_token.lock() {
            if let Some(token) = token.take() {
                cleanup::global().deregister(token);
            }
        }
    }

    /// Copyable views of all managed containers, in realization order.
    pub fn containers(&self) -> Result<Vec<ContainerInfo>> {
        let containers = self
            .containers
            .read()
            .map_err(|_| MinimesosError::Lock("container collection".to_string()))?;
        Ok(containers.iter().map(container_info).collect())
    }

    /// The one managed container with the given role.
    pub fn find_by_role(&self, role: ContainerRole) -> Result<ContainerInfo> {
        self.containers()?
            .into_iter()
            .find(|c| c.role == role)
            .ok_or_else(|| MinimesosError::NotFound(format!("no {} container in cluster", role)))
    }

    /// All managed containers with the given role.
    pub fn filter_by_role(&self, role: ContainerRole) -> Result<Vec<ContainerInfo>> {
        Ok(self
            .containers()?
            .into_iter()
            .filter(|c| c.role == role)
            .collect())
    }

    pub fn master(&self) -> Result<ContainerInfo> {
        self.find_by_role(ContainerRole::Master)
    }

    pub fn zookeeper(&self) -> Result<ContainerInfo> {
        self.find_by_role(ContainerRole::ZooKeeper)
    }

    pub fn marathon(&self) -> Result<ContainerInfo> {
        self.find_by_role(ContainerRole::Marathon)
    }

    /// ZooKeeper connection string for the realized cluster.
    pub fn zk_url(&self) -> Result<String> {
        let zookeeper = self.zookeeper()?;
        let ip = zookeeper
            .ip_address
            .ok_or_else(|| MinimesosError::NotFound("zookeeper has no address".to_string()))?;
        Ok(format!("zk://{}:2181", ip))
    }

    /// URL of the master's state endpoint.
    pub fn state_url(&self) -> Result<String> {
        let containers = self
            .containers
            .read()
            .map_err(|_| MinimesosError::Lock("container collection".to_string()))?;
        let master = containers
            .iter()
            .find(|h| h.role() == ContainerRole::Master)
            .ok_or_else(|| MinimesosError::NotFound("no master container in cluster".to_string()))?;
        let ip = master
            .ip_address()
            .ok_or_else(|| MinimesosError::NotFound("master has no address".to_string()))?;
        Ok(format!("http://{}:{}/state.json", ip, master.spec().http_port))
    }

    /// Persist this cluster's id; fatal on failure.
    pub fn write_cluster_id(&self, state_file: &ClusterStateFile) -> Result<()> {
        state_file.write(&self.cluster_id)
    }

    fn add_handle(&self, handle: ContainerHandle) -> Result<()> {
        self.containers
            .write()
            .map_err(|_| MinimesosError::Lock("container collection".to_string()))?
            .push(handle);
        Ok(())
    }

    /// Dependency addresses of the already-realized handles, in
    /// realization order (first realization of a role wins).
    fn realized_deps(&self) -> Result<ResolvedDeps> {
        let containers = self
            .containers
            .read()
            .map_err(|_| MinimesosError::Lock("container collection".to_string()))?;
        let mut deps = ResolvedDeps::new();
        for handle in containers.iter() {
            if let Some(ip) = handle.ip_address() {
                deps.record(handle.role(), ip);
            }
        }
        Ok(deps)
    }
}

fn container_info(handle: &ContainerHandle) -> ContainerInfo {
    ContainerInfo {
        role: handle.role(),
        name: handle.name().to_string(),
        container_id: handle.container_id().map(str::to_string),
        ip_address: handle.ip_address().map(str::to_string),
        state: handle.state(),
    }
}

/// Force-remove every container whose name embeds `cluster_id`.
/// This is the role-agnostic recovery path: it consults only the
/// engine's listing, never in-memory state. Returns the removal count.
pub async fn destroy_containers(engine: &dyn ContainerEngine, cluster_id: &str) -> Result<usize> {
    let containers = engine.list_containers(true).await?;
    let mut removed = 0;
    for container in &containers {
        if container.name_contains(cluster_id) {
            match engine.remove_container(&container.id).await {
                Ok(()) | Err(MinimesosError::EngineNotFound(_)) => removed += 1,
                Err(e) => tracing::warn!("Cannot remove container {}: {}", container.id, e),
            }
        }
    }
    tracing::info!("Destroyed minimesos cluster {}", cluster_id);
    Ok(removed)
}

/// Find a cluster container by naming convention, entirely from the
/// engine's listing.
pub async fn find_container(
    engine: &dyn ContainerEngine,
    cluster_id: &str,
    role: ContainerRole,
) -> Result<Option<ContainerSummary>> {
    let containers = engine.list_containers(true).await?;
    Ok(containers.into_iter().find(|c| {
        c.name_contains(&format!("minimesos-{}", role)) && c.name_contains(&format!("{}-", cluster_id))
    }))
}

/// The engine-assigned address of a cluster container found by role.
pub async fn container_ip(
    engine: &dyn ContainerEngine,
    cluster_id: &str,
    role: ContainerRole,
) -> Result<Option<String>> {
    match find_container(engine, cluster_id, role).await? {
        Some(container) => Ok(Some(engine.ip_address(&container.id).await?)),
        None => Ok(None),
    }
}

/// Whether a master container of the given cluster is running.
pub async fn is_up(engine: &dyn ContainerEngine, cluster_id: &str) -> bool {
    match engine.list_containers(false).await {
        Ok(containers) => containers
            .iter()
            .any(|c| c.name_contains(&format!("minimesos-master-{}", cluster_id))),
        Err(_) => false,
    }
}

/// Destroy a previously started cluster using the persisted record:
/// kill deployed Marathon apps, remove every matching container and
/// delete the record. With no record this is a friendly no-op.
pub async fn destroy(engine: &dyn ContainerEngine, state_file: &ClusterStateFile) -> Result<()> {
    let Some(cluster_id) = state_file.read() else {
        tracing::info!("Minimesos cluster is not running");
        return Ok(());
    };

    if let Ok(Some(marathon_ip)) = container_ip(engine, &cluster_id, ContainerRole::Marathon).await
    {
        if let Err(e) = MarathonClient::new(&marathon_ip).kill_all_apps().await {
            tracing::warn!("Could not kill Marathon apps: {}", e);
        }
    }

    destroy_containers(engine, &cluster_id).await?;
    state_file.delete();
    Ok(())
}

/// Self-healing of stale records: when the persisted cluster is not
/// actually running, the record is deleted.
pub async fn check_state_file(engine: &dyn ContainerEngine, state_file: &ClusterStateFile) {
    if let Some(cluster_id) = state_file.read() {
        if !is_up(engine, &cluster_id).await {
            state_file.delete();
            tracing::info!("Invalid cluster state file removed");
        }
    }
}

/// Fetch the raw `state.json` of the cluster's master.
pub async fn cluster_state_info(
    engine: &dyn ContainerEngine,
    cluster_id: &str,
) -> Result<String> {
    let container = find_container(engine, cluster_id, ContainerRole::Master)
        .await?
        .ok_or_else(|| {
            MinimesosError::NotFound(format!("no master container in cluster {}", cluster_id))
        })?;
    container_state_info(engine, &container.id).await
}

/// Fetch the raw Mesos state of one cluster container by id; the port
/// follows from the container's role in its name.
pub async fn container_state_info(engine: &dyn ContainerEngine, container_id: &str) -> Result<String> {
    let containers = engine.list_containers(true).await?;
    let container = containers
        .iter()
        .find(|c| c.id == container_id)
        .ok_or_else(|| MinimesosError::NotFound(format!("container {}", container_id)))?;

    let port = if container.name_contains("minimesos-agent-") {
        crate::container::spec::MESOS_AGENT_PORT
    } else {
        crate::container::spec::MESOS_MASTER_PORT
    };
    let ip = engine.ip_address(container_id).await?;
    let url = format!("http://{}:{}/state.json", ip, port);

    let response = reqwest::get(&url)
        .await
        .map_err(|e| MinimesosError::Network(format!("failed to retrieve state from {}: {}", url, e)))?;
    response
        .text()
        .await
        .map_err(|e| MinimesosError::Network(e.to_string()))
}
