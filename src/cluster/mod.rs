//! Cluster orchestration
//!
//! This module owns the lifecycle of one emulated Mesos cluster: the
//! declarative blueprint ([`ClusterArchitecture`]), the orchestrator
//! realizing it ([`MesosCluster`]), the readiness protocol deciding
//! when the cluster is up ([`ReadinessPoller`]), the persisted cluster
//! record ([`ClusterStateFile`]) and the process-exit cleanup registry.

pub mod architecture;
pub mod cleanup;
pub mod orchestrator;
pub mod readiness;
pub mod state_file;

pub use architecture::{ArchitectureBuilder, ClusterArchitecture};
pub use orchestrator::{
    check_state_file, cluster_state_info, container_ip, container_state_info, destroy,
    destroy_containers, find_container, is_up, ContainerInfo, MesosCluster,
};
pub use readiness::ReadinessPoller;
pub use state_file::{host_dir, ClusterStateFile};
