//! minimesos - an in-process Apache Mesos cluster on Docker
//!
//! minimesos provisions, wires together, monitors and tears down the
//! containers that make up a disposable Mesos cluster (ZooKeeper, a
//! Mesos master, agents, Marathon and optional auxiliary services).
//! It is meant to be driven either from the `minimesos` CLI or embedded
//! in a test suite:
//!
//! - Declarative cluster blueprints ([`cluster::ClusterArchitecture`])
//! - Per-container lifecycle management ([`container::ContainerHandle`])
//! - Cluster start/stop/destroy with readiness polling ([`cluster::MesosCluster`])
//! - Recovery of a running cluster across processes via a state file

pub mod cluster;
pub mod container;
pub mod docker;
pub mod error;
pub mod marathon;

pub use error::{MinimesosError, Result};
