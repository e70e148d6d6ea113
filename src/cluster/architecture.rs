//! Cluster blueprints
//!
//! A [`ClusterArchitecture`] is an ordered, immutable sequence of
//! container specs, realized in declaration order. Specs may only
//! depend on roles declared before them, which keeps realization a
//! linear chain.

use crate::container::{ContainerRole, ContainerSpec};
use crate::error::{MinimesosError, Result};

/// The ordered, role-tagged blueprint for a cluster's containers.
#[derive(Debug, Clone)]
pub struct ClusterArchitecture {
    specs: Vec<ContainerSpec>,
}

impl ClusterArchitecture {
    /// The specs in realization order.
    pub fn specs(&self) -> &[ContainerSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// The first spec with the given role, if any.
    pub fn find(&self, role: ContainerRole) -> Option<&ContainerSpec> {
        self.specs.iter().find(|s| s.role == role)
    }

    /// All specs with the given role.
    pub fn filter(&self, role: ContainerRole) -> Vec<&ContainerSpec> {
        self.specs.iter().filter(|s| s.role == role).collect()
    }

    /// Number of worker (agent) specs; drives the readiness predicate.
    pub fn worker_count(&self) -> usize {
        self.filter(ContainerRole::Agent).len()
    }
}

/// Accumulates container specs in dependency order.
///
/// Accumulation is pure; validation happens at [`build`](Self::build)
/// and fails fast with a configuration error.
#[derive(Debug, Default)]
pub struct ArchitectureBuilder {
    specs: Vec<ContainerSpec>,
}

impl ArchitectureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary spec.
    pub fn with_spec(mut self, spec: ContainerSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn with_zookeeper(self, tag: &str) -> Self {
        self.with_spec(ContainerSpec::zookeeper(tag))
    }

    pub fn with_master(self, tag: &str, exposed_host_port: bool) -> Self {
        self.with_spec(ContainerSpec::mesos_master(tag, exposed_host_port))
    }

    pub fn with_marathon(self, tag: &str, exposed_host_port: bool) -> Self {
        self.with_spec(ContainerSpec::marathon(tag, exposed_host_port))
    }

    pub fn with_agent(self, tag: &str, resources: &str) -> Self {
        self.with_spec(ContainerSpec::mesos_agent(tag, resources))
    }

    /// Append `count` identical agents.
    pub fn with_agents(mut self, count: usize, tag: &str, resources: &str) -> Self {
        for _ in 0..count {
            self = self.with_agent(tag, resources);
        }
        self
    }

    pub fn with_consul(self) -> Self {
        self.with_spec(ContainerSpec::consul())
    }

    /// Validate and freeze the blueprint.
    ///
    /// A cluster needs at least a coordination service and a leader,
    /// and every spec's dependencies must be declared before it.
    pub fn build(self) -> Result<ClusterArchitecture> {
        if self.specs.iter().all(|s| s.role != ContainerRole::ZooKeeper) {
            return Err(MinimesosError::InvalidConfig(
                "cluster architecture requires a zookeeper container".to_string(),
            ));
        }
        if self.specs.iter().all(|s| s.role != ContainerRole::Master) {
            return Err(MinimesosError::InvalidConfig(
                "cluster architecture requires a mesos master container".to_string(),
            ));
        }

        for (position, spec) in self.specs.iter().enumerate() {
            for dep in &spec.depends_on {
                let declared_before = self.specs[..position].iter().any(|s| s.role == *dep);
                if !declared_before {
                    return Err(MinimesosError::InvalidConfig(format!(
                        "{} depends on {}, which is not declared before it",
                        spec.role, dep
                    )));
                }
            }
        }

        Ok(ClusterArchitecture { specs: self.specs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::spec::{
        DEFAULT_AGENT_RESOURCES, MARATHON_IMAGE_TAG, MESOS_IMAGE_TAG, ZOOKEEPER_IMAGE_TAG,
    };

    fn default_builder() -> ArchitectureBuilder {
        ArchitectureBuilder::new()
            .with_zookeeper(ZOOKEEPER_IMAGE_TAG)
            .with_master(MESOS_IMAGE_TAG, false)
            .with_marathon(MARATHON_IMAGE_TAG, false)
    }

    #[test]
    fn builder_counts_agents() {
        let architecture = default_builder()
            .with_agents(3, MESOS_IMAGE_TAG, DEFAULT_AGENT_RESOURCES)
            .build()
            .unwrap();

        // zookeeper + master + marathon + 3 agents
        assert_eq!(architecture.len(), 3 + 1 + 1 + 1);
        assert_eq!(architecture.worker_count(), 3);
    }

    #[test]
    fn zookeeper_and_master_are_required() {
        let err = ArchitectureBuilder::new()
            .with_master(MESOS_IMAGE_TAG, false)
            .build()
            .unwrap_err();
        assert!(matches!(err, MinimesosError::InvalidConfig(_)));

        let err = ArchitectureBuilder::new()
            .with_zookeeper(ZOOKEEPER_IMAGE_TAG)
            .build()
            .unwrap_err();
        assert!(matches!(err, MinimesosError::InvalidConfig(_)));
    }

    #[test]
    fn dependency_must_be_declared_first() {
        // master depends on zookeeper, declared after it
        let err = ArchitectureBuilder::new()
            .with_master(MESOS_IMAGE_TAG, false)
            .with_zookeeper(ZOOKEEPER_IMAGE_TAG)
            .build()
            .unwrap_err();
        assert!(matches!(err, MinimesosError::InvalidConfig(_)));
    }

    #[test]
    fn role_filter_finds_declared_specs() {
        let architecture = default_builder().build().unwrap();

        assert!(architecture.find(ContainerRole::Master).is_some());
        assert!(architecture.find(ContainerRole::ZooKeeper).is_some());
        assert!(architecture.find(ContainerRole::Consul).is_none());
        assert_eq!(architecture.filter(ContainerRole::Agent).len(), 0);
    }
}
