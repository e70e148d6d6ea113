//! Container blueprints
//!
//! Specs are pure data: anything that depends on an already-realized
//! container (the ZooKeeper address, mostly) is expressed as an
//! [`EnvValue::DependencyAddress`] or extra-host entry naming the role
//! it needs, and resolved by the orchestrator at realization time.

use crate::docker::{CreateContainerRequest, HostConfig};
use crate::error::{MinimesosError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default Mesos master/agent image tag.
pub const MESOS_IMAGE_TAG: &str = "0.25.0-0.2.70.ubuntu1404";
/// Default Marathon image tag.
pub const MARATHON_IMAGE_TAG: &str = "v0.8.1";
/// Default ZooKeeper image tag.
pub const ZOOKEEPER_IMAGE_TAG: &str = "3.4.5";

/// Default agent resource offer.
pub const DEFAULT_AGENT_RESOURCES: &str =
    "ports(*):[31000-32000]; cpus(*):0.2; mem(*):256; disk(*):200";

pub const MESOS_MASTER_PORT: u16 = 5050;
pub const MESOS_AGENT_PORT: u16 = 5051;
pub const MARATHON_PORT: u16 = 8080;
pub const ZOOKEEPER_PORT: u16 = 2181;
pub const CONSUL_PORT: u16 = 8500;

/// The logical function of a container within the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRole {
    /// Coordination service
    ZooKeeper,
    /// Cluster leader
    Master,
    /// Worker process
    Agent,
    /// Framework service
    Marathon,
    /// Auxiliary service
    Consul,
}

impl ContainerRole {
    /// Role name as embedded in container names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerRole::ZooKeeper => "zookeeper",
            ContainerRole::Master => "master",
            ContainerRole::Agent => "agent",
            ContainerRole::Marathon => "marathon",
            ContainerRole::Consul => "consul",
        }
    }

    /// The externally queried HTTP (or client) port of this role.
    pub fn default_port(&self) -> u16 {
        match self {
            ContainerRole::ZooKeeper => ZOOKEEPER_PORT,
            ContainerRole::Master => MESOS_MASTER_PORT,
            ContainerRole::Agent => MESOS_AGENT_PORT,
            ContainerRole::Marathon => MARATHON_PORT,
            ContainerRole::Consul => CONSUL_PORT,
        }
    }
}

impl std::fmt::Display for ContainerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An environment value, possibly parameterized by a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    /// A fixed value
    Literal(String),
    /// A template rendered with the IP address of an already-realized
    /// container of `role`; `{ip}` marks the substitution point.
    DependencyAddress { role: ContainerRole, template: String },
}

impl EnvValue {
    fn resolve(&self, deps: &ResolvedDeps) -> Result<String> {
        match self {
            EnvValue::Literal(value) => Ok(value.clone()),
            EnvValue::DependencyAddress { role, template } => {
                let ip = deps.ip_of(*role)?;
                Ok(template.replace("{ip}", ip))
            }
        }
    }
}

/// IP addresses of already-realized containers, indexed by role.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDeps {
    ips: HashMap<ContainerRole, String>,
}

impl ResolvedDeps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the address of a realized container. First realization of
    /// a role wins; dependents link against it.
    pub fn record(&mut self, role: ContainerRole, ip: &str) {
        self.ips.entry(role).or_insert_with(|| ip.to_string());
    }

    pub fn ip_of(&self, role: ContainerRole) -> Result<&str> {
        self.ips
            .get(&role)
            .map(String::as_str)
            .ok_or_else(|| MinimesosError::NotFound(format!("no realized {} container", role)))
    }
}

/// Declarative blueprint for one cluster container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub role: ContainerRole,
    pub image: String,
    pub tag: String,
    /// Environment variables, keys unique
    pub env: HashMap<String, EnvValue>,
    pub cmd: Vec<String>,
    /// Container ports to expose
    pub exposed_ports: Vec<u16>,
    /// Container ports to also bind on the host
    pub published_ports: Vec<u16>,
    /// Host binds, `host:container` form
    pub binds: Vec<String>,
    /// Extra hosts entries resolved from a dependency role's IP
    pub extra_hosts: Vec<(String, ContainerRole)>,
    pub privileged: bool,
    /// Share the host PID namespace
    pub pid_host: bool,
    /// Roles whose handles must be realized before this spec
    pub depends_on: Vec<ContainerRole>,
    /// Port used for readiness/state queries, defaults per role
    pub http_port: u16,
}

impl ContainerSpec {
    pub fn new(role: ContainerRole, image: &str, tag: &str) -> Self {
        Self {
            role,
            image: image.to_string(),
            tag: tag.to_string(),
            env: HashMap::new(),
            cmd: Vec::new(),
            exposed_ports: Vec::new(),
            published_ports: Vec::new(),
            binds: Vec::new(),
            extra_hosts: Vec::new(),
            privileged: false,
            pid_host: false,
            depends_on: Vec::new(),
            http_port: role.default_port(),
        }
    }

    /// Add a fixed environment variable.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env
            .insert(key.to_string(), EnvValue::Literal(value.to_string()));
        self
    }

    /// Add an environment variable rendered from a dependency's IP.
    pub fn env_from(mut self, key: &str, role: ContainerRole, template: &str) -> Self {
        self.env.insert(
            key.to_string(),
            EnvValue::DependencyAddress {
                role,
                template: template.to_string(),
            },
        );
        self.depends_on.push(role);
        self
    }

    pub fn cmd(mut self, cmd: &[&str]) -> Self {
        self.cmd = cmd.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn expose(mut self, port: u16) -> Self {
        self.exposed_ports.push(port);
        self
    }

    pub fn publish(mut self, port: u16) -> Self {
        self.published_ports.push(port);
        self
    }

    pub fn bind(mut self, bind: &str) -> Self {
        self.binds.push(bind.to_string());
        self
    }

    /// Add an `/etc/hosts` entry pointing at a dependency's IP.
    pub fn extra_host(mut self, hostname: &str, role: ContainerRole) -> Self {
        self.extra_hosts.push((hostname.to_string(), role));
        self.depends_on.push(role);
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn pid_host(mut self) -> Self {
        self.pid_host = true;
        self
    }

    /// Override the readiness/state query port.
    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// `image:tag` reference.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Resolve this spec against the realized dependencies into the
    /// engine's create request. Fails with a not-found error when a
    /// declared dependency has not been realized.
    pub fn resolve(&self, deps: &ResolvedDeps) -> Result<CreateContainerRequest> {
        let mut env: Vec<String> = Vec::with_capacity(self.env.len());
        for (key, value) in &self.env {
            env.push(format!("{}={}", key, value.resolve(deps)?));
        }
        env.sort();

        let mut extra_hosts = Vec::with_capacity(self.extra_hosts.len());
        for (hostname, role) in &self.extra_hosts {
            extra_hosts.push(format!("{}:{}", hostname, deps.ip_of(*role)?));
        }

        let mut request = CreateContainerRequest {
            image: self.image_ref(),
            env,
            cmd: self.cmd.clone(),
            exposed_ports: HashMap::new(),
            host_config: HostConfig {
                binds: self.binds.clone(),
                port_bindings: HashMap::new(),
                privileged: self.privileged,
                pid_mode: if self.pid_host {
                    "host".to_string()
                } else {
                    String::new()
                },
                extra_hosts,
            },
        };
        for port in &self.exposed_ports {
            request.expose(*port);
        }
        for port in &self.published_ports {
            request.publish(*port);
        }
        Ok(request)
    }

    /// ZooKeeper blueprint (coordination service).
    pub fn zookeeper(tag: &str) -> Self {
        Self::new(ContainerRole::ZooKeeper, "jplock/zookeeper", tag).expose(ZOOKEEPER_PORT)
    }

    /// Mesos master blueprint (cluster leader).
    pub fn mesos_master(tag: &str, exposed_host_port: bool) -> Self {
        let spec = Self::new(ContainerRole::Master, "containersol/mesos-master", tag)
            .env("MESOS_QUORUM", "1")
            .env("MESOS_LOG_DIR", "/var/log")
            .env("MESOS_WORK_DIR", "/tmp/mesos")
            .env_from(
                "MESOS_ZK",
                ContainerRole::ZooKeeper,
                "zk://{ip}:2181/mesos",
            );
        if exposed_host_port {
            spec.publish(MESOS_MASTER_PORT)
        } else {
            spec.expose(MESOS_MASTER_PORT)
        }
    }

    /// Mesos agent blueprint (worker).
    pub fn mesos_agent(tag: &str, resources: &str) -> Self {
        let mut spec = Self::new(ContainerRole::Agent, "containersol/mesos-agent", tag)
            .env("MESOS_LOG_DIR", "/var/log")
            .env("MESOS_WORK_DIR", "/tmp/mesos")
            .env("MESOS_SWITCH_USER", "false")
            .env("MESOS_CONTAINERIZERS", "docker,mesos")
            .env("MESOS_PORT", &MESOS_AGENT_PORT.to_string())
            .env("MESOS_RESOURCES", resources)
            .env_from(
                "MESOS_MASTER",
                ContainerRole::ZooKeeper,
                "zk://{ip}:2181/mesos",
            )
            .privileged()
            .pid_host()
            .bind("/var/lib/docker:/var/lib/docker")
            .bind("/sys/fs/cgroup:/sys/fs/cgroup")
            .bind("/var/run/docker.sock:/var/run/docker.sock")
            .bind(&format!("{}:/usr/bin/docker", docker_binary_path()))
            .expose(MESOS_AGENT_PORT);
        for port in parse_ports_from_resources(resources) {
            spec = spec.expose(port);
        }
        spec
    }

    /// Marathon blueprint (framework service).
    pub fn marathon(tag: &str, exposed_host_port: bool) -> Self {
        let spec = Self::new(ContainerRole::Marathon, "mesosphere/marathon", tag)
            .extra_host("minimesos-zookeeper", ContainerRole::ZooKeeper)
            .cmd(&[
                "--master",
                "zk://minimesos-zookeeper:2181/mesos",
                "--zk",
                "zk://minimesos-zookeeper:2181/marathon",
            ]);
        if exposed_host_port {
            spec.publish(MARATHON_PORT)
        } else {
            spec.expose(MARATHON_PORT)
        }
    }

    /// Consul blueprint (auxiliary service).
    pub fn consul() -> Self {
        Self::new(ContainerRole::Consul, "progrium/consul", "latest")
            .cmd(&["-server", "-bootstrap"])
            .expose(CONSUL_PORT)
    }
}

/// Host path of the docker binary bound into agent containers.
fn docker_binary_path() -> String {
    for candidate in ["/usr/bin/docker", "/usr/local/bin/docker"] {
        if Path::new(candidate).exists() {
            return candidate.to_string();
        }
    }
    tracing::warn!(
        "Docker binary not found in /usr/bin or /usr/local/bin; \
         creating containers from agents will most likely fail"
    );
    "/usr/bin/docker".to_string()
}

/// Extract the port ranges of a Mesos resource string, e.g.
/// `ports(*):[31000-32000, 9200-9210]`, expanding small ranges so the
/// offered ports can be exposed on the container.
fn parse_ports_from_resources(resources: &str) -> Vec<u16> {
    let mut ports = Vec::new();
    let Some(start) = resources.find("ports(*):[") else {
        return ports;
    };
    let rest = &resources[start + "ports(*):[".len()..];
    let Some(end) = rest.find(']') else {
        return ports;
    };
    for range in rest[..end].split(',') {
        let range = range.trim();
        let (low, high) = match range.split_once('-') {
            Some((low, high)) => (low.trim(), high.trim()),
            None => (range, range),
        };
        if let (Ok(low), Ok(high)) = (low.parse::<u16>(), high.parse::<u16>()) {
            // Exposing tens of thousands of ports is pointless; expose
            // the range endpoints only when the range is large.
            if high.saturating_sub(low) <= 16 {
                ports.extend(low..=high);
            } else {
                ports.push(low);
                ports.push(high);
            }
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_env_resolves_without_deps() {
        let spec = ContainerSpec::zookeeper(ZOOKEEPER_IMAGE_TAG);
        let request = spec.resolve(&ResolvedDeps::new()).unwrap();
        assert_eq!(request.image, "jplock/zookeeper:3.4.5");
        assert!(request.exposed_ports.contains_key("2181/tcp"));
    }

    #[test]
    fn dependency_env_renders_realized_ip() {
        let spec = ContainerSpec::mesos_master(MESOS_IMAGE_TAG, false);
        let mut deps = ResolvedDeps::new();
        deps.record(ContainerRole::ZooKeeper, "172.17.0.2");

        let request = spec.resolve(&deps).unwrap();
        assert!(request
            .env
            .contains(&"MESOS_ZK=zk://172.17.0.2:2181/mesos".to_string()));
    }

    #[test]
    fn unresolved_dependency_is_not_found() {
        let spec = ContainerSpec::mesos_master(MESOS_IMAGE_TAG, false);
        let err = spec.resolve(&ResolvedDeps::new()).unwrap_err();
        assert!(matches!(err, MinimesosError::NotFound(_)));
    }

    #[test]
    fn marathon_extra_host_points_at_zookeeper() {
        let spec = ContainerSpec::marathon(MARATHON_IMAGE_TAG, false);
        let mut deps = ResolvedDeps::new();
        deps.record(ContainerRole::ZooKeeper, "172.17.0.2");

        let request = spec.resolve(&deps).unwrap();
        assert_eq!(
            request.host_config.extra_hosts,
            vec!["minimesos-zookeeper:172.17.0.2".to_string()]
        );
    }

    #[test]
    fn env_keys_are_unique() {
        let spec = ContainerSpec::zookeeper(ZOOKEEPER_IMAGE_TAG)
            .env("A", "1")
            .env("A", "2");
        let request = spec.resolve(&ResolvedDeps::new()).unwrap();
        assert_eq!(request.env, vec!["A=2".to_string()]);
    }

    #[test]
    fn first_realized_role_wins_dependency_resolution() {
        let mut deps = ResolvedDeps::new();
        deps.record(ContainerRole::ZooKeeper, "172.17.0.2");
        deps.record(ContainerRole::ZooKeeper, "172.17.0.9");
        assert_eq!(deps.ip_of(ContainerRole::ZooKeeper).unwrap(), "172.17.0.2");
    }

    #[test]
    fn resource_port_ranges_are_parsed() {
        let ports = parse_ports_from_resources("ports(*):[9204-9204, 9304-9304]; cpus(*):0.2");
        assert_eq!(ports, vec![9204, 9304]);

        let ports = parse_ports_from_resources(DEFAULT_AGENT_RESOURCES);
        assert_eq!(ports, vec![31000, 32000]);

        assert!(parse_ports_from_resources("cpus(*):0.2; mem(*):256").is_empty());
    }

    #[test]
    fn exposed_host_port_publishes_master_ui() {
        let spec = ContainerSpec::mesos_master(MESOS_IMAGE_TAG, true);
        let request = spec.resolve(&mock_zk_deps()).unwrap();
        assert!(request
            .host_config
            .port_bindings
            .contains_key("5050/tcp"));
    }

    fn mock_zk_deps() -> ResolvedDeps {
        let mut deps = ResolvedDeps::new();
        deps.record(ContainerRole::ZooKeeper, "172.17.0.2");
        deps
    }
}
