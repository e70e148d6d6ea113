//! Wire types for the Docker Engine API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry of `GET /images/json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "RepoTags", default)]
    pub repo_tags: Vec<String>,
}

impl ImageSummary {
    /// Exact `image:tag` membership check, as used by pull-if-absent.
    pub fn has_tag(&self, image: &str, tag: &str) -> bool {
        let wanted = format!("{}:{}", image, tag);
        self.repo_tags.iter().any(|t| t == &wanted)
    }
}

/// One entry of `GET /containers/json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: Vec<String>,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "State", default)]
    pub state: String,
}

impl ContainerSummary {
    /// Docker prefixes names with a slash; match ignoring it.
    pub fn name_contains(&self, needle: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.trim_start_matches('/').contains(needle))
    }
}

/// Body of `POST /containers/create`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateContainerRequest {
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Env", skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(rename = "Cmd", skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(rename = "ExposedPorts", skip_serializing_if = "HashMap::is_empty")]
    pub exposed_ports: HashMap<String, serde_json::Value>,
    #[serde(rename = "HostConfig")]
    pub host_config: HostConfig,
}

/// `HostConfig` section of a container create request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostConfig {
    #[serde(rename = "Binds", skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<String>,
    #[serde(rename = "PortBindings", skip_serializing_if = "HashMap::is_empty")]
    pub port_bindings: HashMap<String, Vec<PortBinding>>,
    #[serde(rename = "Privileged", skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
    #[serde(rename = "PidMode", skip_serializing_if = "String::is_empty")]
    pub pid_mode: String,
    #[serde(rename = "ExtraHosts", skip_serializing_if = "Vec::is_empty")]
    pub extra_hosts: Vec<String>,
}

/// One host-side binding of an exposed port.
#[derive(Debug, Clone, Serialize)]
pub struct PortBinding {
    #[serde(rename = "HostPort")]
    pub host_port: String,
}

impl CreateContainerRequest {
    /// Expose a container port (`ExposedPorts` key format is `port/tcp`).
    pub fn expose(&mut self, port: u16) {
        self.exposed_ports
            .insert(format!("{}/tcp", port), serde_json::json!({}));
    }

    /// Expose a container port and bind it to the same port on the host.
    pub fn publish(&mut self, port: u16) {
        self.expose(port);
        self.host_config.port_bindings.insert(
            format!("{}/tcp", port),
            vec![PortBinding {
                host_port: port.to_string(),
            }],
        );
    }
}

/// Response of `POST /containers/create`.
#[derive(Debug, Deserialize)]
pub struct CreateContainerResponse {
    #[serde(rename = "Id")]
    pub id: String,
}

/// Subset of `GET /containers/{id}/json` needed for address lookup.
#[derive(Debug, Deserialize)]
pub struct ContainerInspect {
    #[serde(rename = "NetworkSettings")]
    pub network_settings: NetworkSettings,
}

#[derive(Debug, Deserialize)]
pub struct NetworkSettings {
    #[serde(rename = "IPAddress", default)]
    pub ip_address: String,
}
