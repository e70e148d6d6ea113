//! In-memory container engine used by unit tests

use super::types::{ContainerSummary, CreateContainerRequest, ImageSummary};
use super::ContainerEngine;
use crate::error::{MinimesosError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    name: String,
    running: bool,
}

#[derive(Default)]
struct FakeState {
    containers: Vec<FakeContainer>,
    images: HashSet<String>,
    pulled: Vec<String>,
    /// 1-based index of the create call that should fail, if any
    fail_create_at: Option<usize>,
    create_calls: usize,
    /// Every pull attempt fails
    fail_pull: bool,
    /// Started containers never reach the running state
    stall_start: bool,
    /// Container ids whose logs were requested
    log_requests: Vec<String>,
}

/// A `ContainerEngine` backed by in-process state.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
    next_id: AtomicUsize,
    /// IP address reported for every container
    pub ip: Mutex<String>,
}

impl FakeEngine {
    pub fn new() -> Self {
        let engine = Self::default();
        *engine.ip.lock().unwrap() = "172.17.0.2".to_string();
        engine
    }

    /// Pre-seed a locally available image.
    pub fn add_image(&self, image: &str, tag: &str) {
        self.state
            .lock()
            .unwrap()
            .images
            .insert(format!("{}:{}", image, tag));
    }

    /// Make the n-th (1-based) create call fail.
    pub fn fail_create_at(&self, n: usize) {
        self.state.lock().unwrap().fail_create_at = Some(n);
    }

    /// Make every pull attempt fail.
    pub fn fail_pull(&self) {
        self.state.lock().unwrap().fail_pull = true;
    }

    /// Accept start calls but never report the container as running.
    pub fn stall_start(&self) {
        self.state.lock().unwrap().stall_start = true;
    }

    /// Container ids whose logs were requested.
    pub fn log_requests(&self) -> Vec<String> {
        self.state.lock().unwrap().log_requests.clone()
    }

    /// Images pulled so far, as `image:tag`.
    pub fn pulled(&self) -> Vec<String> {
        self.state.lock().unwrap().pulled.clone()
    }

    /// Names of containers currently known to the engine.
    pub fn container_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Remove a container behind the orchestrator's back.
    pub fn remove_out_of_band(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .containers
            .retain(|c| c.id != id);
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .images
            .iter()
            .map(|tag| ImageSummary {
                id: format!("sha256:{}", tag),
                repo_tags: vec![tag.clone()],
            })
            .collect())
    }

    async fn pull_image(&self, image: &str, tag: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_pull {
            return Err(MinimesosError::Engine("injected pull failure".to_string()));
        }
        let full = format!("{}:{}", image, tag);
        state.pulled.push(full.clone());
        state.images.insert(full);
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        _request: &CreateContainerRequest,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if state.fail_create_at == Some(state.create_calls) {
            return Err(MinimesosError::Engine("injected create failure".to_string()));
        }
        let id = format!("container-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: name.to_string(),
            running: false,
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let stalled = state.stall_start;
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| MinimesosError::EngineNotFound(id.to_string()))?;
        container.running = !stalled;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.containers.len();
        state.containers.retain(|c| c.id != id);
        if state.containers.len() == before {
            return Err(MinimesosError::EngineNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .filter(|c| all || c.running)
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                names: vec![format!("/{}", c.name)],
                image: String::new(),
                state: if c.running { "running" } else { "created" }.to_string(),
            })
            .collect())
    }

    async fn ip_address(&self, id: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        if state.containers.iter().any(|c| c.id == id) {
            Ok(self.ip.lock().unwrap().clone())
        } else {
            Err(MinimesosError::EngineNotFound(id.to_string()))
        }
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .log_requests
            .push(id.to_string());
        Ok(String::new())
    }
}
