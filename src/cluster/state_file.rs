//! Persisted cluster record
//!
//! A started cluster writes its ClusterId to
//! `<hostDir>/.minimesos/minimesos.cluster` so later invocations (the
//! `destroy`, `info` and `state` commands, possibly in new processes)
//! can locate it. Absence of the record means "no cluster known from
//! this host directory", not proof that no containers exist.

use crate::error::{MinimesosError, Result};
use std::path::{Path, PathBuf};

/// Directory created under the host dir.
pub const MINIMESOS_DIR: &str = ".minimesos";

/// File holding the raw ClusterId string.
pub const CLUSTER_STATE_FILE: &str = "minimesos.cluster";

/// Environment variable overriding the host directory.
pub const MINIMESOS_HOST_DIR_ENV: &str = "MINIMESOS_HOST_DIR";

/// The host directory the cluster record lives under: the
/// `MINIMESOS_HOST_DIR` override or the current working directory.
pub fn host_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(MINIMESOS_HOST_DIR_ENV) {
        return PathBuf::from(dir);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// The on-disk ClusterId record.
#[derive(Debug, Clone)]
pub struct ClusterStateFile {
    path: PathBuf,
}

impl ClusterStateFile {
    pub fn new(host_dir: &Path) -> Self {
        Self {
            path: host_dir.join(MINIMESOS_DIR).join(CLUSTER_STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the ClusterId. A write failure is fatal; without the
    /// record the user has no way to recover the cluster's identity.
    pub fn write(&self, cluster_id: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                MinimesosError::StateFile(format!("failed to create {}: {}", dir.display(), e))
            })?;
        }
        std::fs::write(&self.path, cluster_id).map_err(|e| {
            MinimesosError::StateFile(format!("failed to write {}: {}", self.path.display(), e))
        })
    }

    /// Read the persisted ClusterId. Any failure, including simple
    /// absence, means "no cluster known".
    pub fn read(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .filter(|id| !id.is_empty())
    }

    /// Delete the record. Deleting an absent record is fine.
    pub fn delete(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::info!("Cannot remove cluster state file {}: {}", self.path.display(), e);
            }
        }
    }
}
