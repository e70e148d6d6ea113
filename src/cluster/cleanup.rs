//! Process-exit cleanup registry
//!
//! One process-wide, LIFO-ordered registry of teardown actions. Each
//! orchestrator registers a single "destroy everything named with my
//! ClusterId" action at construction and deregisters it on a
//! successful `stop()`. The registry is independent of the in-memory
//! managed collections, which do not survive abnormal termination; the
//! CLI drives it from its signal handler.

use crate::docker::ContainerEngine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

struct CleanupEntry {
    token: u64,
    cluster_id: String,
    engine: Arc<dyn ContainerEngine>,
}

/// Handle identifying one registered teardown action.
#[derive(Debug)]
pub struct CleanupToken(u64);

/// LIFO-ordered registry of per-cluster teardown actions.
#[derive(Default)]
pub struct CleanupRegistry {
    entries: Mutex<Vec<CleanupEntry>>,
    next_token: AtomicU64,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a teardown action for `cluster_id`. Actions run in
    /// reverse registration order.
    pub fn register(&self, cluster_id: &str, engine: Arc<dyn ContainerEngine>) -> CleanupToken {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push(CleanupEntry {
            token,
            cluster_id: cluster_id.to_string(),
            engine,
        });
        CleanupToken(token)
    }

    /// Remove a registered action; called after a successful `stop()`
    /// so a torn-down cluster is not destroyed twice.
    pub fn deregister(&self, token: CleanupToken) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|entry| entry.token != token.0);
    }

    /// Run all registered actions, most recently registered first, and
    /// empty the registry. Returns the cluster ids acted on.
    pub async fn run_all(&self) -> Vec<String> {
        let entries: Vec<CleanupEntry> = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.drain(..).rev().collect()
        };

        let mut destroyed = Vec::with_capacity(entries.len());
        for entry in entries {
            tracing::info!("Cleanup: destroying cluster {}", entry.cluster_id);
            if let Err(e) =
                super::orchestrator::destroy_containers(entry.engine.as_ref(), &entry.cluster_id)
                    .await
            {
                tracing::warn!("Cleanup of cluster {} failed: {}", entry.cluster_id, e);
            }
            destroyed.push(entry.cluster_id);
        }
        destroyed
    }
}

/// The process-wide registry orchestrators register with.
pub fn global() -> &'static CleanupRegistry {
    static GLOBAL: OnceLock<CleanupRegistry> = OnceLock::new();
    GLOBAL.get_or_init(CleanupRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::fake::FakeEngine;
    use crate::docker::types::CreateContainerRequest;

    #[tokio::test]
    async fn actions_run_lifo_and_deregistered_actions_do_not_run() {
        let registry = CleanupRegistry::new();
        let engine = Arc::new(FakeEngine::new());
        engine
            .create_container("minimesos-master-91-1", &CreateContainerRequest::default())
            .await
            .unwrap();
        engine
            .create_container("minimesos-master-92-1", &CreateContainerRequest::default())
            .await
            .unwrap();

        let _first = registry.register("91", engine.clone());
        let second = registry.register("92", engine.clone());
        let _third = registry.register("93", engine.clone());
        registry.deregister(second);

        let destroyed = registry.run_all().await;
        assert_eq!(destroyed, vec!["93".to_string(), "91".to_string()]);

        // cluster 91's container is gone, cluster 92's was left alone
        let names = engine.container_names();
        assert_eq!(names, vec!["minimesos-master-92-1".to_string()]);

        // registry drained; a second run is a no-op
        assert!(registry.run_all().await.is_empty());
    }
}
