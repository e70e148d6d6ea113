//! Cluster readiness polling
//!
//! The readiness protocol is a bounded retry loop against the master's
//! externally exposed state endpoint: the cluster is up once the master
//! reports as many activated agents as the architecture declares.
//! An unreachable endpoint and a not-yet-true predicate are treated the
//! same and retried until the ceiling elapses.

use crate::error::{MinimesosError, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

/// Interval between readiness attempts.
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default ceiling for the readiness wait.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(60);

/// Subset of the master's `state.json` used for readiness.
#[derive(Debug, Deserialize)]
struct MasterState {
    #[serde(default)]
    activated_slaves: u64,
}

/// Bounded retry loop against the master state endpoint.
pub struct ReadinessPoller {
    state_url: String,
    expected_agents: usize,
    client: reqwest::Client,
}

impl ReadinessPoller {
    pub fn new(state_url: &str, expected_agents: usize) -> Self {
        Self {
            state_url: state_url.to_string(),
            expected_agents,
            client: reqwest::Client::new(),
        }
    }

    /// Poll until the expected number of agents is activated or the
    /// ceiling elapses. Always terminates within `ceiling` plus one
    /// poll interval.
    pub async fn wait_until_ready(&self, ceiling: Duration) -> Result<()> {
        let deadline = Instant::now() + ceiling;
        loop {
            if self.poll_once().await {
                tracing::debug!("Master state discovered successfully");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(MinimesosError::ReadinessTimeout(format!(
                    "{} agents did not activate within {:?} (state url {})",
                    self.expected_agents, ceiling, self.state_url
                )));
            }
            tokio::time::sleep(READINESS_POLL_INTERVAL).await;
        }
    }

    /// One readiness attempt. Transient network failures and a false
    /// predicate both yield `false`.
    async fn poll_once(&self) -> bool {
        match self.fetch_state().await {
            Ok(state) => {
                if state.activated_slaves as usize == self.expected_agents {
                    true
                } else {
                    tracing::debug!(
                        "Waiting for {} activated agents, currently {}",
                        self.expected_agents,
                        state.activated_slaves
                    );
                    false
                }
            }
            Err(e) => {
                tracing::debug!("Polling master state at {}: {}", self.state_url, e);
                false
            }
        }
    }

    async fn fetch_state(&self) -> Result<MasterState> {
        let response = self
            .client
            .get(&self.state_url)
            .send()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MinimesosError::Network(format!(
                "state query returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MinimesosError::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Minimal HTTP responder standing in for the master state endpoint.
    async fn spawn_state_server(activated: Arc<AtomicU64>) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let body = format!(
                    "{{\"activated_slaves\":{}}}",
                    activated.load(Ordering::SeqCst)
                );
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        port
    }

    #[tokio::test]
    async fn ready_when_activated_count_matches() {
        let activated = Arc::new(AtomicU64::new(2));
        let port = spawn_state_server(activated).await;

        let poller = ReadinessPoller::new(&format!("http://127.0.0.1:{}/state.json", port), 2);
        poller
            .wait_until_ready(Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn becomes_ready_on_a_later_attempt() {
        let activated = Arc::new(AtomicU64::new(0));
        let port = spawn_state_server(activated.clone()).await;

        let poller = ReadinessPoller::new(&format!("http://127.0.0.1:{}/state.json", port), 1);
        let wait = tokio::spawn(async move { poller.wait_until_ready(Duration::from_secs(10)).await });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        activated.store(1, Ordering::SeqCst);

        wait.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_times_out_within_bound() {
        // Nothing listens on port 1
        let poller = ReadinessPoller::new("http://127.0.0.1:1/state.json", 1);
        let started = std::time::Instant::now();

        let err = poller
            .wait_until_ready(Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, MinimesosError::ReadinessTimeout(_)));
        // Bounded-retry property: ceiling + one interval, with slack
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn wrong_agent_count_is_not_ready() {
        let activated = Arc::new(AtomicU64::new(3));
        let port = spawn_state_server(activated).await;

        let poller = ReadinessPoller::new(&format!("http://127.0.0.1:{}/state.json", port), 1);
        let err = poller
            .wait_until_ready(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, MinimesosError::ReadinessTimeout(_)));
    }
}
