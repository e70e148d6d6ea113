//! Marathon framework client
//!
//! Thin HTTP client for the Marathon app API running inside the
//! cluster. Deploying reads an app definition as raw JSON and posts it
//! verbatim; teardown enumerates deployed apps and deletes each one.

use crate::container::spec::MARATHON_PORT;
use crate::error::{MinimesosError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AppList {
    #[serde(default)]
    apps: Vec<App>,
}

#[derive(Debug, Deserialize)]
struct App {
    id: String,
}

/// Client for one Marathon instance, addressed by container IP.
pub struct MarathonClient {
    base_url: String,
    client: reqwest::Client,
}

impl MarathonClient {
    pub fn new(ip: &str) -> Self {
        Self {
            base_url: format!("http://{}:{}", ip, MARATHON_PORT),
            client: reqwest::Client::new(),
        }
    }

    /// Deploy an app from its JSON definition. The body is passed to
    /// Marathon unparsed; Marathon itself validates it.
    pub async fn deploy_task(&self, app_json: &str) -> Result<()> {
        let url = format!("{}/v2/apps", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(app_json.to_string())
            .send()
            .await
            .map_err(|e| MinimesosError::Marathon(format!("could not deploy app: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MinimesosError::Marathon(format!(
                "app deployment rejected with {}: {}",
                status, body
            )));
        }
        tracing::info!("Deployed app on Marathon at {}", self.base_url);
        Ok(())
    }

    /// Delete every deployed app, so the frameworks release their Mesos
    /// tasks before the cluster containers are removed.
    pub async fn kill_all_apps(&self) -> Result<()> {
        let url = format!("{}/v2/apps", self.base_url);
        let apps: AppList = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MinimesosError::Marathon(format!("could not list apps: {}", e)))?
            .json()
            .await
            .map_err(|e| MinimesosError::Marathon(format!("could not parse app list: {}", e)))?;

        for app in apps.apps {
            let delete_url = format!("{}/v2/apps{}", self.base_url, app.id);
            if let Err(e) = self.client.delete(&delete_url).send().await {
                tracing::warn!("Could not kill app {}: {}", app.id, e);
            } else {
                tracing::debug!("Killed app {}", app.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_list_parses_marathon_payload() {
        let json = r#"{"apps":[{"id":"/weave-scope","instances":1},{"id":"/redis"}]}"#;
        let list: AppList = serde_json::from_str(json).unwrap();
        let ids: Vec<&str> = list.apps.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["/weave-scope", "/redis"]);
    }

    #[test]
    fn empty_payload_yields_no_apps() {
        let list: AppList = serde_json::from_str("{}").unwrap();
        assert!(list.apps.is_empty());
    }

    #[test]
    fn base_url_targets_the_marathon_port() {
        let client = MarathonClient::new("172.17.0.5");
        assert_eq!(client.base_url, "http://172.17.0.5:8080");
    }
}
