use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdapterError;
use crate::process::run_with_timeout_env;

/// A named Docker endpoint resolved from the profile's docker-endpoint table.
#[derive(Clone, Debug)]
pub struct DockerEndpoint {
    pub name: String,
    pub socket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub names: String,
    pub image: String,
    pub status: String,
    pub state: String,
}

/// Drives the `docker` CLI as a pass-through backend, per the spec's "forward
/// an argv-like vector to an underlying CLI" model (§4.4).
pub struct DockerAdapter {
    binary: String,
}

impl Default for DockerAdapter {
    fn default() -> Self {
        Self { binary: "docker".to_string() }
    }
}

impl DockerAdapter {
    fn env(endpoint: &DockerEndpoint) -> Vec<(String, String)> {
        vec![("DOCKER_HOST".to_string(), endpoint.socket.clone())]
    }

    pub async fn list_containers(
        &self,
        endpoint: &DockerEndpoint,
        all: bool,
        timeout: Duration,
    ) -> Result<Vec<ContainerSummary>, AdapterError> {
        let mut args = vec!["ps".to_string(), "--format".to_string(), "{{json .}}".to_string()];
        if all {
            args.push("--all".to_string());
        }
        let output = run_with_timeout_env(&self.binary, &args, &Self::env(endpoint), timeout).await?;
        if !output.status.success() {
            return Err(AdapterError::Permanent(output.stderr_lossy()));
        }
        let mut containers = Vec::new();
        for line in output.stdout_lossy().lines() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .map_err(|e| AdapterError::Permanent(format!("parsing docker ps output: {e}")))?;
            containers.push(ContainerSummary {
                id: value.get("ID").and_then(Value::as_str).unwrap_or_default().to_string(),
                names: value.get("Names").and_then(Value::as_str).unwrap_or_default().to_string(),
                image: value.get("Image").and_then(Value::as_str).unwrap_or_default().to_string(),
                status: value.get("Status").and_then(Value::as_str).unwrap_or_default().to_string(),
                state: value.get("State").and_then(Value::as_str).unwrap_or_default().to_string(),
            });
        }
        Ok(containers)
    }

    pub async fn logs(
        &self,
        endpoint: &DockerEndpoint,
        container: &str,
        tail: u32,
        follow: bool,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        let mut args = vec![
            "logs".to_string(),
            "--tail".to_string(),
            tail.to_string(),
        ];
        if follow {
            args.push("--follow".to_string());
        }
        args.push(container.to_string());
        let output = run_with_timeout_env(&self.binary, &args, &Self::env(endpoint), timeout).await?;
        self.check_not_found(container, &output)?;
        Ok(output.stdout_lossy() + &output.stderr_lossy())
    }

    pub async fn start(
        &self,
        endpoint: &DockerEndpoint,
        container: &str,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        self.simple_command(endpoint, &["start".to_string(), container.to_string()], container, timeout)
            .await
    }

    pub async fn stop(
        &self,
        endpoint: &DockerEndpoint,
        container: &str,
        stop_timeout_secs: u32,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        self.simple_command(
            endpoint,
            &["stop".to_string(), "--time".to_string(), stop_timeout_secs.to_string(), container.to_string()],
            container,
            timeout,
        )
        .await
    }

    pub async fn restart(
        &self,
        endpoint: &DockerEndpoint,
        container: &str,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        self.simple_command(endpoint, &["restart".to_string(), container.to_string()], container, timeout)
            .await
    }

    async fn simple_command(
        &self,
        endpoint: &DockerEndpoint,
        args: &[String],
        container: &str,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        let output = run_with_timeout_env(&self.binary, args, &Self::env(endpoint), timeout).await?;
        self.check_not_found(container, &output)?;
        if !output.status.success() {
            return Err(AdapterError::Permanent(output.stderr_lossy()));
        }
        Ok(())
    }

    fn check_not_found(&self, container: &str, output: &crate::process::CommandOutput) -> Result<(), AdapterError> {
        let stderr = output.stderr_lossy();
        if stderr.to_lowercase().contains("no such container") {
            return Err(AdapterError::NotFound(container.to_string()));
        }
        Ok(())
    }
}
