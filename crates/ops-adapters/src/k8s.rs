use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdapterError;
use crate::process::{run_with_timeout_env, CommandOutput};

/// A named Kubernetes cluster resolved from the profile's cluster table.
#[derive(Clone, Debug)]
pub struct ClusterEntry {
    pub name: String,
    pub kubeconfig: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodSummary {
    pub name: String,
    pub ready: String,
    pub status: String,
    pub restarts: String,
    pub age: String,
}

/// Drives the `kubectl` CLI as a pass-through backend.
pub struct K8sAdapter {
    binary: String,
}

impl Default for K8sAdapter {
    fn default() -> Self {
        Self { binary: "kubectl".to_string() }
    }
}

impl K8sAdapter {
    fn base_args(cluster: &ClusterEntry, namespace: &str) -> Vec<String> {
        vec![
            "--kubeconfig".to_string(),
            cluster.kubeconfig.clone(),
            "--context".to_string(),
            cluster.context.clone(),
            "--namespace".to_string(),
            namespace.to_string(),
        ]
    }

    pub async fn list_pods(
        &self,
        cluster: &ClusterEntry,
        namespace: &str,
        timeout: Duration,
    ) -> Result<Vec<PodSummary>, AdapterError> {
        let mut args = Self::base_args(cluster, namespace);
        args.extend([
            "get".to_string(),
            "pods".to_string(),
            "-o".to_string(),
            "json".to_string(),
        ]);
        let output = self.run(&args, timeout).await?;
        let value: Value = serde_json::from_str(&output.stdout_lossy())
            .map_err(|e| AdapterError::Permanent(format!("parsing kubectl get pods: {e}")))?;
        let items = value.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(items
            .iter()
            .map(|pod| PodSummary {
                name: pod
                    .pointer("/metadata/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                status: pod
                    .pointer("/status/phase")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                ready: container_ready_ratio(pod),
                restarts: total_restarts(pod).to_string(),
                age: pod
                    .pointer("/metadata/creationTimestamp")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect())
    }

    pub async fn get_pod(
        &self,
        cluster: &ClusterEntry,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<Value, AdapterError> {
        let mut args = Self::base_args(cluster, namespace);
        args.extend(["get".to_string(), "pod".to_string(), name.to_string(), "-o".to_string(), "json".to_string()]);
        let output = self.run(&args, timeout).await?;
        self.check_not_found(name, &output)?;
        serde_json::from_str(&output.stdout_lossy())
            .map_err(|e| AdapterError::Permanent(format!("parsing kubectl get pod: {e}")))
    }

    pub async fn logs(
        &self,
        cluster: &ClusterEntry,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail: u32,
        follow: bool,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        let mut args = Self::base_args(cluster, namespace);
        args.extend(["logs".to_string(), pod.to_string(), "--tail".to_string(), tail.to_string()]);
        if let Some(container) = container {
            args.push("--container".to_string());
            args.push(container.to_string());
        }
        if follow {
            args.push("--follow".to_string());
        }
        let output = self.run(&args, timeout).await?;
        self.check_not_found(pod, &output)?;
        Ok(output.stdout_lossy() + &output.stderr_lossy())
    }

    pub async fn scale_deployment(
        &self,
        cluster: &ClusterEntry,
        namespace: &str,
        deployment: &str,
        replicas: u32,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        let mut args = Self::base_args(cluster, namespace);
        args.extend([
            "scale".to_string(),
            "deployment".to_string(),
            deployment.to_string(),
            format!("--replicas={replicas}"),
        ]);
        let output = self.run(&args, timeout).await?;
        self.check_not_found(deployment, &output)?;
        Ok(())
    }

    pub async fn restart_deployment(
        &self,
        cluster: &ClusterEntry,
        namespace: &str,
        deployment: &str,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        let mut args = Self::base_args(cluster, namespace);
        args.extend([
            "rollout".to_string(),
            "restart".to_string(),
            format!("deployment/{deployment}"),
        ]);
        let output = self.run(&args, timeout).await?;
        self.check_not_found(deployment, &output)?;
        Ok(())
    }

    async fn run(&self, args: &[String], timeout: Duration) -> Result<CommandOutput, AdapterError> {
        let output = run_with_timeout_env(&self.binary, args, &[], timeout).await?;
        let stderr = output.stderr_lossy().to_lowercase();
        if stderr.contains("forbidden") || stderr.contains("unauthorized") {
            return Err(AdapterError::Unauthorized(output.stderr_lossy()));
        }
        Ok(output)
    }

    fn check_not_found(&self, name: &str, output: &CommandOutput) -> Result<(), AdapterError> {
        let stderr = output.stderr_lossy().to_lowercase();
        if stderr.contains("notfound") || stderr.contains("not found") {
            return Err(AdapterError::NotFound(name.to_string()));
        }
        if !output.status.success() {
            return Err(AdapterError::Permanent(output.stderr_lossy()));
        }
        Ok(())
    }
}

fn container_ready_ratio(pod: &Value) -> String {
    let statuses = pod
        .pointer("/status/containerStatuses")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let total = statuses.len();
    let ready = statuses
        .iter()
        .filter(|c| c.get("ready").and_then(Value::as_bool).unwrap_or(false))
        .count();
    format!("{ready}/{total}")
}

fn total_restarts(pod: &Value) -> i64 {
    pod.pointer("/status/containerStatuses")
        .and_then(Value::as_array)
        .map(|statuses| {
            statuses
                .iter()
                .filter_map(|c| c.get("restartCount").and_then(Value::as_i64))
                .sum()
        })
        .unwrap_or(0)
}
