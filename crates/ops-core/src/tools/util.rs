use serde_json::Value;

use crate::config::Profile;
use crate::context::ServerContext;
use crate::registry::ToolFailure;
use ops_adapters::docker::DockerEndpoint;
use ops_adapters::k8s::ClusterEntry;
use ops_adapters::ssh::HostEntry;

pub fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub fn bool_arg(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn u32_arg(args: &Value, key: &str, default: u32) -> u32 {
    args.get(key).and_then(Value::as_u64).map(|v| v as u32).unwrap_or(default)
}

pub fn profile_refusal(summary: impl Into<String>) -> ToolFailure {
    ToolFailure::Policy { summary: summary.into(), error_kind: "UnknownProfile" }
}

pub fn active_profile<'a>(ctx: &'a ServerContext, profile_name: &str) -> Result<&'a Profile, ToolFailure> {
    ctx.config.profile(profile_name).map_err(|e| profile_refusal(e.to_string()))
}

/// Resolves a host entry by name out of the config's host table, attaching
/// the lookup key so pool keys and log messages can reference it (§4.6).
pub fn resolve_host(ctx: &ServerContext, name: &str) -> Result<HostEntry, ToolFailure> {
    let entry = ctx
        .config
        .hosts
        .get(name)
        .ok_or_else(|| ToolFailure::Policy {
            summary: format!("no host entry named `{name}`"),
            error_kind: "UnknownHost",
        })?;
    Ok(HostEntry {
        name: name.to_string(),
        address: entry.address.clone(),
        port: entry.port,
        user: entry.user.clone(),
        identity_file: entry.identity_file.clone(),
    })
}

pub fn resolve_cluster(ctx: &ServerContext, profile: &Profile) -> Result<ClusterEntry, ToolFailure> {
    let name = profile.k8s_context.as_deref().ok_or_else(|| ToolFailure::Policy {
        summary: "active profile has no k8s_context configured".to_string(),
        error_kind: "UnknownCluster",
    })?;
    let entry = ctx
        .config
        .clusters
        .get(name)
        .ok_or_else(|| ToolFailure::Policy {
            summary: format!("no cluster entry named `{name}`"),
            error_kind: "UnknownCluster",
        })?;
    Ok(ClusterEntry { name: name.to_string(), kubeconfig: entry.kubeconfig.clone(), context: entry.context.clone() })
}

pub fn resolve_docker_endpoint(ctx: &ServerContext, profile: &Profile) -> Result<DockerEndpoint, ToolFailure> {
    let name = profile.docker_endpoint.as_deref().ok_or_else(|| ToolFailure::Policy {
        summary: "active profile has no docker_endpoint configured".to_string(),
        error_kind: "UnknownDockerEndpoint",
    })?;
    let entry = ctx
        .config
        .docker_endpoints
        .get(name)
        .ok_or_else(|| ToolFailure::Policy {
            summary: format!("no docker endpoint named `{name}`"),
            error_kind: "UnknownDockerEndpoint",
        })?;
    Ok(DockerEndpoint { name: name.to_string(), socket: entry.socket.clone() })
}

/// Enforces the pass-through allowlist for a CLI family, translating a
/// policy refusal into the uniform [`ToolFailure::Policy`] shape.
pub fn check_allowlist(profile: &Profile, family: &str, argv: &[String]) -> Result<(), ToolFailure> {
    crate::policy::allowlist::check(profile, family, argv).map_err(|e| ToolFailure::Policy {
        summary: e.to_string(),
        error_kind: e.kind(),
    })
}
