use std::{sync::Arc, time::Duration};

use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::registry::{Scope, ToolDescriptor, ToolFailure, ToolOutcome};
use crate::session::SessionHandle;

use super::util::{active_profile, bool_arg, check_allowlist, resolve_cluster, str_arg, u32_arg};

const FAMILY: &str = "kubectl";

fn namespace_arg(args: &Value, profile: &crate::config::Profile) -> String {
    str_arg(args, "namespace").map(str::to_string).unwrap_or_else(|| profile.k8s_namespace.clone())
}

pub fn k8s_list_pods() -> ToolDescriptor {
    ToolDescriptor {
        name: "k8s_list_pods",
        description: "List pods in a namespace on the active profile's cluster.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "namespace": {"type": "string"},
                "cluster": {"type": "string"},
            },
        }),
        scope: Scope::Standard,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_list_pods(ctx, session, args, timeout))),
    }
}

async fn run_list_pods(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;
    let cluster = resolve_cluster(&ctx, profile)?;
    let namespace = namespace_arg(&args, profile);
    check_allowlist(profile, FAMILY, &["get".to_string(), "pods".to_string()])?;

    let pods = ctx.k8s.list_pods(&cluster, &namespace, timeout).await.map_err(ToolFailure::Adapter)?;
    let text = if pods.is_empty() {
        format!("no pods in namespace {namespace}")
    } else {
        pods.iter()
            .map(|p| format!("{}  {}  {}  restarts={}", p.name, p.ready, p.status, p.restarts))
            .collect::<Vec<_>>()
            .join("\n")
    };
    Ok(ToolOutcome { text, structured: Some(json!({ "pods": pods })) })
}

pub fn k8s_get_pod() -> ToolDescriptor {
    ToolDescriptor {
        name: "k8s_get_pod",
        description: "Describe a single pod.",
        input_schema: json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {"type": "string"},
                "namespace": {"type": "string"},
            },
        }),
        scope: Scope::Standard,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_get_pod(ctx, session, args, timeout))),
    }
}

async fn run_get_pod(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;
    let cluster = resolve_cluster(&ctx, profile)?;
    let namespace = namespace_arg(&args, profile);
    let name = str_arg(&args, "name").unwrap_or_default();
    check_allowlist(profile, FAMILY, &["get".to_string(), "pod".to_string()])?;

    let pod = ctx.k8s.get_pod(&cluster, &namespace, name, timeout).await.map_err(ToolFailure::Adapter)?;
    let text = format!("{name}: {}", pod.pointer("/status/phase").and_then(Value::as_str).unwrap_or("unknown"));
    Ok(ToolOutcome { text, structured: Some(pod) })
}

pub fn k8s_logs() -> ToolDescriptor {
    ToolDescriptor {
        name: "k8s_logs",
        description: "Tail a pod's log stream, optionally scoped to a container.",
        input_schema: json!({
            "type": "object",
            "required": ["pod"],
            "properties": {
                "pod": {"type": "string"},
                "namespace": {"type": "string"},
                "container": {"type": "string"},
                "tail": {"type": "integer", "minimum": 1},
                "follow": {"type": "boolean"},
            },
        }),
        scope: Scope::Standard,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_k8s_logs(ctx, session, args, timeout))),
    }
}

async fn run_k8s_logs(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;
    let cluster = resolve_cluster(&ctx, profile)?;
    let namespace = namespace_arg(&args, profile);
    let pod = str_arg(&args, "pod").unwrap_or_default();
    let container = str_arg(&args, "container");
    let tail = u32_arg(&args, "tail", 100);
    let follow = bool_arg(&args, "follow", false);
    check_allowlist(profile, FAMILY, &["logs".to_string(), pod.to_string()])?;

    let text = ctx
        .k8s
        .logs(&cluster, &namespace, pod, container, tail, follow, timeout)
        .await
        .map_err(ToolFailure::Adapter)?;
    Ok(ToolOutcome { text: text.clone(), structured: Some(json!({ "log": text })) })
}

pub fn k8s_scale_deployment() -> ToolDescriptor {
    ToolDescriptor {
        name: "k8s_scale_deployment",
        description: "Scale a deployment to a replica count.",
        input_schema: json!({
            "type": "object",
            "required": ["deployment", "replicas"],
            "properties": {
                "deployment": {"type": "string"},
                "replicas": {"type": "integer", "minimum": 0},
                "namespace": {"type": "string"},
            },
        }),
        scope: Scope::All,
        mutates: true,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_scale(ctx, session, args, timeout))),
    }
}

async fn run_scale(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;
    let cluster = resolve_cluster(&ctx, profile)?;
    let namespace = namespace_arg(&args, profile);
    let deployment = str_arg(&args, "deployment").unwrap_or_default();
    let replicas = u32_arg(&args, "replicas", 0);
    check_allowlist(profile, FAMILY, &["scale".to_string(), deployment.to_string()])?;

    ctx.k8s
        .scale_deployment(&cluster, &namespace, deployment, replicas, timeout)
        .await
        .map_err(ToolFailure::Adapter)?;
    let text = format!("scaled {deployment} to {replicas} replicas");
    Ok(ToolOutcome { text, structured: Some(json!({ "deployment": deployment, "replicas": replicas })) })
}

pub fn k8s_restart_deployment() -> ToolDescriptor {
    ToolDescriptor {
        name: "k8s_restart_deployment",
        description: "Trigger a rolling restart of a deployment.",
        input_schema: json!({
            "type": "object",
            "required": ["deployment"],
            "properties": {
                "deployment": {"type": "string"},
                "namespace": {"type": "string"},
            },
        }),
        scope: Scope::All,
        mutates: true,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_restart(ctx, session, args, timeout))),
    }
}

async fn run_restart(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;
    let cluster = resolve_cluster(&ctx, profile)?;
    let namespace = namespace_arg(&args, profile);
    let deployment = str_arg(&args, "deployment").unwrap_or_default();
    check_allowlist(profile, FAMILY, &["rollout".to_string(), deployment.to_string()])?;

    ctx.k8s
        .restart_deployment(&cluster, &namespace, deployment, timeout)
        .await
        .map_err(ToolFailure::Adapter)?;
    let text = format!("restarting {deployment}");
    Ok(ToolOutcome { text, structured: Some(json!({ "deployment": deployment, "acknowledged": true })) })
}
