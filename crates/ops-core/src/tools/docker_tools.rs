use std::{sync::Arc, time::Duration};

use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::registry::{Scope, ToolDescriptor, ToolFailure, ToolOutcome};
use crate::session::SessionHandle;

use super::util::{active_profile, bool_arg, check_allowlist, resolve_docker_endpoint, str_arg, u32_arg};

const FAMILY: &str = "docker";

pub fn docker_list_containers() -> ToolDescriptor {
    ToolDescriptor {
        name: "docker_list_containers",
        description: "List containers on the active profile's docker endpoint.",
        input_schema: json!({
            "type": "object",
            "properties": { "all": {"type": "boolean"} },
        }),
        scope: Scope::Standard,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_list_containers(ctx, session, args, timeout))),
    }
}

async fn run_list_containers(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;
    let endpoint = resolve_docker_endpoint(&ctx, profile)?;
    let all = bool_arg(&args, "all", false);
    check_allowlist(profile, FAMILY, &["ps".to_string()])?;

    let containers = ctx.docker.list_containers(&endpoint, all, timeout).await.map_err(ToolFailure::Adapter)?;
    let text = if containers.is_empty() {
        "no containers".to_string()
    } else {
        containers
            .iter()
            .map(|c| format!("{}  {}  {}  {}", c.id, c.names, c.image, c.status))
            .collect::<Vec<_>>()
            .join("\n")
    };
    Ok(ToolOutcome { text, structured: Some(json!({ "containers": containers })) })
}

pub fn docker_logs() -> ToolDescriptor {
    ToolDescriptor {
        name: "docker_logs",
        description: "Tail a container's log stream.",
        input_schema: json!({
            "type": "object",
            "required": ["container"],
            "properties": {
                "container": {"type": "string"},
                "tail": {"type": "integer", "minimum": 1},
                "follow": {"type": "boolean"},
            },
        }),
        scope: Scope::Standard,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_docker_logs(ctx, session, args, timeout))),
    }
}

async fn run_docker_logs(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;
    let endpoint = resolve_docker_endpoint(&ctx, profile)?;
    let container = str_arg(&args, "container").unwrap_or_default();
    let tail = u32_arg(&args, "tail", 100);
    let follow = bool_arg(&args, "follow", false);
    check_allowlist(profile, FAMILY, &["logs".to_string(), container.to_string()])?;

    let text = ctx.docker.logs(&endpoint, container, tail, follow, timeout).await.map_err(ToolFailure::Adapter)?;
    Ok(ToolOutcome { text: text.clone(), structured: Some(json!({ "log": text })) })
}

pub fn docker_start_container() -> ToolDescriptor {
    ToolDescriptor {
        name: "docker_start_container",
        description: "Start a stopped container.",
        input_schema: json!({
            "type": "object",
            "required": ["container"],
            "properties": { "container": {"type": "string"} },
        }),
        scope: Scope::All,
        mutates: true,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_start(ctx, session, args, timeout))),
    }
}

async fn run_start(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;
    let endpoint = resolve_docker_endpoint(&ctx, profile)?;
    let container = str_arg(&args, "container").unwrap_or_default();
    check_allowlist(profile, FAMILY, &["start".to_string(), container.to_string()])?;

    ctx.docker.start(&endpoint, container, timeout).await.map_err(ToolFailure::Adapter)?;
    let text = format!("started {container}");
    Ok(ToolOutcome { text, structured: Some(json!({ "container": container, "acknowledged": true })) })
}

pub fn docker_stop_container() -> ToolDescriptor {
    ToolDescriptor {
        name: "docker_stop_container",
        description: "Stop a running container, allowing it a grace period.",
        input_schema: json!({
            "type": "object",
            "required": ["container"],
            "properties": {
                "container": {"type": "string"},
                "timeout": {"type": "integer", "minimum": 0},
            },
        }),
        scope: Scope::All,
        mutates: true,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_stop(ctx, session, args, timeout))),
    }
}

async fn run_stop(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;
    let endpoint = resolve_docker_endpoint(&ctx, profile)?;
    let container = str_arg(&args, "container").unwrap_or_default();
    let stop_timeout_secs = u32_arg(&args, "timeout", 10);
    check_allowlist(profile, FAMILY, &["stop".to_string(), container.to_string()])?;

    ctx.docker
        .stop(&endpoint, container, stop_timeout_secs, timeout)
        .await
        .map_err(ToolFailure::Adapter)?;
    let text = format!("stopped {container}");
    Ok(ToolOutcome { text, structured: Some(json!({ "container": container, "acknowledged": true })) })
}

pub fn docker_restart_container() -> ToolDescriptor {
    ToolDescriptor {
        name: "docker_restart_container",
        description: "Restart a container.",
        input_schema: json!({
            "type": "object",
            "required": ["container"],
            "properties": { "container": {"type": "string"} },
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
    let endpoint = resolve_docker_endpoint(&ctx, profile)?;
    let container = str_arg(&args, "container").unwrap_or_default();
    check_allowlist(profile, FAMILY, &["restart".to_string(), container.to_string()])?;

    ctx.docker.restart(&endpoint, container, timeout).await.map_err(ToolFailure::Adapter)?;
    let text = format!("restarted {container}");
    Ok(ToolOutcome { text, structured: Some(json!({ "container": container, "acknowledged": true })) })
}
