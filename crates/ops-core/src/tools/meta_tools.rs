use std::{sync::Arc, time::Duration};

use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::registry::{Scope, ToolDescriptor, ToolFailure, ToolOutcome};
use crate::session::SessionHandle;

use super::util::{active_profile, profile_refusal, str_arg};

pub fn profile_set() -> ToolDescriptor {
    ToolDescriptor {
        name: "profile_set",
        description: "Switch the session's active profile, invalidating stale adapter leases.",
        input_schema: json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": {"type": "string"} },
        }),
        scope: Scope::Core,
        mutates: true,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_profile_set(ctx, session, args, timeout))),
    }
}

async fn run_profile_set(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    args: Value,
    _timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let name = str_arg(&args, "name").unwrap_or_default();
    let profile = ctx.config.profile(name).map_err(|e| profile_refusal(e.to_string()))?;

    let mut guard = session.write().await;
    let scope_filter = guard.scope_filter.clone();
    guard.switch_profile(name, scope_filter);
    drop(guard);

    let text = format!(
        "profile set to `{name}` (k8s_context={} docker_endpoint={})",
        profile.k8s_context.as_deref().unwrap_or("none"),
        profile.docker_endpoint.as_deref().unwrap_or("none"),
    );
    Ok(ToolOutcome { text, structured: Some(json!({ "profile": name })) })
}

pub fn context_show() -> ToolDescriptor {
    ToolDescriptor {
        name: "context_show",
        description: "Report the session's active profile, cluster context, namespace, and docker endpoint.",
        input_schema: json!({ "type": "object" }),
        scope: Scope::Core,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_context_show(ctx, session, args, timeout))),
    }
}

async fn run_context_show(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    _args: Value,
    _timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let profile_name = session.read().await.active_profile.clone();
    let profile = active_profile(&ctx, &profile_name)?;

    let text = format!(
        "profile={} k8s_context={} namespace={} docker_endpoint={}",
        profile_name,
        profile.k8s_context.as_deref().unwrap_or("none"),
        profile.k8s_namespace,
        profile.docker_endpoint.as_deref().unwrap_or("none"),
    );
    let structured = json!({
        "profile": profile_name,
        "k8s_context": profile.k8s_context,
        "k8s_namespace": profile.k8s_namespace,
        "docker_endpoint": profile.docker_endpoint,
    });
    Ok(ToolOutcome { text, structured: Some(structured) })
}
