use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ServerContext;
use crate::error::InternalError;
use crate::policy::audit::AuditRecord;
use crate::protocol::codes;
use crate::protocol::wire::{Dispatched, Response, RpcError};
use crate::registry::{Registry, ToolFailure};
use crate::schema;
use crate::session::SessionHandle;
use ops_adapters::AdapterErrorKind;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const LOG_TAIL_TIMEOUT_SECS: u64 = 60;
const DEPLOYMENT_MUTATION_TIMEOUT_SECS: u64 = 120;

fn default_timeout_secs(tool: &str) -> u64 {
    match tool {
        "query_logs" | "docker_logs" | "k8s_logs" => LOG_TAIL_TIMEOUT_SECS,
        "k8s_scale_deployment" | "k8s_restart_deployment" => DEPLOYMENT_MUTATION_TIMEOUT_SECS,
        _ => DEFAULT_TIMEOUT_SECS,
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Implements the ten-step `tools/call` flow (§4.5): scope filter, schema
/// validation, handler invocation under a clamped deadline, redaction,
/// result shaping, and the audit write — all before handing a plain
/// JSON-RPC response back to the protocol engine.
pub async fn handle_tools_call(
    ctx: &Arc<ServerContext>,
    session: &SessionHandle,
    registry: &Arc<Registry>,
    id: Value,
    is_notification: bool,
    params: Value,
) -> Dispatched {
    let (profile_name, scope_filter) = {
        let guard = session.read().await;
        if !guard.is_ready() {
            let error = RpcError { code: codes::INVALID_REQUEST, message: "session not ready".to_string(), data: None };
            return respond(is_notification, id, Err(error));
        }
        (guard.active_profile.clone(), guard.scope_filter.clone())
    };

    let call: ToolCallParams = match serde_json::from_value(params) {
        Ok(call) => call,
        Err(e) => {
            let error = RpcError {
                code: codes::INVALID_PARAMS,
                message: "params must be { name, arguments }".to_string(),
                data: Some(Value::String(e.to_string())),
            };
            return respond(is_notification, id, Err(error));
        }
    };

    let descriptor = match registry.get(&call.name) {
        Some(descriptor) => descriptor.clone(),
        None => {
            let error = RpcError {
                code: codes::METHOD_NOT_FOUND,
                message: format!("unknown tool `{}`", call.name),
                data: None,
            };
            return respond(is_notification, id, Err(error));
        }
    };

    let arguments = if call.arguments.is_null() { Value::Object(Default::default()) } else { call.arguments };
    let target = target_from_args(&arguments);

    if !scope_filter.contains(descriptor.name) {
        let policy_error = crate::policy::PolicyError::OutOfScope(descriptor.name.to_string());
        let text = format!("scope-refused: {policy_error}");
        let result = tool_result(&text, Some(serde_json::json!({ "error_kind": policy_error.kind() })), true);
        audit(
            ctx,
            &profile_name,
            descriptor.name,
            &arguments,
            &target,
            &id,
            "policy-refusal:out-of-scope",
            0,
            text.len(),
            Duration::ZERO,
        )
        .await;
        return respond(is_notification, id, Ok(result));
    }

    if let Err(violation) = schema::validate(&descriptor.input_schema, &arguments) {
        let error = RpcError {
            code: codes::INVALID_PARAMS,
            message: violation.message,
            data: Some(Value::String(violation.path)),
        };
        return respond(is_notification, id, Err(error));
    }

    let requested_timeout = arguments.get("timeout").and_then(Value::as_i64);
    let timeout_secs = requested_timeout
        .unwrap_or(default_timeout_secs(descriptor.name) as i64)
        .clamp(1, 600) as u64;
    let timeout = Duration::from_secs(timeout_secs);

    let bytes_in = serde_json::to_vec(&arguments).map(|b| b.len()).unwrap_or(0);
    let started = std::time::Instant::now();
    let outcome = AssertUnwindSafe((descriptor.handler)(ctx.clone(), session.clone(), arguments.clone(), timeout))
        .catch_unwind()
        .await;
    let elapsed = started.elapsed();

    // A handler panic is an unrecognized fault (§4.5): it never reaches the
    // caller as a tool result, it becomes a correlated InternalError instead.
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(panic) => {
            let detail = panic_message(&panic);
            let internal = InternalError::new(detail);
            let correlation_id = internal.correlation_id.clone();
            tracing::error!(correlation_id, detail = %internal.detail, tool = descriptor.name, "tool handler panicked");

            let bytes_out = 0;
            audit(
                ctx,
                &profile_name,
                descriptor.name,
                &arguments,
                &target,
                &id,
                &format!("internal-error:{correlation_id}"),
                bytes_in,
                bytes_out,
                elapsed,
            )
            .await;

            let error = RpcError {
                code: codes::INTERNAL_ERROR,
                message: "internal error".to_string(),
                data: Some(serde_json::json!({ "correlation_id": correlation_id })),
            };
            return respond(is_notification, id, Err(error));
        }
    };

    let (result, audit_outcome) = match outcome {
        Ok(mut outcome) => {
            outcome.text = ctx.redactor.redact_text(&outcome.text);
            if let Some(structured) = outcome.structured.as_mut() {
                ctx.redactor.redact_value(structured);
            }
            let result = tool_result(&outcome.text, outcome.structured, false);
            (result, "ok".to_string())
        }
        Err(ToolFailure::Policy { summary, error_kind }) => {
            let text = ctx.redactor.redact_text(&summary);
            let result = tool_result(&text, Some(serde_json::json!({ "error_kind": error_kind })), true);
            (result, format!("policy-refusal:{error_kind}"))
        }
        Err(ToolFailure::Adapter(err)) => {
            let kind = adapter_error_kind_label(err.kind());
            let text = ctx.redactor.redact_text(&format!("{kind}: {err}"));
            let result = tool_result(&text, Some(serde_json::json!({ "error_kind": kind })), true);
            (result, format!("adapter-error:{kind}"))
        }
    };

    let bytes_out = serde_json::to_vec(&result).map(|b| b.len()).unwrap_or(0);
    audit(ctx, &profile_name, descriptor.name, &arguments, &target, &id, &audit_outcome, bytes_in, bytes_out, elapsed).await;

    respond(is_notification, id, Ok(result))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn adapter_error_kind_label(kind: AdapterErrorKind) -> &'static str {
    match kind {
        AdapterErrorKind::NotFound => "NotFound",
        AdapterErrorKind::Unauthorized => "Unauthorized",
        AdapterErrorKind::Unreachable => "Unreachable",
        AdapterErrorKind::Timeout => "Timeout",
        AdapterErrorKind::Cancelled => "Cancelled",
        AdapterErrorKind::Transient => "Transient",
        AdapterErrorKind::Permanent => "Permanent",
    }
}

fn tool_result(text: &str, structured: Option<Value>, is_error: bool) -> Value {
    let mut content = vec![serde_json::json!({ "type": "text", "text": text })];
    if let Some(structured) = structured.clone() {
        content.push(serde_json::json!({ "type": "structured", "data": structured }));
    }
    serde_json::json!({ "content": content, "isError": is_error, "structuredContent": structured })
}

fn target_from_args(args: &Value) -> String {
    for key in ["server", "container", "pod", "deployment", "name"] {
        if let Some(value) = args.get(key).and_then(Value::as_str) {
            return value.to_string();
        }
    }
    String::new()
}

#[allow(clippy::too_many_arguments)]
async fn audit(
    ctx: &Arc<ServerContext>,
    profile: &str,
    tool: &str,
    arguments: &Value,
    target: &str,
    id: &Value,
    outcome: &str,
    bytes_in: usize,
    bytes_out: usize,
    duration: Duration,
) {
    let record = AuditRecord {
        timestamp: chrono::Utc::now(),
        profile: profile.to_string(),
        tool: tool.to_string(),
        argument_fingerprint: AuditRecord::fingerprint(arguments),
        request_id: request_id_string(id),
        target: target.to_string(),
        outcome: outcome.to_string(),
        bytes_in: bytes_in as u64,
        bytes_out: bytes_out as u64,
        duration_ms: crate::policy::audit::duration_ms(duration),
    };
    let _ = ctx.audit.record(record).await;
}

fn request_id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => "null".to_string(),
    }
}

fn respond(is_notification: bool, id: Value, outcome: Result<Value, RpcError>) -> Dispatched {
    if is_notification {
        return Dispatched::NoResponse;
    }
    match outcome {
        Ok(result) => Dispatched::Response(Response::ok(id, result)),
        Err(error) => Dispatched::Response(Response::err(id, error)),
    }
}
