use std::{sync::Arc, time::Duration};

use ops_adapters::logs::LogReader;
use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::registry::{Scope, ToolDescriptor, ToolFailure, ToolOutcome};
use crate::session::SessionHandle;

use super::util::{resolve_host, str_arg, u32_arg};

pub fn ssh_execute() -> ToolDescriptor {
    ToolDescriptor {
        name: "ssh_execute",
        description: "Run a single command on a named host over a pooled SSH session.",
        input_schema: json!({
            "type": "object",
            "required": ["server", "command"],
            "properties": {
                "server": {"type": "string"},
                "command": {"type": "string", "minLength": 1},
                "timeout": {"type": "integer"},
            },
        }),
        scope: Scope::Core,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_ssh_execute(ctx, session, args, timeout))),
    }
}

async fn run_ssh_execute(
    ctx: Arc<ServerContext>,
    _session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let server = str_arg(&args, "server").unwrap_or_default();
    let command = str_arg(&args, "command").unwrap_or_default();
    let host = resolve_host(&ctx, server)?;

    let output = ctx
        .ssh
        .execute(&host, command, timeout)
        .await
        .map_err(ToolFailure::Adapter)?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let text = if stderr.is_empty() { stdout.clone() } else { format!("{stdout}\n--- stderr ---\n{stderr}") };

    Ok(ToolOutcome {
        text,
        structured: Some(json!({ "stdout": stdout, "stderr": stderr, "exit_code": output.exit_code })),
    })
}

pub fn query_logs() -> ToolDescriptor {
    ToolDescriptor {
        name: "query_logs",
        description: "Return the tail of a log file on a host, optionally filtered.",
        input_schema: json!({
            "type": "object",
            "required": ["server", "log_path"],
            "properties": {
                "server": {"type": "string"},
                "log_path": {"type": "string"},
                "filter": {"type": "string"},
                "tail": {"type": "integer", "minimum": 1},
                "follow": {"type": "boolean"},
            },
        }),
        scope: Scope::Core,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_query_logs(ctx, session, args, timeout))),
    }
}

async fn run_query_logs(
    ctx: Arc<ServerContext>,
    _session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let server = str_arg(&args, "server").unwrap_or_default();
    let log_path = str_arg(&args, "log_path").unwrap_or_default();
    let filter = str_arg(&args, "filter");
    let tail = u32_arg(&args, "tail", 100);

    let host = resolve_host(&ctx, server)?;
    let reader = LogReader::new(&ctx.ssh);
    let lines = reader
        .tail(&host, log_path, filter, tail, timeout)
        .await
        .map_err(ToolFailure::Adapter)?;

    let text = if lines.is_empty() { "no matching lines".to_string() } else { lines.join("\n") };
    Ok(ToolOutcome { text, structured: Some(json!({ "lines": lines })) })
}

pub fn system_info() -> ToolDescriptor {
    ToolDescriptor {
        name: "system_info",
        description: "Summarize uptime, load average, and memory on a host.",
        input_schema: json!({
            "type": "object",
            "required": ["server"],
            "properties": { "server": {"type": "string"} },
        }),
        scope: Scope::Core,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_system_info(ctx, session, args, timeout))),
    }
}

async fn run_system_info(
    ctx: Arc<ServerContext>,
    _session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let server = str_arg(&args, "server").unwrap_or_default();
    let host = resolve_host(&ctx, server)?;
    let output = ctx
        .ssh
        .execute(&host, "uptime && echo --- && free -m", timeout)
        .await
        .map_err(ToolFailure::Adapter)?;
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(ToolOutcome { text: text.clone(), structured: Some(json!({ "raw": text, "exit_code": output.exit_code })) })
}

pub fn disk_usage() -> ToolDescriptor {
    ToolDescriptor {
        name: "disk_usage",
        description: "Summarize filesystem usage on a host.",
        input_schema: json!({
            "type": "object",
            "required": ["server"],
            "properties": { "server": {"type": "string"} },
        }),
        scope: Scope::Core,
        mutates: false,
        handler: Arc::new(|ctx, session, args, timeout| Box::pin(run_disk_usage(ctx, session, args, timeout))),
    }
}

async fn run_disk_usage(
    ctx: Arc<ServerContext>,
    _session: SessionHandle,
    args: Value,
    timeout: Duration,
) -> Result<ToolOutcome, ToolFailure> {
    let server = str_arg(&args, "server").unwrap_or_default();
    let host = resolve_host(&ctx, server)?;
    let output = ctx
        .ssh
        .execute(&host, "df -h", timeout)
        .await
        .map_err(ToolFailure::Adapter)?;
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(ToolOutcome { text: text.clone(), structured: Some(json!({ "raw": text, "exit_code": output.exit_code })) })
}
