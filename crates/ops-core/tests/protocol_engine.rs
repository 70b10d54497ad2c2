//! End-to-end coverage of the JSON-RPC engine and `tools/call` flow, driven
//! entirely through `handle_payload` the way a real transport would. No
//! adapter ever runs here: every tool exercised either needs no backend
//! (`profile_set`, `context_show`) or is refused before reaching one
//! (out-of-scope, unknown tool, bad params).

use std::collections::HashMap;
use std::sync::Arc;

use ops_core::config::{AuditConfig, ConfigFile, Profile, RedactionConfig, ScopeSetting, Settings};
use ops_core::context::ServerContext;
use ops_core::policy::audit::AuditLogger;
use ops_core::protocol::handle_payload;
use ops_core::registry::{Registry, Scope};
use ops_core::session::{Session, SessionHandle};
use ops_core::tools::build_registry;
use serde_json::{json, Value};

struct Fixture {
    ctx: Arc<ServerContext>,
    registry: Arc<Registry>,
    session: SessionHandle,
    _audit_dir: tempfile::TempDir,
    audit_path: std::path::PathBuf,
}

fn fixture() -> Fixture {
    fixture_with_scope(ScopeSetting::Named(Scope::Core))
}

fn fixture_with_scope(tools_scope: ScopeSetting) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.log");

    let mut profiles = HashMap::new();
    profiles.insert(
        "default".to_string(),
        Profile {
            ssh_bastion: None,
            k8s_context: Some("secret-prod".to_string()),
            k8s_namespace: "default".to_string(),
            docker_endpoint: None,
            compose_files: vec![],
            allowlist: HashMap::new(),
            dangerous_flags: vec![],
            dangerous_allowed: false,
        },
    );

    let config = ConfigFile {
        profiles,
        hosts: HashMap::new(),
        clusters: HashMap::new(),
        docker_endpoints: HashMap::new(),
        redaction: RedactionConfig {
            sensitive_substrings: vec!["context".to_string()],
            patterns: vec![],
        },
        audit: AuditConfig { path: audit_path.clone() },
        default_profile: "default".to_string(),
    };

    let settings = Settings {
        config_path: std::path::PathBuf::from("unused"),
        tools_scope,
        audit_log_override: None,
    };

    let audit = AuditLogger::spawn(&audit_path).unwrap();
    let ctx = Arc::new(ServerContext::new(config, settings, audit).unwrap());
    let registry = Arc::new(build_registry().unwrap());
    let session = Session::handle("default");

    Fixture { ctx, registry, session, _audit_dir: dir, audit_path }
}

async fn send(fx: &Fixture, raw: Value) -> Option<Value> {
    let response = handle_payload(fx.ctx.clone(), fx.session.clone(), fx.registry.clone(), &raw.to_string()).await?;
    Some(serde_json::from_str(&response).unwrap())
}

async fn handshake(fx: &Fixture) {
    let init = send(
        fx,
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"clientInfo": {"name": "t", "version": "1"}}}),
    )
    .await
    .unwrap();
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(init["result"]["serverInfo"]["name"], "ops-core");

    let initialized = send(fx, json!({"jsonrpc": "2.0", "method": "initialized"})).await;
    assert!(initialized.is_none(), "initialized notification must not produce a response");
}

#[tokio::test]
async fn handshake_then_ping_succeeds() {
    let fx = fixture();
    handshake(&fx).await;

    let pong = send(&fx, json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})).await.unwrap();
    assert_eq!(pong["result"], json!({}));
    assert!(pong.get("error").is_none());
}

#[tokio::test]
async fn tools_call_before_handshake_is_refused() {
    let fx = fixture();
    let resp = send(
        &fx,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "context_show", "arguments": {}}}),
    )
    .await
    .unwrap();
    assert_eq!(resp["error"]["code"], -32600);
}

#[tokio::test]
async fn tools_list_is_filtered_to_core_scope() {
    let fx = fixture();
    handshake(&fx).await;

    let resp = send(&fx, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await.unwrap();
    let names: Vec<&str> = resp["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();

    for core_tool in ["ssh_execute", "query_logs", "system_info", "disk_usage", "profile_set", "context_show"] {
        assert!(names.contains(&core_tool), "expected {core_tool} in core scope, got {names:?}");
    }
    assert!(!names.contains(&"docker_list_containers"), "standard-scope tool leaked into core scope");
    assert!(!names.contains(&"k8s_scale_deployment"), "all-scope tool leaked into core scope");
}

#[tokio::test]
async fn unknown_method_returns_method_not_found_without_handshake() {
    let fx = fixture();
    let resp = send(&fx, json!({"jsonrpc": "2.0", "id": 1, "method": "frobnicate"})).await.unwrap();
    assert_eq!(resp["error"]["code"], -32601);
}

#[tokio::test]
async fn malformed_json_yields_parse_error() {
    let fx = fixture();
    let response = handle_payload(fx.ctx.clone(), fx.session.clone(), fx.registry.clone(), "not json at all")
        .await
        .unwrap();
    let parsed: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(parsed["error"]["code"], -32700);
    assert_eq!(parsed["id"], Value::Null);
}

#[tokio::test]
async fn batch_isolates_one_malformed_element_from_the_rest() {
    let fx = fixture();
    handshake(&fx).await;

    let raw = json!([42, {"jsonrpc": "2.0", "id": 5, "method": "ping"}]).to_string();
    let response = handle_payload(fx.ctx.clone(), fx.session.clone(), fx.registry.clone(), &raw).await.unwrap();
    let parsed: Value = serde_json::from_str(&response).unwrap();
    let responses = parsed.as_array().unwrap();
    assert_eq!(responses.len(), 2);

    let parse_failure = responses.iter().find(|r| r["id"] == Value::Null).unwrap();
    assert_eq!(parse_failure["error"]["code"], -32700);

    let ping_ok = responses.iter().find(|r| r["id"] == json!(5)).unwrap();
    assert_eq!(ping_ok["result"], json!({}));
}

#[tokio::test]
async fn notification_only_batch_produces_no_response() {
    let fx = fixture();
    handshake(&fx).await;

    let raw = json!([
        {"jsonrpc": "2.0", "method": "initialized"},
        {"jsonrpc": "2.0", "method": "initialized"},
    ])
    .to_string();
    let response = handle_payload(fx.ctx.clone(), fx.session.clone(), fx.registry.clone(), &raw).await;
    assert!(response.is_none());
}

#[tokio::test]
async fn tools_call_unknown_tool_is_method_not_found() {
    let fx = fixture();
    handshake(&fx).await;

    let resp = send(
        &fx,
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "does_not_exist", "arguments": {}}}),
    )
    .await
    .unwrap();
    assert_eq!(resp["error"]["code"], -32601);
}

#[tokio::test]
async fn tools_call_missing_required_argument_is_invalid_params() {
    let fx = fixture();
    handshake(&fx).await;

    let resp = send(
        &fx,
        json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"name": "ssh_execute", "arguments": {"server": "h1"}}}),
    )
    .await
    .unwrap();
    assert_eq!(resp["error"]["code"], -32602);
}

#[tokio::test]
async fn tools_call_out_of_scope_is_an_error_result_not_an_rpc_error() {
    let fx = fixture();
    handshake(&fx).await;

    let resp = send(
        &fx,
        json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "docker_list_containers", "arguments": {}}}),
    )
    .await
    .unwrap();

    assert!(resp.get("error").is_none(), "scope refusal must be a tool result, not a protocol error");
    assert_eq!(resp["result"]["isError"], true);
    assert_eq!(resp["result"]["structuredContent"]["error_kind"], "OutOfScope");
}

#[tokio::test]
async fn profile_set_then_context_show_redacts_sensitive_key() {
    let fx = fixture();
    handshake(&fx).await;

    let set_resp = send(
        &fx,
        json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {"name": "profile_set", "arguments": {"name": "default"}}}),
    )
    .await
    .unwrap();
    assert_eq!(set_resp["result"]["isError"], false);
    assert_eq!(set_resp["result"]["structuredContent"]["profile"], "default");

    let show_resp = send(
        &fx,
        json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {"name": "context_show", "arguments": {}}}),
    )
    .await
    .unwrap();
    assert_eq!(show_resp["result"]["isError"], false);
    // `k8s_context` matches the configured sensitive substring `context`, so
    // the whole value is masked rather than leaking `secret-prod`.
    assert_eq!(show_resp["result"]["structuredContent"]["k8s_context"], "[REDACTED]");
    assert_eq!(show_resp["result"]["structuredContent"]["k8s_namespace"], "default");
}

#[tokio::test]
async fn every_tool_call_outcome_is_audited() {
    let fx = fixture();
    handshake(&fx).await;

    for id in [10, 11, 12] {
        send(
            &fx,
            json!({"jsonrpc": "2.0", "id": id, "method": "tools/call", "params": {"name": "context_show", "arguments": {}}}),
        )
        .await;
    }
    // Out-of-scope refusals are audited too, even though they never reach a handler.
    send(
        &fx,
        json!({"jsonrpc": "2.0", "id": 13, "method": "tools/call", "params": {"name": "docker_list_containers", "arguments": {}}}),
    )
    .await;

    let contents = std::fs::read_to_string(&fx.audit_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|line| line.contains("\"profile\":\"default\"")));
    assert!(lines.iter().any(|line| line.contains("policy-refusal:out-of-scope")));
}

#[tokio::test]
async fn explicit_scope_setting_admits_only_named_tools() {
    let fx = fixture_with_scope(ScopeSetting::Explicit(vec!["context_show".to_string()]));
    handshake(&fx).await;

    let list = send(&fx, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await.unwrap();
    let names: Vec<&str> = list["result"]["tools"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["context_show"]);

    let refused = send(
        &fx,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "ssh_execute", "arguments": {"server": "h1", "command": "true"}}}),
    )
    .await
    .unwrap();
    assert_eq!(refused["result"]["isError"], true);
    assert_eq!(refused["result"]["structuredContent"]["error_kind"], "OutOfScope");
}
