use std::sync::Arc;

use serde_json::Value;

use crate::context::ServerContext;
use crate::registry::Registry;
use crate::session::{ClientInfo, SessionHandle, SessionPhase};

use super::codes;
use super::wire::{Dispatched, Envelope, IncomingPayload, OutgoingPayload, Response, RpcError};

/// Decodes a raw transport payload, routes it (or each element of a batch)
/// through the dispatch table, and re-encodes whatever responses resulted.
/// Returns `None` when nothing should be written back: a lone notification,
/// or a batch whose every element was a notification (§4.2).
pub async fn handle_payload(
    ctx: Arc<ServerContext>,
    session: SessionHandle,
    registry: Arc<Registry>,
    raw: &str,
) -> Option<String> {
    let payload: IncomingPayload = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(_) => {
            let response = Response::err(
                Value::Null,
                RpcError { code: codes::PARSE_ERROR, message: "invalid JSON".to_string(), data: None },
            );
            return Some(encode(&OutgoingPayload::Single(response)));
        }
    };

    match payload {
        IncomingPayload::Single(value) => {
            match dispatch_value(&ctx, &session, &registry, value).await {
                Dispatched::Response(response) => Some(encode(&OutgoingPayload::Single(response))),
                Dispatched::NoResponse => None,
            }
        }
        IncomingPayload::Batch(values) => {
            let mut responses = Vec::with_capacity(values.len());
            for value in values {
                if let Dispatched::Response(response) = dispatch_value(&ctx, &session, &registry, value).await {
                    responses.push(response);
                }
            }
            if responses.is_empty() {
                None
            } else {
                Some(encode(&OutgoingPayload::Batch(responses)))
            }
        }
    }
}

/// Parses a single batch element (or the whole non-batch payload) into an
/// [`Envelope`] and dispatches it, producing `-32700` for an element that
/// doesn't even parse into the envelope shape.
async fn dispatch_value(
    ctx: &Arc<ServerContext>,
    session: &SessionHandle,
    registry: &Arc<Registry>,
    value: Value,
) -> Dispatched {
    let envelope: Envelope = match serde_json::from_value(value) {
        Ok(envelope) => envelope,
        Err(_) => {
            return Dispatched::Response(Response::err(
                Value::Null,
                RpcError { code: codes::PARSE_ERROR, message: "malformed request envelope".to_string(), data: None },
            ));
        }
    };

    dispatch_envelope(ctx, session, registry, envelope).await
}

async fn dispatch_envelope(
    ctx: &Arc<ServerContext>,
    session: &SessionHandle,
    registry: &Arc<Registry>,
    envelope: Envelope,
) -> Dispatched {
    let id = envelope.id.clone().unwrap_or(Value::Null);
    let is_notification = envelope.is_notification();

    if !envelope.is_well_formed() {
        return respond_unless_notification(
            is_notification,
            id,
            RpcError { code: codes::INVALID_REQUEST, message: "malformed JSON-RPC 2.0 envelope".to_string(), data: None },
        );
    }

    let method = envelope.method.as_deref().unwrap_or_default();
    match method {
        super::METHOD_INITIALIZE => handle_initialize(session, id, is_notification, envelope.params).await,
        super::METHOD_INITIALIZED => {
            handle_initialized(ctx, session, registry, id, is_notification).await
        }
        super::METHOD_PING => {
            if !session_ready_or_handshaking(session, method).await {
                return respond_unless_notification(
                    is_notification,
                    id,
                    RpcError { code: codes::INVALID_REQUEST, message: "session not ready".to_string(), data: None },
                );
            }
            Dispatched::Response(Response::ok(id, serde_json::json!({})))
        }
        super::METHOD_TOOLS_LIST => handle_tools_list(session, registry, id, is_notification).await,
        super::METHOD_TOOLS_CALL => {
            crate::dispatch::handle_tools_call(ctx, session, registry, id, is_notification, envelope.params).await
        }
        _ => respond_unless_notification(
            is_notification,
            id,
            RpcError { code: codes::METHOD_NOT_FOUND, message: format!("unknown method `{method}`"), data: None },
        ),
    }
}

async fn session_ready_or_handshaking(session: &SessionHandle, method: &str) -> bool {
    let guard = session.read().await;
    match guard.phase {
        SessionPhase::Ready => true,
        SessionPhase::Closed => false,
        _ => method == super::METHOD_PING,
    }
}

async fn handle_initialize(
    session: &SessionHandle,
    id: Value,
    is_notification: bool,
    params: Value,
) -> Dispatched {
    let client_info: ClientInfo = match params.get("clientInfo").cloned() {
        Some(value) => match serde_json::from_value(value) {
            Ok(info) => info,
            Err(_) => {
                return respond_unless_notification(
                    is_notification,
                    id,
                    RpcError { code: codes::INVALID_PARAMS, message: "clientInfo".to_string(), data: None },
                );
            }
        },
        None => {
            return respond_unless_notification(
                is_notification,
                id,
                RpcError { code: codes::INVALID_PARAMS, message: "clientInfo".to_string(), data: None },
            );
        }
    };

    let mut guard = session.write().await;
    if guard.begin_initialize(client_info).is_err() {
        return respond_unless_notification(
            is_notification,
            id,
            RpcError { code: codes::INVALID_REQUEST, message: "session already initialized".to_string(), data: None },
        );
    }
    drop(guard);

    let result = serde_json::json!({
        "protocolVersion": super::PROTOCOL_VERSION,
        "serverInfo": { "name": "ops-core", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "tools": { "listChanged": false } },
    });
    respond_unless_notification_ok(is_notification, id, result)
}

async fn handle_initialized(
    ctx: &Arc<ServerContext>,
    session: &SessionHandle,
    registry: &Arc<Registry>,
    id: Value,
    is_notification: bool,
) -> Dispatched {
    let scope_filter = ctx.resolve_scope(registry);
    let mut guard = session.write().await;
    if guard.commit_ready(scope_filter).is_err() {
        return respond_unless_notification(
            is_notification,
            id,
            RpcError { code: codes::INVALID_REQUEST, message: "initialized received out of order".to_string(), data: None },
        );
    }
    // `initialized` is always a notification per the dispatch table; a
    // client that sends it as a request still gets an empty ack rather
    // than silence, since nothing in §4.2 forbids a response here.
    respond_unless_notification_ok(is_notification, id, serde_json::json!({}))
}

async fn handle_tools_list(
    session: &SessionHandle,
    registry: &Arc<Registry>,
    id: Value,
    is_notification: bool,
) -> Dispatched {
    let guard = session.read().await;
    if !guard.is_ready() {
        return respond_unless_notification(
            is_notification,
            id,
            RpcError { code: codes::INVALID_REQUEST, message: "session not ready".to_string(), data: None },
        );
    }
    let tools: Vec<Value> = registry
        .all()
        .filter(|tool| guard.scope_filter.contains(tool.name))
        .map(|tool| tool.public_json())
        .collect();
    respond_unless_notification_ok(is_notification, id, serde_json::json!({ "tools": tools }))
}

fn respond_unless_notification(is_notification: bool, id: Value, error: RpcError) -> Dispatched {
    if is_notification {
        Dispatched::NoResponse
    } else {
        Dispatched::Response(Response::err(id, error))
    }
}

fn respond_unless_notification_ok(is_notification: bool, id: Value, result: Value) -> Dispatched {
    if is_notification {
        Dispatched::NoResponse
    } else {
        Dispatched::Response(Response::ok(id, result))
    }
}

fn encode(payload: &OutgoingPayload) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"failed to encode response"}}"#.to_string()
    })
}
