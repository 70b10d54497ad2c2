use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request or notification envelope.
///
/// `id` is `None` for notifications. `params` is left as a raw [`Value`] so
/// method-specific deserialization can produce precise `-32602` paths.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "jsonrpc")]
    pub version: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<Value>,
}

impl Envelope {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// True when the envelope shape itself is well-formed JSON-RPC 2.0,
    /// independent of whether `method` names something we know about.
    pub fn is_well_formed(&self) -> bool {
        self.version.as_deref() == Some("2.0") && self.method.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    #[serde(rename = "jsonrpc")]
    pub version: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Result { result: Value },
    Error { error: RpcError },
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self { version: "2.0", id, outcome: Outcome::Result { result } }
    }

    pub fn err(id: Value, error: RpcError) -> Self {
        Self { version: "2.0", id, outcome: Outcome::Error { error } }
    }
}

/// What a single envelope (inside or outside a batch) produced: either a
/// response to write back, or nothing (a successfully handled notification).
pub enum Dispatched {
    Response(Response),
    NoResponse,
}

/// The raw shape of a decoded payload, before each element is individually
/// re-parsed into an [`Envelope`]. Kept as [`Value`] rather than
/// `Vec<Envelope>` so that one malformed element inside a batch produces a
/// single `-32700` for that element without poisoning the whole array
/// (§8 boundary behavior).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IncomingPayload {
    Batch(Vec<Value>),
    Single(Value),
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutgoingPayload {
    Batch(Vec<Response>),
    Single(Response),
}
