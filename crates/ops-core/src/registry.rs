use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use serde_json::Value;

use crate::context::ServerContext;
use crate::session::SessionHandle;
use ops_adapters::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Core,
    Standard,
    All,
}

impl Scope {
    /// `standard` is a strict superset of `core`; `all` is a strict superset
    /// of `standard` (§4.5).
    pub fn includes(self, tool_scope: Scope) -> bool {
        match (self, tool_scope) {
            (Scope::Core, Scope::Core) => true,
            (Scope::Standard, Scope::Core | Scope::Standard) => true,
            (Scope::All, _) => true,
            _ => false,
        }
    }
}

/// Either the handler succeeded, or the call was refused by policy/validation
/// short of reaching an adapter, or an adapter reported a typed failure.
/// Both refusal kinds surface as `isError: true` tool results, never as a
/// JSON-RPC protocol error (§7).
pub enum ToolFailure {
    Policy { summary: String, error_kind: &'static str },
    Adapter(AdapterError),
}

pub struct ToolOutcome {
    pub text: String,
    pub structured: Option<Value>,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ToolOutcome, ToolFailure>> + Send>>;

pub type ToolHandler =
    Arc<dyn Fn(Arc<ServerContext>, SessionHandle, Value, Duration) -> HandlerFuture + Send + Sync>;

#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub scope: Scope,
    pub mutates: bool,
    pub handler: ToolHandler,
}

impl ToolDescriptor {
    /// The JSON shape handed back from `tools/list`: name, description, and
    /// schema only — the handler reference never leaves the process.
    pub fn public_json(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

#[derive(Default)]
pub struct Registry {
    tools: HashMap<&'static str, ToolDescriptor>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate tool name `{0}`")]
    Duplicate(&'static str),
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder { tools: HashMap::new() }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }
}

pub struct RegistryBuilder {
    tools: HashMap<&'static str, ToolDescriptor>,
}

impl RegistryBuilder {
    pub fn register(mut self, descriptor: ToolDescriptor) -> Result<Self, RegistryError> {
        if self.tools.contains_key(descriptor.name) {
            return Err(RegistryError::Duplicate(descriptor.name));
        }
        self.tools.insert(descriptor.name, descriptor);
        Ok(self)
    }

    pub fn build(self) -> Registry {
        Registry { tools: self.tools }
    }
}
