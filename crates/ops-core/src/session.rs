use std::{
    collections::HashSet,
    sync::{atomic::AtomicU64, Arc},
};

use serde::Deserialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    PreInit,
    Initializing,
    Ready,
    Closed,
}

#[derive(Debug)]
pub struct Session {
    pub phase: SessionPhase,
    pub client_info: Option<ClientInfo>,
    pub protocol_version: String,
    pub active_profile: String,
    pub scope_filter: HashSet<String>,
    pub conversation_counter: AtomicU64,
}

/// Thread-safe handle shared between the transport loop and the tools that
/// may mutate session state (`profile_set`). Single-writer per §5: only the
/// owning transport's dispatch loop calls the `&mut self` transitions.
pub type SessionHandle = Arc<RwLock<Session>>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session already initialized")]
    AlreadyInitialized,
    #[error("session is not ready: tool calls require initialize + initialized first")]
    NotReady,
}

impl Session {
    pub fn new(default_profile: &str) -> Self {
        Self {
            phase: SessionPhase::PreInit,
            client_info: None,
            protocol_version: crate::protocol::PROTOCOL_VERSION.to_string(),
            active_profile: default_profile.to_string(),
            scope_filter: HashSet::new(),
            conversation_counter: AtomicU64::new(0),
        }
    }

    pub fn handle(default_profile: &str) -> SessionHandle {
        Arc::new(RwLock::new(Self::new(default_profile)))
    }

    pub fn begin_initialize(&mut self, client_info: ClientInfo) -> Result<(), SessionError> {
        if self.phase != SessionPhase::PreInit {
            return Err(SessionError::AlreadyInitialized);
        }
        self.client_info = Some(client_info);
        self.phase = SessionPhase::Initializing;
        Ok(())
    }

    pub fn commit_ready(&mut self, scope_filter: HashSet<String>) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Initializing {
            return Err(SessionError::NotReady);
        }
        self.scope_filter = scope_filter;
        self.phase = SessionPhase::Ready;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    /// Atomically swaps the active profile and the scope filter it implies;
    /// no in-flight call can observe a half-switched state because both
    /// fields change under the same write lock acquisition.
    pub fn switch_profile(&mut self, profile: &str, scope_filter: HashSet<String>) {
        self.active_profile = profile.to_string();
        self.scope_filter = scope_filter;
    }

    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    pub fn next_conversation_id(&self) -> u64 {
        self.conversation_counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cannot_initialize_twice() {
        let mut session = Session::new("staging");
        session
            .begin_initialize(ClientInfo { name: "t".into(), version: "1".into() })
            .unwrap();
        let err = session.begin_initialize(ClientInfo { name: "t".into(), version: "1".into() });
        assert!(matches!(err, Err(SessionError::AlreadyInitialized)));
    }

    #[test]
    fn ready_requires_initializing_first() {
        let mut session = Session::new("staging");
        let err = session.commit_ready(HashSet::new());
        assert!(matches!(err, Err(SessionError::NotReady)));
    }

    #[test]
    fn full_handshake_reaches_ready() {
        let mut session = Session::new("staging");
        session
            .begin_initialize(ClientInfo { name: "t".into(), version: "1".into() })
            .unwrap();
        session.commit_ready(HashSet::from(["ssh_execute".to_string()])).unwrap();
        assert!(session.is_ready());
    }
}
