use uuid::Uuid;

/// An unclassified fault that reaches the protocol engine. Carries a
/// correlation id the client can hand back to an operator, who greps the
/// audit log for the matching entry; the detail itself never crosses the
/// wire (§7).
#[derive(Debug, thiserror::Error)]
#[error("internal error {correlation_id}: {detail}")]
pub struct InternalError {
    pub correlation_id: String,
    pub detail: String,
}

impl InternalError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { correlation_id: Uuid::new_v4().to_string(), detail: detail.into() }
    }
}
