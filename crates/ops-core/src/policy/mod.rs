pub mod allowlist;
pub mod audit;
pub mod redact;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PolicyError {
    #[error("command must not be empty")]
    EmptyCommand,
    #[error("command family `{0}` is not in this profile's allowlist")]
    FamilyNotAllowed(String),
    #[error("verb `{verb}` is not allowed for `{family}` under this profile")]
    VerbNotAllowed { family: String, verb: String },
    #[error("flag `{0}` is refused: dangerous flags are not allowed under this profile")]
    DangerousFlag(String),
    #[error("tool `{0}` is outside the session's scope")]
    OutOfScope(String),
}

impl PolicyError {
    /// Stable label for the structured `error_kind` field (§7); never
    /// changes shape even as the human-readable message wording does.
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyError::EmptyCommand => "EmptyCommand",
            PolicyError::FamilyNotAllowed(_) => "FamilyNotAllowed",
            PolicyError::VerbNotAllowed { .. } => "VerbNotAllowed",
            PolicyError::DangerousFlag(_) => "DangerousFlag",
            PolicyError::OutOfScope(_) => "OutOfScope",
        }
    }
}
