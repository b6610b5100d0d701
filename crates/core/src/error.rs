use thiserror::Error;

/// Failure kinds a tool dispatch surfaces to the reasoning driver.
///
/// Every precondition failure is an explicit variant so callers handle
/// each kind deliberately instead of matching on message strings.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no user identity in session metadata")]
    IdentityMissing,

    #[error("no active interview to save answers against")]
    NoActiveInterview,

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: &'static str,
        source: serde_json::Error,
    },

    #[error("session already terminated")]
    SessionClosed,

    #[error("interview generation rejected ({status}): {detail}")]
    GenerationRejected { status: u16, detail: String },

    #[error("interview generation endpoint unreachable: {0}")]
    GenerationUnreachable(String),

    #[error("document store write failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("runtime command channel closed")]
    RuntimeClosed,
}

impl AgentError {
    /// Stable taxonomy name used on the driver protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IdentityMissing => "identity_missing",
            Self::NoActiveInterview => "no_active_interview",
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::SessionClosed => "session_closed",
            Self::GenerationRejected { .. } => "generation_rejected",
            Self::GenerationUnreachable(_) => "generation_unreachable",
            Self::Persistence(_) => "persistence_failure",
            Self::RuntimeClosed => "runtime_closed",
        }
    }
}

/// Document store failures, kept distinct so writes are never silently
/// dropped.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("document store rejected write ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
}
