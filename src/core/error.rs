use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TtlError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Unsupported resource kind '{0}'")]
    UnsupportedKind(String),

    #[error("Failed to list {kind} in namespace '{namespace}': {reason}")]
    ListFailed {
        kind: String,
        namespace: String,
        reason: String,
    },

    #[error("Failed to delete {kind} '{namespace}/{name}': {reason}")]
    DeleteFailed {
        kind: String,
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl TtlError {
    /// Short machine-readable label, used as the `error_kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPolicy(_) => "invalid_policy",
            Self::UnsupportedKind(_) => "unsupported_kind",
            Self::ListFailed { .. } => "list_failed",
            Self::DeleteFailed { .. } => "delete_failed",
            Self::Cancelled(_) => "cancelled",
            Self::Config(_) => "config",
            Self::Store(_) => "store",
        }
    }

    /// Transport-level failures may succeed on a later attempt; policy and
    /// dispatch errors never will.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ListFailed { .. } | Self::DeleteFailed { .. } | Self::Store(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TtlError>;
