use thiserror::Error;

/// Caller-facing failures of the interpretation and dispatch pipeline.
///
/// Oracle failures never appear here: the interpreter absorbs them into
/// "no operation selected".
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("missing required field: {0}")]
    MissingInput(String),

    #[error("missing credential: {0} is not set")]
    MissingCredential(String),

    #[error("provider '{provider}' unreachable: {reason}")]
    ProviderUnreachable { provider: String, reason: String },

    #[error("operation '{name}' is advertised by both '{first}' and '{second}'")]
    DuplicateOperationName {
        name: String,
        first: String,
        second: String,
    },

    #[error("provider endpoint '{0}' is configured more than once")]
    DuplicateProvider(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("invocation failed: {0}")]
    InvocationFailure(String),

    #[error("request cancelled")]
    Cancelled,
}

impl RouterError {
    /// Stable machine-readable kind, used in response envelopes and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingInput(_) => "missing_input",
            Self::MissingCredential(_) => "missing_credential",
            Self::ProviderUnreachable { .. } => "provider_unreachable",
            Self::DuplicateOperationName { .. } => "duplicate_operation_name",
            Self::DuplicateProvider(_) => "duplicate_provider",
            Self::UnknownOperation(_) => "unknown_operation",
            Self::InvocationFailure(_) => "invocation_failure",
            Self::Cancelled => "cancelled",
        }
    }
}
