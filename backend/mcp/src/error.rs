use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("session already closed")]
    Closed,
}
