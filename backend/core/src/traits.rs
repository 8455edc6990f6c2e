use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::types::{Exchange, OperationDescriptor, ProviderEndpoint};

/// Trait for the text-to-structured-output oracle used by the interpreter.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "gemini", "openrouter").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Earlier turns, oldest first, sent ahead of `user_prompt`.
    pub history: Vec<Exchange>,
    /// JSON schema the reply must conform to. `None` asks for free text.
    pub response_schema: Option<Value>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}

/// Why a remote invocation failed. The message is the provider's detail, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvocationError(pub String);

/// One open connection to a tool provider.
///
/// A session lives for exactly one request and is closed by the session manager.
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// Name of the provider this session is connected to.
    fn provider(&self) -> &str;

    /// Fetch every operation the provider hosts.
    async fn list_operations(&self) -> Result<Vec<OperationDescriptor>>;

    /// Invoke `operation` with `arguments` and return its result payload.
    async fn invoke(
        &self,
        operation: &str,
        arguments: Map<String, Value>,
    ) -> std::result::Result<Value, InvocationError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Release the connection. Must be safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Opens provider sessions. Injected into the session manager so tests can substitute stubs.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self, endpoint: &ProviderEndpoint) -> Result<Box<dyn ProviderSession>>;
}
