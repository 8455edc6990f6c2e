//! Optional second oracle call that turns a tool result into a short reply.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use intentforge_core::{guarded, LlmProvider, LlmRequest};
use intentforge_logging::redact_sensitive_data;

use crate::interpreter::OracleOptions;

const NARRATION_PROMPT: &str = "You are an AI financial assistant. \
    The user made a request and a tool was executed on their behalf. \
    Reply to the user in one or two plain sentences summarising the tool result. \
    Do not invent figures that are not in the result and do not use markdown.";

pub struct Narrator {
    oracle: Arc<dyn LlmProvider>,
    options: OracleOptions,
}

impl Narrator {
    pub fn new(oracle: Arc<dyn LlmProvider>, options: OracleOptions) -> Self {
        Self { oracle, options }
    }

    fn build_request(&self, message: &str, tool: &str, result: &Value) -> LlmRequest {
        LlmRequest {
            model: self.options.model.clone(),
            system_prompt: NARRATION_PROMPT.to_string(),
            user_prompt: format!(
                "User request: {message}\nTool called: {tool}\nTool result:\n{}",
                serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
            ),
            history: Vec::new(),
            response_schema: None,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        }
    }

    /// Summarise `result` for the user. Any failure, timeout or cancellation yields `None`.
    pub async fn narrate(
        &self,
        message: &str,
        tool: &str,
        result: &Value,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let request = self.build_request(message, tool, result);
        match guarded(cancel, self.options.timeout, self.oracle.complete(&request)).await {
            Ok(Ok(response)) => {
                let reply = response.content.trim().to_string();
                debug!(tool, chars = reply.len(), "Narration produced");
                (!reply.is_empty()).then_some(reply)
            }
            Ok(Err(e)) => {
                warn!(
                    tool,
                    error = %redact_sensitive_data(&format!("{e:#}")),
                    "Narration failed"
                );
                None
            }
            Err(interrupted) => {
                warn!(tool, reason = %interrupted, "Narration interrupted");
                None
            }
        }
    }
}
