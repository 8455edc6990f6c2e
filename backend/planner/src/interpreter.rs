//! Schema-constrained interpreter: free text plus catalog in, `CandidateCall` out.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use intentforge_core::{
    guarded, CandidateCall, Catalog, Exchange, Interrupted, LlmProvider, LlmRequest, RouterError,
};

use crate::dates::fill_date_range;
use crate::decode::decode_candidate;
use crate::prompt::{render_catalog, system_instruction, TOOL_CALL_SCHEMA};

/// Model settings shared by every oracle call.
#[derive(Debug, Clone)]
pub struct OracleOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OracleOptions {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Read-only input of one interpretation.
#[derive(Debug, Clone, Copy)]
pub struct InterpretationRequest<'a> {
    pub message: &'a str,
    pub reference_date: NaiveDate,
    pub catalog: &'a Catalog,
    /// Prior turns the caller passed back in; empty for a standalone request.
    pub history: &'a [Exchange],
}

impl<'a> InterpretationRequest<'a> {
    /// A standalone request dated today (local time).
    pub fn new(message: &'a str, catalog: &'a Catalog) -> Self {
        Self {
            message,
            reference_date: chrono::Local::now().date_naive(),
            catalog,
            history: &[],
        }
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = date;
        self
    }

    pub fn with_history(mut self, history: &'a [Exchange]) -> Self {
        self.history = history;
        self
    }
}

pub struct Interpreter {
    oracle: Arc<dyn LlmProvider>,
    options: OracleOptions,
}

impl Interpreter {
    pub fn new(oracle: Arc<dyn LlmProvider>, options: OracleOptions) -> Self {
        Self { oracle, options }
    }

    /// Build the oracle request for `req`. Pure.
    pub fn build_request(&self, req: &InterpretationRequest<'_>) -> LlmRequest {
        LlmRequest {
            model: self.options.model.clone(),
            system_prompt: system_instruction(req.reference_date, &render_catalog(req.catalog)),
            user_prompt: req.message.to_string(),
            history: req.history.to_vec(),
            response_schema: Some(TOOL_CALL_SCHEMA.clone()),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        }
    }

    /// Turn raw oracle text into a candidate. Pure: decode failures become `None`.
    pub fn interpret_reply(&self, req: &InterpretationRequest<'_>, reply: &str) -> CandidateCall {
        match decode_candidate(reply) {
            Ok(candidate) => {
                fill_date_range(candidate, req.catalog, req.message, req.reference_date)
            }
            Err(e) => {
                warn!(error = %e, "Oracle reply rejected; treating as no operation");
                CandidateCall::None
            }
        }
    }

    /// Ask the oracle which operation `req.message` maps to.
    ///
    /// Oracle errors, timeouts and malformed replies all yield `CandidateCall::None`.
    /// The only error is `RouterError::Cancelled`.
    #[instrument(skip_all, fields(oracle = %self.oracle.name(), operations = req.catalog.len()))]
    pub async fn interpret(
        &self,
        req: &InterpretationRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<CandidateCall, RouterError> {
        let request = self.build_request(req);
        debug!(history = request.history.len(), "Calling oracle");

        let reply = match guarded(cancel, self.options.timeout, self.oracle.complete(&request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(
                    error = %intentforge_logging::redact_sensitive_data(&format!("{e:#}")),
                    "Oracle call failed; treating as no operation"
                );
                return Ok(CandidateCall::None);
            }
            Err(Interrupted::TimedOut(limit)) => {
                warn!(?limit, "Oracle call timed out; treating as no operation");
                return Ok(CandidateCall::None);
            }
            Err(Interrupted::Cancelled) => return Err(RouterError::Cancelled),
        };

        info!(
            tokens = reply.tokens_used,
            latency_ms = reply.latency_ms,
            "Oracle responded"
        );
        Ok(self.interpret_reply(req, &reply.content))
    }
}
