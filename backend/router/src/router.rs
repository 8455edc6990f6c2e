//! The request pipeline: sessions → catalog → interpret → dispatch → (narrate) → release.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use intentforge_core::{
    CandidateCall, Catalog, DispatchOutcome, Exchange, LlmProvider, ProviderEndpoint, RouterError,
    SessionFactory,
};
use intentforge_planner::{InterpretationRequest, Interpreter, Narrator, OracleOptions};

use crate::dispatcher::Dispatcher;
use crate::session::SessionManager;

/// Result text returned when the interpreter selects no operation.
pub const NO_MATCH_RESULT: &str = "no matching operation";

/// The oracle, or the name of the credential that would have enabled it.
#[derive(Clone)]
pub enum OracleHandle {
    Available(Arc<dyn LlmProvider>),
    Unconfigured { credential: String },
}

#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub discovery_timeout: Duration,
    pub invocation_timeout: Duration,
    pub oracle: OracleOptions,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(10),
            invocation_timeout: Duration::from_secs(30),
            oracle: OracleOptions::default(),
        }
    }
}

/// Inbound request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Exchange>,
    #[serde(default)]
    pub narrate: bool,
    /// Defaults to today's local date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
}

impl RouteRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Success envelope: `{tool, params, result, reply?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub tool: Option<String>,
    pub params: Map<String, Value>,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

/// What one pass through the pipeline produced, before envelope mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub candidate: CandidateCall,
    pub outcome: DispatchOutcome,
    pub reply: Option<String>,
}

impl Routed {
    /// Map the outcome onto the caller-facing envelope.
    pub fn into_response(self) -> Result<RouteResponse, RouterError> {
        match self.outcome {
            DispatchOutcome::Success(result) => Ok(RouteResponse {
                tool: self.candidate.name().map(str::to_string),
                params: self.candidate.arguments(),
                result,
                reply: self.reply,
            }),
            DispatchOutcome::NoOperationSelected => Ok(RouteResponse {
                tool: None,
                params: Map::new(),
                result: Value::String(NO_MATCH_RESULT.to_string()),
                reply: None,
            }),
            DispatchOutcome::UnknownOperation(name) => Err(RouterError::UnknownOperation(name)),
            DispatchOutcome::InvocationFailure(reason) => {
                Err(RouterError::InvocationFailure(reason))
            }
        }
    }
}

/// Reachability of one configured provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub name: String,
    pub url: String,
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Router {
    sessions: SessionManager,
    endpoints: Vec<ProviderEndpoint>,
    oracle: OracleHandle,
    settings: RouterSettings,
}

impl Router {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        endpoints: Vec<ProviderEndpoint>,
        oracle: OracleHandle,
        settings: RouterSettings,
    ) -> Self {
        Self {
            sessions: SessionManager::new(factory, settings.discovery_timeout),
            endpoints,
            oracle,
            settings,
        }
    }

    pub fn endpoints(&self) -> &[ProviderEndpoint] {
        &self.endpoints
    }

    fn oracle(&self) -> Result<&Arc<dyn LlmProvider>, RouterError> {
        match &self.oracle {
            OracleHandle::Available(oracle) => Ok(oracle),
            OracleHandle::Unconfigured { credential } => {
                Err(RouterError::MissingCredential(credential.clone()))
            }
        }
    }

    /// Run one request through the pipeline.
    ///
    /// Input and credential checks fail fast, before any provider is contacted.
    #[instrument(skip_all, fields(narrate = request.narrate, history = request.history.len()))]
    pub async fn route(
        &self,
        request: &RouteRequest,
        cancel: &CancellationToken,
    ) -> Result<Routed, RouterError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(RouterError::MissingInput("message".into()));
        }
        let oracle = self.oracle()?;
        let interpreter = Interpreter::new(oracle.clone(), self.settings.oracle.clone());
        let narrator = Narrator::new(oracle.clone(), self.settings.oracle.clone());
        let dispatcher = Dispatcher::new(self.settings.invocation_timeout);
        let reference_date = request
            .reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        let routed = self
            .sessions
            .with_session(&self.endpoints, cancel, |catalog, sessions| async move {
                let req = InterpretationRequest::new(message, &catalog)
                    .with_reference_date(reference_date)
                    .with_history(&request.history);
                let candidate = interpreter.interpret(&req, cancel).await?;
                let outcome = dispatcher
                    .dispatch(&candidate, &catalog, &sessions, cancel)
                    .await?;

                let reply = match (&outcome, candidate.name()) {
                    (DispatchOutcome::Success(result), Some(tool)) if request.narrate => {
                        narrator.narrate(message, tool, result, cancel).await
                    }
                    _ => None,
                };
                Ok(Routed {
                    candidate,
                    outcome,
                    reply,
                })
            })
            .await?;

        info!(
            operation = routed.candidate.name().unwrap_or("none"),
            success = routed.outcome.is_success(),
            "Request routed"
        );
        Ok(routed)
    }

    /// `route` followed by envelope mapping.
    pub async fn handle(
        &self,
        request: &RouteRequest,
        cancel: &CancellationToken,
    ) -> Result<RouteResponse, RouterError> {
        self.route(request, cancel).await?.into_response()
    }

    /// The merged catalog, using the same per-request session lifecycle.
    pub async fn catalog(&self, cancel: &CancellationToken) -> Result<Catalog, RouterError> {
        self.sessions
            .with_session(&self.endpoints, cancel, |catalog, _| async move {
                Ok(Arc::unwrap_or_clone(catalog))
            })
            .await
    }

    /// Probe every provider independently.
    pub async fn status(&self, cancel: &CancellationToken) -> Vec<ProviderStatus> {
        let probes = self.endpoints.iter().map(|endpoint| async move {
            let result = self.sessions.probe(endpoint, cancel).await;
            ProviderStatus {
                name: endpoint.name.clone(),
                url: endpoint.url.clone(),
                reachable: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            }
        });
        futures::future::join_all(probes).await
    }
}
