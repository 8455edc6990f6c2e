//! Dispatcher: route a candidate call to the provider that owns it.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use intentforge_core::{
    guarded, CandidateCall, Catalog, DispatchOutcome, Interrupted, RouterError,
};
use intentforge_logging::redact_sensitive_data;

use crate::session::SessionSet;

/// Forwards arguments as-is; the owning provider validates them.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    invocation_timeout: Duration,
}

impl Dispatcher {
    pub fn new(invocation_timeout: Duration) -> Self {
        Self { invocation_timeout }
    }

    /// Apply the routing rules in order: no operation, unknown name, invoke.
    ///
    /// The only error is `RouterError::Cancelled`; every other failure is an outcome.
    #[instrument(skip_all, fields(operation = candidate.name().unwrap_or("none")))]
    pub async fn dispatch(
        &self,
        candidate: &CandidateCall,
        catalog: &Catalog,
        sessions: &SessionSet,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, RouterError> {
        let (name, arguments) = match candidate {
            CandidateCall::None => return Ok(DispatchOutcome::NoOperationSelected),
            CandidateCall::Operation { name, arguments } => (name, arguments),
        };

        let Some(entry) = catalog.get(name) else {
            warn!(operation = %name, "Oracle selected an operation outside the catalog");
            return Ok(DispatchOutcome::UnknownOperation(name.clone()));
        };

        let Some(session) = sessions.get(&entry.provider) else {
            return Ok(DispatchOutcome::InvocationFailure(format!(
                "no open session for provider '{}'",
                entry.provider
            )));
        };

        info!(provider = %entry.provider, arguments = arguments.len(), "Invoking operation");
        let outcome = match guarded(
            cancel,
            self.invocation_timeout,
            session.invoke(name, arguments.clone()),
        )
        .await
        {
            Ok(Ok(payload)) => DispatchOutcome::Success(payload),
            Ok(Err(e)) => {
                warn!(provider = %entry.provider, error = %redact_sensitive_data(&e.0), "Invocation failed");
                DispatchOutcome::InvocationFailure(e.0)
            }
            Err(Interrupted::TimedOut(limit)) => {
                warn!(provider = %entry.provider, ?limit, "Invocation timed out");
                DispatchOutcome::InvocationFailure(format!(
                    "operation '{name}' timed out after {limit:?}"
                ))
            }
            Err(Interrupted::Cancelled) => return Err(RouterError::Cancelled),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use crate::testing::{expense_operations, StubFactory, StubProvider};
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    async fn run(
        factory: &Arc<StubFactory>,
        candidate: CandidateCall,
    ) -> Result<DispatchOutcome, RouterError> {
        let manager = SessionManager::new(factory.clone(), Duration::from_secs(5));
        let dispatcher = Dispatcher::new(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        manager
            .with_session(&factory.endpoints(), &cancel, |catalog, sessions| {
                let cancel = cancel.clone();
                async move {
                    dispatcher
                        .dispatch(&candidate, &catalog, &sessions, &cancel)
                        .await
                }
            })
            .await
    }

    fn expenses() -> Arc<StubFactory> {
        Arc::new(
            StubFactory::new().with("expenses", StubProvider::with_operations(expense_operations())),
        )
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn none_never_invokes() {
        let factory = expenses();
        let outcome = run(&factory, CandidateCall::None).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NoOperationSelected);
        assert!(factory.journal().invocations.is_empty());
    }

    #[tokio::test]
    async fn unknown_name_never_invokes() {
        let factory = expenses();
        let outcome = run(&factory, CandidateCall::operation("delete_everything", Map::new()))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::UnknownOperation("delete_everything".into())
        );
        assert!(factory.journal().invocations.is_empty());
    }

    #[tokio::test]
    async fn forwards_arguments_untouched() {
        let factory = expenses();
        // A string amount is forwarded as-is; the provider decides whether it is acceptable.
        let arguments = args(json!({"date": "2025-10-31", "amount": "200", "category": "food"}));
        let outcome = run(
            &factory,
            CandidateCall::operation("record_expense", arguments.clone()),
        )
        .await
        .unwrap();

        assert!(outcome.is_success());
        let journal = factory.journal();
        assert_eq!(
            journal.invocations,
            vec![("expenses".to_string(), "record_expense".to_string(), arguments)]
        );
    }

    #[tokio::test]
    async fn remote_error_is_carried_verbatim() {
        let factory = Arc::new(StubFactory::new().with(
            "expenses",
            StubProvider::with_operations(expense_operations())
                .failing_invoke("amount: value is not a valid float"),
        ));
        let outcome = run(&factory, CandidateCall::operation("record_expense", Map::new()))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::InvocationFailure("amount: value is not a valid float".into())
        );
        assert_eq!(factory.journal().closes.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invocation_timeout_is_a_failure() {
        let factory = Arc::new(StubFactory::new().with(
            "expenses",
            StubProvider::with_operations(expense_operations()).hanging_invoke(),
        ));
        let outcome = run(&factory, CandidateCall::operation("list_expenses", Map::new()))
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::InvocationFailure(reason) if reason.contains("timed out")));
        assert_eq!(factory.journal().closes.len(), 1);
    }
}
