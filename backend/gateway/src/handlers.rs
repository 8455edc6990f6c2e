//! Route handlers.
//!
//! Each request gets its own cancellation token, cancelled when the handler
//! future is dropped (client went away), so in-flight work stops and the
//! provider sessions are released.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use intentforge_core::Catalog;
use intentforge_router::{RouteRequest, RouteResponse};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Handler for `POST /interpret`.
pub async fn interpret(
    State(state): State<GatewayState>,
    body: Result<Json<RouteRequest>, JsonRejection>,
) -> Result<Json<RouteResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let response = state.router.handle(&request, &cancel).await?;
    Ok(Json(response))
}

/// `{name, description, provider, parameters}` per operation, catalog order.
fn tool_views(catalog: &Catalog) -> Vec<Value> {
    catalog
        .entries()
        .map(|entry| {
            json!({
                "name": entry.descriptor.name,
                "description": entry.descriptor.description,
                "provider": entry.provider,
                "parameters": entry.descriptor.parameters,
            })
        })
        .collect()
}

/// Handler for `GET /api/tools`.
pub async fn list_tools(State(state): State<GatewayState>) -> Result<Json<Value>, ApiError> {
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let catalog = state.router.catalog(&cancel).await?;
    Ok(Json(json!({ "tools": tool_views(&catalog) })))
}

/// Handler for `GET /api/health`.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "intentforge",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Map;
    use tower::ServiceExt;

    use intentforge_core::{
        InvocationError, OperationDescriptor, ParamType, ProviderEndpoint, ProviderSession,
        SessionFactory,
    };
    use intentforge_planner::providers::mock::MockProvider;
    use intentforge_router::{OracleHandle, Router, RouterSettings};

    #[derive(Default)]
    struct Counters {
        invocations: AtomicUsize,
        closes: AtomicUsize,
    }

    struct ExpenseFactory {
        reachable: bool,
        counters: Arc<Counters>,
    }

    struct ExpenseSession(Arc<Counters>);

    #[async_trait]
    impl SessionFactory for ExpenseFactory {
        async fn connect(
            &self,
            endpoint: &ProviderEndpoint,
        ) -> anyhow::Result<Box<dyn ProviderSession>> {
            if !self.reachable {
                anyhow::bail!("connection refused: {}", endpoint.url);
            }
            Ok(Box::new(ExpenseSession(self.counters.clone())))
        }
    }

    #[async_trait]
    impl ProviderSession for ExpenseSession {
        fn provider(&self) -> &str {
            "expensetracker"
        }

        async fn list_operations(&self) -> anyhow::Result<Vec<OperationDescriptor>> {
            Ok(vec![
                OperationDescriptor::new("add_expense", "Add a new expense entry.")
                    .with_param("date", ParamType::String, None, true)
                    .with_param("amount", ParamType::Number, None, true)
                    .with_param("category", ParamType::String, None, true),
                OperationDescriptor::new("list_expenses", "List expenses in a range.")
                    .with_param("start_date", ParamType::String, None, true)
                    .with_param("end_date", ParamType::String, None, true),
            ])
        }

        async fn invoke(
            &self,
            operation: &str,
            arguments: Map<String, Value>,
        ) -> Result<Value, InvocationError> {
            self.0.invocations.fetch_add(1, Ordering::SeqCst);
            if arguments.get("amount").map_or(false, Value::is_string) {
                return Err(InvocationError("amount: Input should be a valid number".into()));
            }
            Ok(json!({ "status": "ok", "operation": operation }))
        }

        async fn ping(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn close(&self) -> anyhow::Result<()> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn app(reply: &str, reachable: bool, oracle: Option<Arc<MockProvider>>) -> (axum::Router, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let factory = Arc::new(ExpenseFactory {
            reachable,
            counters: counters.clone(),
        });
        let handle = match oracle {
            Some(oracle) => OracleHandle::Available(oracle),
            None if reply.is_empty() => OracleHandle::Unconfigured {
                credential: "GOOGLE_API_KEY".into(),
            },
            None => OracleHandle::Available(Arc::new(MockProvider::new("stub").with_response(reply))),
        };
        let router = Router::new(
            factory,
            vec![ProviderEndpoint::new("expensetracker", "http://127.0.0.1:8000/mcp")],
            handle,
            RouterSettings::default(),
        );
        (build_router(GatewayState::new(router)), counters)
    }

    async fn post(app: axum::Router, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post("/interpret")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn interpret_success_envelope() {
        let (app, counters) = app(
            r#"{"tool": "add_expense", "params": {"date": "2025-10-31", "amount": 200, "category": "groceries"}}"#,
            true,
            None,
        );
        let (status, body) = post(app, r#"{"message": "Add 200 for groceries today"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tool"], "add_expense");
        assert_eq!(body["params"]["amount"], 200);
        assert_eq!(body["result"]["status"], "ok");
        assert!(body.get("reply").is_none());
        assert_eq!(counters.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn interpret_no_match() {
        let (app, counters) = app(r#"{"tool": "None", "params": {}}"#, true, None);
        let (status, body) = post(app, r#"{"message": "blah blah nonsense"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"tool": null, "params": {}, "result": "no matching operation"})
        );
        assert_eq!(counters.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_message_is_400() {
        let (app, counters) = app(r#"{"tool": "None", "params": {}}"#, true, None);
        let (status, body) = post(app, "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "missing_input");
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let (app, _) = app(r#"{"tool": "None", "params": {}}"#, true, None);
        let (status, body) = post(app, "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn missing_credential_is_500() {
        let (app, _) = app("", true, None);
        let (status, body) = post(app, r#"{"message": "Add 200"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["kind"], "missing_credential");
        assert!(body["error"]["message"].as_str().unwrap().contains("GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn unreachable_provider_is_502_without_oracle_call() {
        let oracle = Arc::new(MockProvider::new("stub"));
        let (app, _) = app("unused", false, Some(oracle.clone()));
        let (status, body) = post(app, r#"{"message": "Add 200"}"#).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["kind"], "provider_unreachable");
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn invocation_failure_is_verbatim_500() {
        let (app, counters) = app(
            r#"{"tool": "add_expense", "params": {"amount": "two hundred"}}"#,
            true,
            None,
        );
        let (status, body) = post(app, r#"{"message": "Add two hundred"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["kind"], "invocation_failure");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("amount: Input should be a valid number"));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_operation_is_422() {
        let (app, counters) = app(r#"{"tool": "rm_rf", "params": {}}"#, true, None);
        let (status, body) = post(app, r#"{"message": "delete all"}"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "unknown_operation");
        assert_eq!(counters.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tools_lists_catalog_in_order() {
        let (app, _) = app(r#"{"tool": "None", "params": {}}"#, true, None);
        let response = app
            .oneshot(Request::get("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools[0]["name"], "add_expense");
        assert_eq!(tools[0]["provider"], "expensetracker");
        assert_eq!(tools[0]["parameters"]["amount"]["type"], "number");
        assert_eq!(tools[1]["name"], "list_expenses");
    }

    #[tokio::test]
    async fn health_reports_service() {
        let (app, _) = app("", true, None);
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "intentforge");
    }
}
