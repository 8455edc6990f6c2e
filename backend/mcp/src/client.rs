//! MCP session over streamable HTTP.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use intentforge_core::{
    InvocationError, OperationDescriptor, ProviderEndpoint, ProviderSession, SessionFactory,
};

use crate::error::McpError;
use crate::jsonrpc::{decode_event_stream, decode_json_body, JsonRpcRequest};

/// Protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_HEADER: &str = "mcp-protocol-version";

/// Upper bound on `tools/list` pages, guards against a provider that never stops paginating.
const MAX_LIST_PAGES: usize = 64;

/// One initialized connection to an MCP provider.
pub struct McpSession {
    provider: String,
    url: String,
    http: Client,
    token: Option<String>,
    session_id: Option<String>,
    protocol_version: String,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl McpSession {
    /// Run the `initialize` handshake and return a ready session.
    pub async fn connect(
        http: Client,
        endpoint: &ProviderEndpoint,
        client_name: &str,
        client_version: &str,
    ) -> Result<Self, McpError> {
        let mut session = Self {
            provider: endpoint.name.clone(),
            url: endpoint.url.trim_end_matches('/').to_string(),
            http,
            token: endpoint.token.clone(),
            session_id: None,
            protocol_version: PROTOCOL_VERSION.to_string(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        };

        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": client_name, "version": client_version },
        });
        let (result, session_id) = session.send("initialize", params).await?;
        session.session_id = session_id;
        if let Some(version) = result.get("protocolVersion").and_then(Value::as_str) {
            session.protocol_version = version.to_string();
        }

        if let Err(e) = session.notify("notifications/initialized").await {
            // The server already holds a session for us.
            if let Err(close_err) = session.close().await {
                debug!(provider = %session.provider, error = %close_err, "Close after failed handshake failed");
            }
            return Err(e);
        }

        info!(
            provider = %session.provider,
            url = %session.url,
            protocol = %session.protocol_version,
            stateful = session.session_id.is_some(),
            "MCP session initialized"
        );
        Ok(session)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn request_builder(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut req = req
            .header(ACCEPT, "application/json, text/event-stream")
            .header(PROTOCOL_HEADER, &self.protocol_version);
        if let Some(id) = &self.session_id {
            req = req.header(SESSION_HEADER, id);
        }
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }
        req
    }

    /// Send one JSON-RPC call and return its result plus any session id the server assigned.
    async fn send(&self, method: &str, params: Value) -> Result<(Value, Option<String>), McpError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(McpError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(provider = %self.provider, method, id, "MCP request");

        let response = self
            .request_builder(self.http.post(&self.url))
            .json(&JsonRpcRequest::call(id, method, params))
            .send()
            .await?;

        let status = response.status();
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);
        let body = response.text().await?;

        if !status.is_success() {
            return Err(McpError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let reply = if is_stream {
            decode_event_stream(&body, id)?
        } else {
            decode_json_body(&body, id)?
        };
        Ok((reply.into_result()?, session_id))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError> {
        self.send(method, params).await.map(|(result, _)| result)
    }

    async fn notify(&self, method: &str) -> Result<(), McpError> {
        let response = self
            .request_builder(self.http.post(&self.url))
            .json(&JsonRpcRequest::notification(method))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderSession for McpSession {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn list_operations(&self) -> Result<Vec<OperationDescriptor>> {
        let mut operations = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.call("tools/list", params).await?;
            let tools = result
                .get("tools")
                .and_then(Value::as_array)
                .ok_or_else(|| McpError::Protocol("tools/list reply has no tools array".into()))?;

            for tool in tools {
                let Some(name) = tool.get("name").and_then(Value::as_str) else {
                    warn!(provider = %self.provider, "Skipping tool without a name");
                    continue;
                };
                let description = tool
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let schema = tool.get("inputSchema").cloned().unwrap_or_else(|| json!({}));
                operations.push(OperationDescriptor::from_input_schema(
                    name,
                    description.trim(),
                    &schema,
                ));
            }

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                return Ok(operations);
            }
        }

        Err(McpError::Protocol(format!(
            "tools/list did not finish within {MAX_LIST_PAGES} pages"
        ))
        .into())
    }

    async fn invoke(
        &self,
        operation: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, InvocationError> {
        let params = json!({ "name": operation, "arguments": arguments });
        let result = self
            .call("tools/call", params)
            .await
            .map_err(|e| InvocationError(e.to_string()))?;
        normalize_call_result(result)
    }

    async fn ping(&self) -> Result<()> {
        self.call("ping", json!({})).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let Some(id) = &self.session_id else {
            return Ok(());
        };

        let mut req = self.http.delete(&self.url).header(SESSION_HEADER, id);
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }
        let status = req.send().await?.status();
        // Servers that do not support explicit termination answer 405.
        if !status.is_success() && status != StatusCode::METHOD_NOT_ALLOWED {
            return Err(McpError::Http {
                status: status.as_u16(),
                body: String::new(),
            }
            .into());
        }
        debug!(provider = %self.provider, "MCP session closed");
        Ok(())
    }
}

/// Turn a `tools/call` result into the payload handed back to the caller.
///
/// Preference order: `structuredContent`, a lone text item that is itself JSON,
/// a lone text item as a string, the raw `content` array.
pub fn normalize_call_result(result: Value) -> Result<Value, InvocationError> {
    let content = result
        .get("content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        let detail = content_text(&content);
        return Err(InvocationError(if detail.is_empty() {
            "provider reported an error without detail".to_string()
        } else {
            detail
        }));
    }

    if let Some(structured) = result.get("structuredContent").filter(|v| !v.is_null()) {
        // Scalar and list results are wrapped by the server as {"result": ...}.
        if let Some(inner) = structured.as_object().and_then(|o| {
            if o.len() == 1 {
                o.get("result")
            } else {
                None
            }
        }) {
            return Ok(inner.clone());
        }
        return Ok(structured.clone());
    }

    if let [single] = content.as_slice() {
        if let Some(text) = single.get("text").and_then(Value::as_str) {
            return Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.into())));
        }
    }
    Ok(Value::Array(content))
}

fn content_text(content: &[Value]) -> String {
    content
        .iter()
        .filter_map(|c| c.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Opens one fresh `McpSession` per endpoint per request.
pub struct McpSessionFactory {
    http: Client,
    client_name: String,
    client_version: String,
}

impl McpSessionFactory {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self {
            http,
            client_name: "intentforge".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for McpSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionFactory for McpSessionFactory {
    async fn connect(&self, endpoint: &ProviderEndpoint) -> Result<Box<dyn ProviderSession>> {
        let session = McpSession::connect(
            self.http.clone(),
            endpoint,
            &self.client_name,
            &self.client_version,
        )
        .await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};

    #[derive(Clone, Default)]
    struct Fake {
        deletes: Arc<AtomicUsize>,
        sse: bool,
        reject_initialized: bool,
    }

    fn reply(fake: &Fake, id: &Value, result: Value) -> Response {
        let body = json!({ "jsonrpc": "2.0", "id": id, "result": result });
        if fake.sse {
            (
                [("content-type", "text/event-stream")],
                format!("event: message\ndata: {body}\n\n"),
            )
                .into_response()
        } else {
            Json(body).into_response()
        }
    }

    async fn handle(State(fake): State<Fake>, headers: HeaderMap, Json(req): Json<Value>) -> Response {
        let method = req["method"].as_str().unwrap_or_default().to_string();
        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if method == "initialize" {
            let mut resp = reply(&fake, &id, json!({ "protocolVersion": PROTOCOL_VERSION }));
            resp.headers_mut()
                .insert(SESSION_HEADER, "sess-1".parse().unwrap());
            return resp;
        }
        if method == "notifications/initialized" {
            if fake.reject_initialized {
                return (AxumStatus::INTERNAL_SERVER_ERROR, "boom").into_response();
            }
            return AxumStatus::ACCEPTED.into_response();
        }
        if headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) != Some("sess-1") {
            return (AxumStatus::BAD_REQUEST, "missing session").into_response();
        }

        match method.as_str() {
            "tools/list" if req["params"].get("cursor").is_none() => reply(
                &fake,
                &id,
                json!({
                    "tools": [{
                        "name": "add_expense",
                        "description": "Add a new expense entry to the database.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "date": {"type": "string"},
                                "amount": {"type": "number"},
                                "category": {"type": "string"}
                            },
                            "required": ["date", "amount", "category"]
                        }
                    }],
                    "nextCursor": "page-2"
                }),
            ),
            "tools/list" => reply(
                &fake,
                &id,
                json!({ "tools": [{ "name": "list_expenses", "inputSchema": {} }] }),
            ),
            "tools/call" if req["params"]["name"] == "add_expense" => reply(
                &fake,
                &id,
                json!({
                    "content": [{"type": "text", "text": "{\"status\":\"ok\",\"id\":1}"}],
                    "structuredContent": {"status": "ok", "id": 1},
                    "isError": false
                }),
            ),
            "tools/call" => reply(
                &fake,
                &id,
                json!({
                    "content": [{"type": "text", "text": "Error calling tool 'list_expenses': bad date"}],
                    "isError": true
                }),
            ),
            "ping" => reply(&fake, &id, json!({})),
            _ => Json(json!({
                "jsonrpc": "2.0", "id": id,
                "error": {"code": -32601, "message": "Method not found"}
            }))
            .into_response(),
        }
    }

    async fn delete(State(fake): State<Fake>) -> AxumStatus {
        fake.deletes.fetch_add(1, Ordering::SeqCst);
        AxumStatus::OK
    }

    async fn spawn_fake(fake: Fake) -> ProviderEndpoint {
        let app = Router::new()
            .route("/mcp", post(handle).delete(delete))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        ProviderEndpoint::new("expensetracker", format!("http://{addr}/mcp"))
    }

    async fn roundtrip(sse: bool) {
        let fake = Fake {
            sse,
            ..Default::default()
        };
        let deletes = fake.deletes.clone();
        let endpoint = spawn_fake(fake).await;

        let factory = McpSessionFactory::new();
        let session = factory.connect(&endpoint).await.unwrap();
        assert_eq!(session.provider(), "expensetracker");

        let ops = session.list_operations().await.unwrap();
        let names: Vec<_> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["add_expense", "list_expenses"]);
        assert!(ops[0].parameters["amount"].required);

        let mut args = Map::new();
        args.insert("amount".into(), json!(200));
        let payload = session.invoke("add_expense", args).await.unwrap();
        assert_eq!(payload, json!({"status": "ok", "id": 1}));

        let err = session.invoke("list_expenses", Map::new()).await.unwrap_err();
        assert_eq!(err.0, "Error calling tool 'list_expenses': bad date");

        session.ping().await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(deletes.load(Ordering::SeqCst), 1);
        assert!(session.ping().await.is_err());
    }

    #[tokio::test]
    async fn json_transport_roundtrip() {
        roundtrip(false).await;
    }

    #[tokio::test]
    async fn event_stream_transport_roundtrip() {
        roundtrip(true).await;
    }

    #[tokio::test]
    async fn failed_handshake_deletes_server_session() {
        let fake = Fake {
            reject_initialized: true,
            ..Default::default()
        };
        let deletes = fake.deletes.clone();
        let endpoint = spawn_fake(fake).await;

        let err = McpSession::connect(Client::new(), &endpoint, "intentforge", "test")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::Http { status: 500, .. }));
        assert_eq!(deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_to_dead_port_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let endpoint = ProviderEndpoint::new("gone", format!("http://{addr}/mcp"));
        assert!(McpSessionFactory::new().connect(&endpoint).await.is_err());
    }

    #[test]
    fn normalize_prefers_structured_content() {
        let out = normalize_call_result(json!({
            "content": [{"type": "text", "text": "ignored"}],
            "structuredContent": {"result": [{"id": 1}]}
        }))
        .unwrap();
        assert_eq!(out, json!([{"id": 1}]));
    }

    #[test]
    fn normalize_plain_text() {
        let out = normalize_call_result(json!({
            "content": [{"type": "text", "text": "done"}]
        }))
        .unwrap();
        assert_eq!(out, json!("done"));
    }

    #[test]
    fn normalize_multiple_items_returns_content() {
        let content = json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]);
        let out = normalize_call_result(json!({ "content": content.clone() })).unwrap();
        assert_eq!(out, content);
    }
}
