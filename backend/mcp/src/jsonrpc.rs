//! JSON-RPC 2.0 envelope types and the event-stream reply decoder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    /// Absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn call(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        }
    }

    pub fn notification(method: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method,
            params: Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    fn answers(&self, id: u64) -> bool {
        match &self.id {
            Some(Value::Number(n)) => n.as_u64() == Some(id),
            Some(Value::String(s)) => s.parse::<u64>().ok() == Some(id),
            _ => false,
        }
    }

    /// Unwrap into the `result` value, turning a JSON-RPC error into `McpError::Rpc`.
    pub fn into_result(self) -> Result<Value, McpError> {
        if let Some(err) = self.error {
            let message = match err.data {
                Some(data) if !data.is_null() => format!("{} ({})", err.message, data),
                _ => err.message,
            };
            return Err(McpError::Rpc {
                code: err.code,
                message,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Pick the reply to request `id` out of a plain JSON body.
pub fn decode_json_body(body: &str, id: u64) -> Result<JsonRpcResponse, McpError> {
    let response: JsonRpcResponse = serde_json::from_str(body)
        .map_err(|e| McpError::Protocol(format!("invalid JSON-RPC body: {e}")))?;
    if response.id.is_some() && !response.answers(id) {
        return Err(McpError::Protocol(format!(
            "reply id {:?} does not match request {id}",
            response.id
        )));
    }
    Ok(response)
}

/// Pick the reply to request `id` out of a `text/event-stream` body.
///
/// Events are separated by blank lines; multi-line `data:` fields are joined
/// with `\n`. Server notifications and replies to other ids are skipped.
pub fn decode_event_stream(body: &str, id: u64) -> Result<JsonRpcResponse, McpError> {
    let mut data = String::new();
    let mut events = Vec::new();
    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !data.is_empty() {
                events.push(std::mem::take(&mut data));
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    events
        .iter()
        .filter_map(|event| serde_json::from_str::<JsonRpcResponse>(event).ok())
        .find(|resp| resp.answers(id))
        .ok_or_else(|| McpError::Protocol(format!("no reply for request {id} in event stream")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_stream_skips_notifications() {
        let body = "event: message\r\n\
                    data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{}}\r\n\
                    \r\n\
                    event: message\r\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"tools\":[]}}\r\n\
                    \r\n";
        let resp = decode_event_stream(body, 3).unwrap();
        assert_eq!(resp.into_result().unwrap(), json!({"tools": []}));
    }

    #[test]
    fn event_stream_joins_multiline_data() {
        let body = "data: {\"jsonrpc\":\"2.0\",\ndata: \"id\":1,\"result\":true}\n\n";
        let resp = decode_event_stream(body, 1).unwrap();
        assert_eq!(resp.into_result().unwrap(), json!(true));
    }

    #[test]
    fn event_stream_without_matching_reply_fails() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":9,\"result\":{}}\n\n";
        assert!(matches!(
            decode_event_stream(body, 1),
            Err(McpError::Protocol(_))
        ));
    }

    #[test]
    fn rpc_error_becomes_mcp_error() {
        let body = r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32602,"message":"Unknown tool: nope"}}"#;
        let err = decode_json_body(body, 2).unwrap().into_result().unwrap_err();
        match err {
            McpError::Rpc { code, message } => {
                assert_eq!(code, -32602);
                assert_eq!(message, "Unknown tool: nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn notification_has_no_id() {
        let body = serde_json::to_value(JsonRpcRequest::notification("notifications/initialized"))
            .unwrap();
        assert!(body.get("id").is_none());
        assert_eq!(body["method"], "notifications/initialized");
    }
}
