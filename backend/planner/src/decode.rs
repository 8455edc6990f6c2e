//! Strict decoding of the oracle's reply into a `CandidateCall`.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use intentforge_core::CandidateCall;

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("reply is not a JSON object matching {{tool, params}}: {0}")]
    Schema(String),
    #[error("reply names an empty tool")]
    EmptyTool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawToolCall {
    tool: String,
    params: Map<String, Value>,
}

/// Decode the oracle text. Any deviation from the exact two-field schema is an error.
///
/// `"None"` (any case) maps to `CandidateCall::None`; the params of a "None"
/// reply are discarded.
pub fn decode_candidate(text: &str) -> Result<CandidateCall, DecodeError> {
    let raw: RawToolCall =
        serde_json::from_str(text.trim()).map_err(|e| DecodeError::Schema(e.to_string()))?;
    let tool = raw.tool.trim();
    if tool.eq_ignore_ascii_case("none") {
        return Ok(CandidateCall::None);
    }
    if tool.is_empty() {
        return Err(DecodeError::EmptyTool);
    }
    Ok(CandidateCall::operation(tool, raw.params))
}
