pub mod dates;
pub mod decode;
pub mod interpreter;
pub mod narrator;
pub mod prompt;
pub mod providers;

pub use decode::{decode_candidate, DecodeError};
pub use interpreter::{InterpretationRequest, Interpreter, OracleOptions};
pub use narrator::Narrator;
pub use prompt::{render_catalog, system_instruction, TOOL_CALL_SCHEMA};
