//! Structured logging for IntentForge.
//!
//! Subscriber initialisation (console plus optional rolling JSON file) and
//! redaction of secrets in text that is about to be logged.

pub mod logger;
pub mod redact;

pub use logger::{init_logger, LoggerGuard, LoggingOptions};
pub use redact::redact_sensitive_data;
