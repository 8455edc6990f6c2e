//! Config defaults: fill every field a running router reads.

use crate::schema::{GatewayConfig, IntentForgeConfig, LoggingConfig, OracleConfig, TimeoutsConfig};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9000;

pub const DEFAULT_ORACLE_PROVIDER: &str = "gemini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

pub const DEFAULT_DISCOVERY_SECS: u64 = 10;
pub const DEFAULT_ORACLE_SECS: u64 = 30;
pub const DEFAULT_INVOCATION_SECS: u64 = 30;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults. Values already present are never replaced.
pub fn apply_all_defaults(config: IntentForgeConfig) -> IntentForgeConfig {
    let config = apply_gateway_defaults(config);
    let config = apply_oracle_defaults(config);
    let config = apply_timeout_defaults(config);
    apply_logging_defaults(config)
}

fn apply_gateway_defaults(mut config: IntentForgeConfig) -> IntentForgeConfig {
    let gateway = config.gateway.get_or_insert_with(GatewayConfig::default);
    gateway.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    gateway.port.get_or_insert(DEFAULT_PORT);
    config
}

/// Model default depends on the oracle provider.
fn apply_oracle_defaults(mut config: IntentForgeConfig) -> IntentForgeConfig {
    let oracle = config.oracle.get_or_insert_with(OracleConfig::default);
    let provider = oracle
        .provider
        .get_or_insert_with(|| DEFAULT_ORACLE_PROVIDER.to_string())
        .clone();
    if oracle.model.is_none() {
        let model = match provider.as_str() {
            "openrouter" => DEFAULT_OPENROUTER_MODEL,
            "ollama" => DEFAULT_OLLAMA_MODEL,
            _ => DEFAULT_GEMINI_MODEL,
        };
        oracle.model = Some(model.to_string());
    }
    oracle.temperature.get_or_insert(0.0);
    oracle.max_tokens.get_or_insert(DEFAULT_MAX_TOKENS);
    config
}

fn apply_timeout_defaults(mut config: IntentForgeConfig) -> IntentForgeConfig {
    let timeouts = config.timeouts.get_or_insert_with(TimeoutsConfig::default);
    timeouts.discovery_secs.get_or_insert(DEFAULT_DISCOVERY_SECS);
    timeouts.oracle_secs.get_or_insert(DEFAULT_ORACLE_SECS);
    timeouts.invocation_secs.get_or_insert(DEFAULT_INVOCATION_SECS);
    config
}

fn apply_logging_defaults(mut config: IntentForgeConfig) -> IntentForgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(false);
    config
}
