//! Runtime wiring: turns a prepared `IntentForgeConfig` into the router,
//! its settings, and the logging options.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use intentforge_config::defaults::{
    DEFAULT_BIND, DEFAULT_DISCOVERY_SECS, DEFAULT_INVOCATION_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_TOKENS, DEFAULT_ORACLE_PROVIDER, DEFAULT_ORACLE_SECS, DEFAULT_PORT,
};
use intentforge_config::{credential_var, IntentForgeConfig, LoggingConfig, OracleConfig};
use intentforge_core::LlmProvider;
use intentforge_logging::LoggingOptions;
use intentforge_mcp::McpSessionFactory;
use intentforge_planner::providers::gemini::GeminiProvider;
use intentforge_planner::providers::ollama::OllamaProvider;
use intentforge_planner::providers::openrouter::OpenRouterProvider;
use intentforge_planner::OracleOptions;
use intentforge_router::{OracleHandle, Router, RouterSettings};

pub fn logging_options(logging: Option<&LoggingConfig>) -> LoggingOptions {
    let logging = logging.cloned().unwrap_or_default();
    LoggingOptions {
        level: logging.level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        dir: logging.dir.filter(|d| !d.trim().is_empty()).map(PathBuf::from),
        json: logging.json.unwrap_or(false),
    }
}

pub fn router_settings(config: &IntentForgeConfig) -> RouterSettings {
    let timeouts = config.timeouts.clone().unwrap_or_default();
    let oracle = config.oracle.clone().unwrap_or_default();
    let defaults = OracleOptions::default();
    RouterSettings {
        discovery_timeout: Duration::from_secs(
            timeouts.discovery_secs.unwrap_or(DEFAULT_DISCOVERY_SECS),
        ),
        invocation_timeout: Duration::from_secs(
            timeouts.invocation_secs.unwrap_or(DEFAULT_INVOCATION_SECS),
        ),
        oracle: OracleOptions {
            model: oracle.model.unwrap_or(defaults.model),
            max_tokens: oracle.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: oracle.temperature.unwrap_or(defaults.temperature),
            timeout: Duration::from_secs(timeouts.oracle_secs.unwrap_or(DEFAULT_ORACLE_SECS)),
        },
    }
}

/// Build the configured oracle backend.
///
/// Hosted backends without a key stay unconfigured; requests then fail with
/// a missing-credential error naming the variable to set.
pub fn oracle_handle(oracle: &OracleConfig) -> OracleHandle {
    let provider = oracle
        .provider
        .as_deref()
        .unwrap_or(DEFAULT_ORACLE_PROVIDER);
    let api_key = oracle
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());
    let base_url = oracle.base_url.as_deref().filter(|u| !u.is_empty());

    let backend: Option<Arc<dyn LlmProvider>> = match (provider, api_key) {
        ("gemini", Some(key)) => {
            let mut gemini = GeminiProvider::new(key);
            if let Some(url) = base_url {
                gemini = gemini.with_base_url(url);
            }
            Some(Arc::new(gemini))
        }
        ("openrouter", Some(key)) => {
            let mut openrouter = OpenRouterProvider::new(key);
            if let Some(url) = base_url {
                openrouter = openrouter.with_base_url(url);
            }
            Some(Arc::new(openrouter))
        }
        ("ollama", _) => {
            let mut ollama = OllamaProvider::new();
            if let Some(url) = base_url {
                ollama = ollama.with_base_url(url);
            }
            Some(Arc::new(ollama))
        }
        _ => None,
    };

    match backend {
        Some(backend) => {
            info!(provider, "Using oracle provider");
            OracleHandle::Available(backend)
        }
        None => {
            let credential = credential_var(provider).unwrap_or(provider).to_string();
            warn!(provider, credential = %credential, "Oracle provider has no credential");
            OracleHandle::Unconfigured { credential }
        }
    }
}

pub fn bind_addr(config: &IntentForgeConfig, port: Option<u16>) -> Result<SocketAddr> {
    let gateway = config.gateway.clone().unwrap_or_default();
    let bind = gateway.bind.unwrap_or_else(|| DEFAULT_BIND.to_string());
    let port = port.or(gateway.port).unwrap_or(DEFAULT_PORT);
    format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("Invalid bind address {bind}:{port}"))
}

pub fn build_router(config: &IntentForgeConfig) -> Router {
    let oracle = oracle_handle(&config.oracle.clone().unwrap_or_default());
    Router::new(
        Arc::new(McpSessionFactory::new()),
        config.endpoints(),
        oracle,
        router_settings(config),
    )
}
