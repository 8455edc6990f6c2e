//! Environment handling for config values.
//!
//! Two passes, in order:
//! - `${VAR_NAME}` substitution in string leaves (uppercase names only;
//!   `$${VAR}` escapes to a literal `${VAR}`).
//! - Well-known variables overriding typed fields (`apply_env_overrides`).

use std::collections::HashMap;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::schema::{GatewayConfig, IntentForgeConfig, OracleConfig};

/// `${VAR}` with an optional leading `$` marking an escape.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
pub const MCP_SERVER_URL: &str = "MCP_SERVER_URL";
pub const MCP_SERVER_FOODCARD_URL: &str = "MCP_SERVER_FOODCARD_URL";
pub const BIND_VAR: &str = "INTENTFORGE_BIND";
pub const PORT_VAR: &str = "INTENTFORGE_PORT";

/// Provider that `MCP_SERVER_URL` points at.
pub const DEFAULT_PROVIDER_NAME: &str = "expensetracker";
/// Provider that `MCP_SERVER_FOODCARD_URL` points at.
pub const FOODCARD_PROVIDER_NAME: &str = "foodcard";

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Environment variable that carries the API key of an oracle provider.
pub fn credential_var(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" => Some(GOOGLE_API_KEY),
        "openrouter" => Some(OPENROUTER_API_KEY),
        _ => None,
    }
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute `${VAR}` references using `env`. Unset or empty variables are an error.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    Ok(substitute_value(value, env, "")?)
}

fn substitute_value(
    value: &Value,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<Value, MissingEnvVarError> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(
    s: &str,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<String, MissingEnvVarError> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    match missing {
        Some(err) => Err(err),
        None => Ok(substituted.into_owned()),
    }
}

/// Names referenced as `${VAR}` anywhere in the tree, sorted and deduplicated.
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    fn walk(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.extend(
                ENV_VAR_PATTERN
                    .captures_iter(s)
                    .filter(|caps| caps[1].is_empty())
                    .map(|caps| caps[2].to_string()),
            ),
            Value::Array(arr) => arr.iter().for_each(|v| walk(v, out)),
            Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }
    let mut vars = Vec::new();
    walk(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

/// Apply well-known environment variables from the process environment.
pub fn apply_env_overrides(config: IntentForgeConfig) -> IntentForgeConfig {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply well-known environment variables. Set, non-empty variables win over file values.
pub fn apply_env_overrides_with(
    mut config: IntentForgeConfig,
    env: &HashMap<String, String>,
) -> IntentForgeConfig {
    let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    let oracle = config.oracle.get_or_insert_with(OracleConfig::default);
    let provider = oracle.provider.as_deref().unwrap_or(crate::defaults::DEFAULT_ORACLE_PROVIDER);
    if let Some(key) = credential_var(provider).and_then(get) {
        debug!(provider, "Oracle API key taken from environment");
        oracle.api_key = Some(key.to_string());
    }

    if let Some(url) = get(MCP_SERVER_URL) {
        config.provider_mut(DEFAULT_PROVIDER_NAME).url = url.to_string();
    }
    if let Some(url) = get(MCP_SERVER_FOODCARD_URL) {
        config.provider_mut(FOODCARD_PROVIDER_NAME).url = url.to_string();
    }

    if let Some(bind) = get(BIND_VAR) {
        config.gateway.get_or_insert_with(GatewayConfig::default).bind = Some(bind.to_string());
    }
    if let Some(port) = get(PORT_VAR) {
        match port.parse::<u16>() {
            Ok(port) => {
                config.gateway.get_or_insert_with(GatewayConfig::default).port = Some(port)
            }
            Err(_) => tracing::warn!(value = %port, "Ignoring {PORT_VAR}: not a port number"),
        }
    }

    config
}
