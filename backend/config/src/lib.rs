//! Runtime configuration for the IntentForge router.
//!
//! Provides:
//! - Typed config schema (gateway, oracle, providers, timeouts, logging)
//! - YAML loading with path resolution
//! - `${ENV_VAR}` substitution and well-known env overrides
//! - Default value application
//! - Validation (errors stop startup, warnings are logged)
//! - Redaction for safe display

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{
    apply_env_overrides, apply_env_overrides_with, collect_referenced_vars, credential_var,
    resolve_env_vars, resolve_env_vars_with, MissingEnvVarError,
};
pub use io::{config_dir, config_file_path, load_config, parse_config, resolve_config_path};
pub use redact::{collect_redacted_paths, redact};
pub use schema::{
    GatewayConfig, IntentForgeConfig, LoggingConfig, OracleConfig, ProviderConfig, TimeoutsConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

/// Load the file at `path` and run the full pipeline against the process environment.
pub async fn load_and_prepare(path: &Path) -> Result<IntentForgeConfig> {
    let raw = load_config(path).await?;
    prepare_with(raw, &std::env::vars().collect())
        .with_context(|| format!("Invalid config: {}", path.display()))
}

/// Substitution, env overrides, defaults, then validation.
///
/// Validation errors fail the whole call; warnings are logged.
pub fn prepare_with(raw: IntentForgeConfig, env: &HashMap<String, String>) -> Result<IntentForgeConfig> {
    let value: Value =
        serde_json::to_value(&raw).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;
    let config: IntentForgeConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_env_overrides_with(config, env);
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if !report.is_valid() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        let joined = report
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::bail!(joined);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn env_only_setup_is_runnable() {
        let cfg = prepare_with(
            IntentForgeConfig::default(),
            &env(&[
                ("GOOGLE_API_KEY", "AIza-x"),
                ("MCP_SERVER_URL", "http://127.0.0.1:8000/mcp"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.endpoints()[0].name, "expensetracker");
        assert_eq!(cfg.oracle.unwrap().api_key.as_deref(), Some("AIza-x"));
    }

    #[test]
    fn substituted_values_feed_validation() {
        let raw = parse_config(
            "providers:\n  - name: foodcard\n    url: \"${FOOD_URL}\"\n",
        )
        .unwrap();
        let cfg = prepare_with(raw.clone(), &env(&[("FOOD_URL", "https://food.example/mcp")]))
            .unwrap();
        assert_eq!(cfg.providers[0].url, "https://food.example/mcp");

        let err = prepare_with(raw, &env(&[("FOOD_URL", "ftp://nope")])).unwrap_err();
        assert!(err.to_string().contains("providers[0].url"));
    }

    #[test]
    fn empty_environment_fails_on_providers() {
        let err = prepare_with(IntentForgeConfig::default(), &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("providers"));
    }
}
