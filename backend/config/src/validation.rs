//! Config validation: errors stop startup, warnings are logged.

use std::collections::HashSet;

use thiserror::Error;

use crate::env::credential_var;
use crate::schema::IntentForgeConfig;

pub const KNOWN_ORACLE_PROVIDERS: &[&str] = &["gemini", "openrouter", "ollama"];

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &IntentForgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_providers(config, &mut report);
    validate_oracle(config, &mut report);
    validate_timeouts(config, &mut report);
    validate_gateway(config, &mut report);
    report
}

fn validate_providers(config: &IntentForgeConfig, report: &mut ValidationReport) {
    if config.providers.is_empty() {
        report.error(
            "providers",
            "No tool providers configured; set providers in the config file or MCP_SERVER_URL",
        );
        return;
    }
    let mut seen = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        let path = format!("providers[{i}]");
        if provider.name.trim().is_empty() {
            report.error(format!("{path}.name"), "Provider name cannot be empty");
        } else if !seen.insert(provider.name.as_str()) {
            report.error(
                format!("{path}.name"),
                format!("Duplicate provider name '{}'", provider.name),
            );
        }
        let url = provider.url.trim();
        if url.is_empty() {
            report.error(format!("{path}.url"), "Provider URL cannot be empty");
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            report.error(
                format!("{path}.url"),
                format!("Provider URL '{url}' must start with http:// or https://"),
            );
        }
    }
}

fn validate_oracle(config: &IntentForgeConfig, report: &mut ValidationReport) {
    let Some(oracle) = &config.oracle else { return };
    let Some(provider) = oracle.provider.as_deref() else {
        return;
    };
    if !KNOWN_ORACLE_PROVIDERS.contains(&provider) {
        report.error(
            "oracle.provider",
            format!(
                "Unknown oracle provider '{provider}'. Use one of: {}",
                KNOWN_ORACLE_PROVIDERS.join(", ")
            ),
        );
        return;
    }
    if let Some(var) = credential_var(provider) {
        if oracle.api_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
            report.warn(
                "oracle.apiKey",
                format!("No API key for '{provider}'; requests will fail until {var} is set"),
            );
        }
    }
    if let Some(t) = oracle.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("oracle.temperature", "temperature must be between 0 and 2");
        }
    }
}

fn validate_timeouts(config: &IntentForgeConfig, report: &mut ValidationReport) {
    let Some(timeouts) = &config.timeouts else { return };
    for (field, value) in [
        ("discoverySecs", timeouts.discovery_secs),
        ("oracleSecs", timeouts.oracle_secs),
        ("invocationSecs", timeouts.invocation_secs),
    ] {
        if value == Some(0) {
            report.error(format!("timeouts.{field}"), format!("{field} must be > 0"));
        }
    }
}

fn validate_gateway(config: &IntentForgeConfig, report: &mut ValidationReport) {
    let Some(gw) = &config.gateway else { return };
    if let Some(port) = gw.port {
        if port < 1024 && port != 80 && port != 443 {
            report.warn(
                "gateway.port",
                format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
            );
        }
    }
}
