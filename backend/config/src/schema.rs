//! IntentForge runtime configuration schema.
//!
//! Every section is optional in the file; `defaults` fills what a running
//! router needs, `validation` rejects what it cannot run with.

use serde::{Deserialize, Serialize};

use intentforge_core::ProviderEndpoint;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntentForgeConfig {
    /// HTTP surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    /// Text-to-structured-output oracle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<OracleConfig>,

    /// Remote tool providers, one MCP endpoint each
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<TimeoutsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OracleConfig {
    /// "gemini" | "openrouter" | "ollama"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,
    pub url: String,
    /// Sent as a bearer token on every request to this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<&ProviderConfig> for ProviderEndpoint {
    fn from(cfg: &ProviderConfig) -> Self {
        ProviderEndpoint {
            name: cfg.name.clone(),
            url: cfg.url.clone(),
            token: cfg.token.clone().filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for the daily-rolling JSON log. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// JSON console output instead of human-readable lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

impl IntentForgeConfig {
    pub fn endpoints(&self) -> Vec<ProviderEndpoint> {
        self.providers.iter().map(ProviderEndpoint::from).collect()
    }

    /// Find a provider entry by name, adding an empty one if absent.
    pub fn provider_mut(&mut self, name: &str) -> &mut ProviderConfig {
        let index = match self.providers.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.providers.push(ProviderConfig {
                    name: name.to_string(),
                    ..Default::default()
                });
                self.providers.len() - 1
            }
        };
        &mut self.providers[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = r#"
gateway:
  bind: 0.0.0.0
  port: 9100
oracle:
  provider: gemini
  apiKey: abc
  maxTokens: 512
providers:
  - name: expensetracker
    url: http://127.0.0.1:8000/mcp
  - name: foodcard
    url: http://127.0.0.1:8001/mcp
    token: t0k
timeouts:
  discoverySecs: 5
"#;
        let cfg: IntentForgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.gateway.as_ref().unwrap().port, Some(9100));
        assert_eq!(cfg.oracle.as_ref().unwrap().max_tokens, Some(512));
        assert_eq!(cfg.timeouts.as_ref().unwrap().discovery_secs, Some(5));

        let endpoints = cfg.endpoints();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].token, None);
        assert_eq!(endpoints[1].token.as_deref(), Some("t0k"));
    }

    #[test]
    fn provider_mut_upserts() {
        let mut cfg = IntentForgeConfig::default();
        cfg.provider_mut("foodcard").url = "http://a/mcp".into();
        cfg.provider_mut("foodcard").url = "http://b/mcp".into();
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].url, "http://b/mcp");
    }
}
