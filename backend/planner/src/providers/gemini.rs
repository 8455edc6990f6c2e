//! Google Gemini oracle.
//!
//! Uses `generateContent` with `responseMimeType: application/json` and
//! `responseJsonSchema`, so the model is constrained to the tool-call schema
//! server side. Prior exchanges are sent as alternating `user`/`model` turns.
//!
//! Gemini 2.5 models count thinking tokens toward `maxOutputTokens`, so for
//! them the thinking budget is pinned and added on top of the answer cap.

use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use intentforge_core::{ExchangeRole, LlmProvider, LlmRequest, LlmResponse};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Thinking tokens allowed per call on models that think.
pub const DEFAULT_THINKING_BUDGET: u32 = 512;

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    thinking_budget: u32,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = budget;
        self
    }
}

fn thinks(model: &str) -> bool {
    model.starts_with("gemini-2.5")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u64>,
}

fn text_content(role: Option<&str>, text: &str) -> Content {
    Content {
        role: role.map(str::to_string),
        parts: vec![Part {
            text: text.to_string(),
        }],
    }
}

fn build_request(request: &LlmRequest, thinking_budget: u32) -> GenerateRequest<'_> {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                ExchangeRole::User => "user",
                ExchangeRole::Assistant => "model",
            };
            text_content(Some(role), &turn.content)
        })
        .collect();
    contents.push(text_content(Some("user"), &request.user_prompt));

    let thinking = thinks(&request.model).then_some(ThinkingConfig { thinking_budget });
    let max_output_tokens = match &thinking {
        Some(t) => request.max_tokens.saturating_add(t.thinking_budget),
        None => request.max_tokens,
    };

    GenerateRequest {
        system_instruction: (!request.system_prompt.is_empty())
            .then(|| text_content(None, &request.system_prompt)),
        contents,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens,
            response_mime_type: request
                .response_schema
                .as_ref()
                .map(|_| "application/json"),
            response_json_schema: request.response_schema.as_ref(),
            thinking_config: thinking,
        },
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, request.model
        );

        debug!(model = %request.model, "Sending request to Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(request, self.thinking_budget))
            .send()
            .await
            .context("Gemini HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini returned {}: {}", status, error_body);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let candidate = body.candidates.into_iter().next();
        let finish_reason = candidate
            .as_ref()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_else(|| "none".to_string());
        let content = candidate
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .filter(|text| !text.is_empty())
            .with_context(|| format!("Gemini returned no candidate text (finish reason {finish_reason})"))?;

        Ok(LlmResponse {
            content,
            provider: "gemini".to_string(),
            model: request.model.clone(),
            tokens_used: body
                .usage_metadata
                .and_then(|u| u.total_token_count)
                .unwrap_or(0),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
