// Google Gemini generateContent client

use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, TokenUsage};
use crate::types::{Message, Role};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Map, Value};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1";

/// Gemini client (HTTP direct, no SDK)
///
/// Differences from the OpenAI dialect:
/// - API key travels as the `key` query parameter
/// - the assistant role is called `model`
/// - system turns go to `systemInstruction`, not `contents`
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(&self, messages: &[Message], options: &ChatOptions) -> Value {
        let system: Vec<Value> = messages
            .iter()
            .filter(|msg| msg.role() == Role::System)
            .map(|msg| serde_json::json!({ "text": msg.content() }))
            .collect();

        let contents: Vec<Value> = messages
            .iter()
            .filter(|msg| msg.role() != Role::System)
            .map(|msg| {
                let role = match msg.role() {
                    Role::Assistant => "model",
                    _ => "user",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": msg.content() }],
                })
            })
            .collect();

        let mut generation = Map::new();
        if let Some(temp) = options.temperature {
            generation.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(top_k) = options.top_k {
            generation.insert("topK".to_string(), serde_json::json!(top_k));
        }
        if let Some(top_p) = options.top_p {
            generation.insert("topP".to_string(), serde_json::json!(top_p));
        }
        if let Some(max_tokens) = options.max_tokens {
            generation.insert("maxOutputTokens".to_string(), serde_json::json!(max_tokens));
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": Value::Object(generation),
        });
        if !system.is_empty() {
            body["systemInstruction"] = serde_json::json!({ "parts": system });
        }
        body
    }
}

#[async_trait]
impl ChatClient for GeminiClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = self.build_request(&request.messages, &request.options);

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending gemini generateContent"
        );

        let response = self
            .http_client
            .post(format!("{}/models/{}:generateContent", self.base_url, request.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        let raw: Value = response
            .json()
            .await
            .context("Invalid response format from the model")?;
        let parsed: GenerateContentResponse = serde_json::from_value(raw.clone())
            .context("Invalid response format from the model")?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No response generated from the model"))?;

        let text = candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| anyhow::anyhow!("Invalid response format from the model"))?;

        Ok(ChatResponse {
            content: Some(text),
            usage: parsed.usage_metadata.map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            finish_reason: candidate.finish_reason,
            raw,
        })
    }

    fn provider_name(&self) -> &'static str {
        "Gemini"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
