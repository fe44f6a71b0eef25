// Configuration layer for provider-agnostic client creation

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::gemini::GeminiClient;
use crate::openai::{OpenAIClient, OPENROUTER_API_BASE};
use crate::traits::ChatClient;

/// Type of LLM provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Google,
    OpenAI,
    OpenRouter,
}

impl ProviderType {
    pub const ALL: [ProviderType; 3] = [Self::Google, Self::OpenAI, Self::OpenRouter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::OpenAI => "openai",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the Gemini provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Configuration for OpenAI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    /// Base URL for OpenAI API (optional, defaults to https://api.openai.com/v1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Configuration for OpenRouter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    pub api_key: String,
    /// Sent as `HTTP-Referer` for OpenRouter app attribution
    pub app_url: String,
    /// Sent as `X-Title`
    pub app_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Provider-specific configuration details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderDetails {
    Google(GoogleConfig),
    OpenAI(OpenAIConfig),
    OpenRouter(OpenRouterConfig),
}

/// Complete provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(flatten)]
    pub details: ProviderDetails,
}

impl ProviderConfig {
    pub fn google(api_key: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::Google(GoogleConfig {
                api_key: api_key.into(),
                base_url: None,
            }),
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::OpenAI(OpenAIConfig {
                api_key: api_key.into(),
                base_url: None,
            }),
        }
    }

    pub fn openrouter(
        api_key: impl Into<String>,
        app_url: impl Into<String>,
        app_title: impl Into<String>,
    ) -> Self {
        Self {
            details: ProviderDetails::OpenRouter(OpenRouterConfig {
                api_key: api_key.into(),
                app_url: app_url.into(),
                app_title: app_title.into(),
                base_url: None,
            }),
        }
    }

    /// Point the provider at a different host (proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = Some(base_url.into());
        match &mut self.details {
            ProviderDetails::Google(c) => c.base_url = base_url,
            ProviderDetails::OpenAI(c) => c.base_url = base_url,
            ProviderDetails::OpenRouter(c) => c.base_url = base_url,
        }
        self
    }

    pub fn provider_type(&self) -> ProviderType {
        match self.details {
            ProviderDetails::Google(_) => ProviderType::Google,
            ProviderDetails::OpenAI(_) => ProviderType::OpenAI,
            ProviderDetails::OpenRouter(_) => ProviderType::OpenRouter,
        }
    }
}

/// Factory for creating chat clients from configuration
pub struct ClientFactory;

impl ClientFactory {
    pub fn create_chat_client(config: ProviderConfig) -> Result<Arc<dyn ChatClient>> {
        match config.details {
            ProviderDetails::Google(google) => {
                let mut client = GeminiClient::new(google.api_key)?;
                if let Some(base_url) = google.base_url {
                    client = client.with_base_url(base_url);
                }
                Ok(Arc::new(client))
            }
            ProviderDetails::OpenAI(openai) => {
                let mut builder = OpenAIClient::builder().api_key(openai.api_key);
                if let Some(base_url) = openai.base_url {
                    builder = builder.base_url(base_url);
                }
                Ok(Arc::new(builder.build()?))
            }
            ProviderDetails::OpenRouter(router) => {
                let client = OpenAIClient::builder()
                    .api_key(router.api_key)
                    .base_url(router.base_url.unwrap_or_else(|| OPENROUTER_API_BASE.to_string()))
                    .header("HTTP-Referer", router.app_url)
                    .header("X-Title", router.app_title)
                    .provider("OpenRouter")
                    .build()?;
                Ok(Arc::new(client))
            }
        }
    }
}
