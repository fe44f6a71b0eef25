use anyhow::Result;
use chat0_llm::{ChatClient, ClientFactory, ProviderConfig, ProviderType};
use std::collections::HashMap;
use std::sync::Arc;

/// Turns the selected provider and the user's key into a client
///
/// Clients are built per request because keys can change between sends.
pub trait ClientResolver: Send + Sync {
    fn resolve(&self, provider: ProviderType, api_key: &str) -> Result<Arc<dyn ChatClient>>;
}

/// Resolver backed by the provider crate's [`ClientFactory`]
#[derive(Debug, Clone)]
pub struct FactoryResolver {
    app_url: String,
    app_title: String,
    base_urls: HashMap<ProviderType, String>,
}

impl FactoryResolver {
    pub fn new(app_url: impl Into<String>, app_title: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
            app_title: app_title.into(),
            base_urls: HashMap::new(),
        }
    }

    /// Send one provider's traffic to another host
    pub fn with_base_url(mut self, provider: ProviderType, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, base_url.into());
        self
    }

    pub fn config_for(&self, provider: ProviderType, api_key: &str) -> ProviderConfig {
        let config = match provider {
            ProviderType::Google => ProviderConfig::google(api_key),
            ProviderType::OpenAI => ProviderConfig::openai(api_key),
            ProviderType::OpenRouter => {
                ProviderConfig::openrouter(api_key, self.app_url.as_str(), self.app_title.as_str())
            }
        };
        match self.base_urls.get(&provider) {
            Some(base_url) => config.with_base_url(base_url.as_str()),
            None => config,
        }
    }
}

impl Default for FactoryResolver {
    fn default() -> Self {
        Self::new("http://localhost:3000", "Chat0")
    }
}

impl ClientResolver for FactoryResolver {
    fn resolve(&self, provider: ProviderType, api_key: &str) -> Result<Arc<dyn ChatClient>> {
        ClientFactory::create_chat_client(self.config_for(provider, api_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_provider_resolves_to_its_client() {
        let resolver = FactoryResolver::default();

        for provider in ProviderType::ALL {
            let client = resolver.resolve(provider, "key").unwrap();
            let expected = match provider {
                ProviderType::Google => "Gemini",
                ProviderType::OpenAI => "OpenAI",
                ProviderType::OpenRouter => "OpenRouter",
            };
            assert_eq!(client.provider_name(), expected);
        }
    }

    #[test]
    fn test_base_url_override_applies_to_one_provider() {
        let resolver =
            FactoryResolver::default().with_base_url(ProviderType::OpenAI, "http://127.0.0.1:9999");

        assert_eq!(
            resolver.config_for(ProviderType::OpenAI, "k").provider_type(),
            ProviderType::OpenAI
        );
        assert!(resolver.resolve(ProviderType::Google, "k").is_ok());
    }
}
