use crate::config::ProviderType;

/// Display name of the model selected on first run
pub const DEFAULT_MODEL: &str = "Gemini 2.0 Flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Name shown in the model picker and persisted in settings
    pub name: &'static str,
    /// Identifier sent to the provider
    pub model_id: &'static str,
    pub provider: ProviderType,
    /// Header a proxy would carry the user's key in
    pub header_key: &'static str,
}

pub const AI_MODELS: &[ModelConfig] = &[
    ModelConfig {
        name: "Gemini 2.0 Flash",
        model_id: "gemini-2.0-flash",
        provider: ProviderType::Google,
        header_key: "X-Google-API-Key",
    },
    ModelConfig {
        name: "Gemini 2.5 Flash",
        model_id: "gemini-2.5-flash",
        provider: ProviderType::Google,
        header_key: "X-Google-API-Key",
    },
    ModelConfig {
        name: "Gemini 2.5 Pro",
        model_id: "gemini-2.5-pro",
        provider: ProviderType::Google,
        header_key: "X-Google-API-Key",
    },
    ModelConfig {
        name: "GPT-4o",
        model_id: "gpt-4o",
        provider: ProviderType::OpenAI,
        header_key: "X-OpenAI-API-Key",
    },
    ModelConfig {
        name: "GPT-4.1-mini",
        model_id: "gpt-4.1-mini",
        provider: ProviderType::OpenAI,
        header_key: "X-OpenAI-API-Key",
    },
    ModelConfig {
        name: "Deepseek R1 0528",
        model_id: "deepseek/deepseek-r1-0528:free",
        provider: ProviderType::OpenRouter,
        header_key: "X-OpenRouter-API-Key",
    },
    ModelConfig {
        name: "Deepseek V3",
        model_id: "deepseek/deepseek-chat-v3-0324:free",
        provider: ProviderType::OpenRouter,
        header_key: "X-OpenRouter-API-Key",
    },
];

/// Look a model up by its display name
pub fn model_config(name: &str) -> Option<&'static ModelConfig> {
    AI_MODELS.iter().find(|m| m.name == name)
}

pub fn default_model() -> &'static ModelConfig {
    &AI_MODELS[0]
}
