pub mod types;
pub mod traits;
pub mod openai;
pub mod gemini;
pub mod config;
pub mod models;

pub use traits::{ChatClient, ChatRequest, ChatResponse, ChatOptions, TokenUsage};

pub use openai::{OpenAIClient, OpenAIClientBuilder};
pub use gemini::GeminiClient;
pub use config::{ClientFactory, ProviderConfig, ProviderDetails, ProviderType};
pub use models::{default_model, model_config, ModelConfig, AI_MODELS, DEFAULT_MODEL};
pub use types::{Message, Role};
