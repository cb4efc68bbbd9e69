use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::embeddings::{openai_client, resolve_openai_api_key};
use super::prompt::{PromptMessage, Role};

/// Default chat model
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Error types for text generation
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Completion API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Trait for chat-completion backends
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a reply for the ordered, role-tagged messages
    async fn generate(&self, messages: &[PromptMessage]) -> Result<String, GenerationError>;

    fn model_name(&self) -> &str;
}

/// Chat completions through the OpenAI API
pub struct OpenAIGeneration {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIGeneration {
    pub fn new(
        api_key: Option<String>,
        api_base: Option<String>,
        model: Option<String>,
    ) -> Result<Self, GenerationError> {
        let api_key = resolve_openai_api_key(api_key).ok_or_else(|| {
            GenerationError::ConfigError(
                "OPENAI_API_KEY not set and no API key provided".to_string(),
            )
        })?;

        let model = model.unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string());

        Ok(Self {
            client: openai_client(api_key, api_base),
            model,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, GenerationError> {
        let model = std::env::var("RAG_GENERATION_MODEL").ok();
        let mut generation = Self::new(None, None, model)?;

        if let Ok(temperature) = std::env::var("RAG_TEMPERATURE") {
            let temperature = temperature.parse::<f32>().map_err(|e| {
                GenerationError::ConfigError(format!("Invalid RAG_TEMPERATURE: {}", e))
            })?;
            generation = generation.with_temperature(temperature);
        }

        if let Ok(max_tokens) = std::env::var("RAG_MAX_TOKENS") {
            let max_tokens = max_tokens.parse::<u32>().map_err(|e| {
                GenerationError::ConfigError(format!("Invalid RAG_MAX_TOKENS: {}", e))
            })?;
            generation = generation.with_max_tokens(max_tokens);
        }

        info!(
            "Initialized OpenAI generation: model={}, temperature={}, max_tokens={}",
            generation.model, generation.temperature, generation.max_tokens
        );

        Ok(generation)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

fn to_request_message(message: &PromptMessage) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let message = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.as_str())
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.as_str())
            .build()?
            .into(),
    };
    Ok(message)
}

#[async_trait::async_trait]
impl GenerationProvider for OpenAIGeneration {
    #[allow(deprecated)]
    async fn generate(&self, messages: &[PromptMessage]) -> Result<String, GenerationError> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| GenerationError::InvalidRequest(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| GenerationError::InvalidRequest(e.to_string()))?;

        debug!("Requesting chat completion from {}", self.model);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GenerationError::ApiError(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::ApiError("API returned no choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory for creating generation providers
pub struct GenerationFactory;

impl GenerationFactory {
    pub fn from_env() -> Result<Arc<dyn GenerationProvider>, GenerationError> {
        Ok(Arc::new(OpenAIGeneration::from_env()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "gpt-4",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
        })
    }

    fn generation(server: &MockServer) -> OpenAIGeneration {
        OpenAIGeneration::new(Some("test_key".to_string()), Some(server.uri()), None).unwrap()
    }

    #[tokio::test]
    async fn test_generate_sends_messages_and_sampling_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4",
                "temperature": 0.7,
                "max_tokens": 500,
                "messages": [
                    {"role": "system", "content": "You answer from context."},
                    {"role": "user", "content": "What is Rust?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!("A language."))))
            .expect(1)
            .mount(&server)
            .await;

        let messages = vec![
            PromptMessage::system("You answer from context."),
            PromptMessage::user("What is Rust?"),
        ];
        let answer = generation(&server).generate(&messages).await.unwrap();
        assert_eq!(answer, "A language.");
    }

    #[tokio::test]
    async fn test_sampling_overrides_reach_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"temperature": 0.5, "max_tokens": 64})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!("ok"))))
            .expect(1)
            .mount(&server)
            .await;

        let answer = generation(&server)
            .with_temperature(0.5)
            .with_max_tokens(64)
            .generate(&[PromptMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(answer, "ok");
    }

    #[tokio::test]
    async fn test_generate_null_content_is_empty_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!(null))))
            .mount(&server)
            .await;

        let answer = generation(&server)
            .generate(&[PromptMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(answer, "");
    }

    #[tokio::test]
    async fn test_generate_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "message": "The model `gpt-5` does not exist",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": "model_not_found"
                }
            })))
            .mount(&server)
            .await;

        let err = generation(&server)
            .with_temperature(0.2)
            .with_max_tokens(50)
            .generate(&[PromptMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ApiError(_)));
        assert!(err.to_string().contains("does not exist"));
    }
}
