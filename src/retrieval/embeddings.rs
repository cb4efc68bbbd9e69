use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Default OpenAI-compatible API base
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Embedding requests allowed in flight at once
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Error types for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Trait for embedding providers
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed every text concurrently, returning vectors in input order.
    /// The first failure aborts the whole batch.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        futures::future::try_join_all(texts.iter().map(|text| self.embed(text))).await
    }

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Resolve the API key, falling back to `OPENAI_API_KEY`
pub(crate) fn resolve_openai_api_key(api_key: Option<String>) -> Option<String> {
    api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|key| !key.is_empty())
}

/// Build an OpenAI client against `api_base` (or `OPENAI_API_BASE_URL`, or the public API)
pub(crate) fn openai_client(api_key: String, api_base: Option<String>) -> Client<OpenAIConfig> {
    let api_base = api_base
        .or_else(|| std::env::var("OPENAI_API_BASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string());

    let config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base.trim_end_matches('/'));
    Client::with_config(config)
}

/// OpenAI embedding provider
pub struct OpenAIEmbeddings {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
    /// Semaphore to limit concurrent requests
    semaphore: Arc<Semaphore>,
}

impl OpenAIEmbeddings {
    /// Create a new OpenAI embedding provider
    pub fn new(
        api_key: Option<String>,
        api_base: Option<String>,
        model: Option<String>,
    ) -> Result<Self, EmbeddingError> {
        let api_key = resolve_openai_api_key(api_key).ok_or_else(|| {
            EmbeddingError::ConfigError(
                "OPENAI_API_KEY not set and no API key provided".to_string(),
            )
        })?;

        let model = model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());

        // Determine dimension based on model
        let dimension = match model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536, // Default
        };

        Ok(Self {
            client: openai_client(api_key, api_base),
            model,
            dimension,
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, EmbeddingError> {
        let model = std::env::var("RAG_EMBEDDING_MODEL").ok();

        // Limit concurrent requests to avoid rate limits
        let max_concurrent = std::env::var("OPENAI_MAX_CONCURRENT")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENT);

        let provider = Self::new(None, None, model)?.with_max_concurrent(max_concurrent);

        info!(
            "Initialized OpenAI embeddings: model={}, dimension={}, max_concurrent={}",
            provider.model, provider.dimension, max_concurrent
        );

        Ok(provider)
    }

    /// Override the number of embedding requests allowed in flight at once
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let _permit = self.semaphore.acquire().await.map_err(|e| {
            EmbeddingError::ApiError(format!("Failed to acquire semaphore: {}", e))
        })?;

        debug!("Embedding text of {} bytes with {}", text.len(), self.model);

        let request = CreateEmbeddingRequest {
            model: self.model.clone(),
            input: EmbeddingInput::String(text.to_string()),
            encoding_format: None,
            user: None,
            dimensions: None,
        };

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingError::ApiError(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| EmbeddingError::ApiError("API returned no embedding".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory for creating embedding providers
pub struct EmbeddingFactory;

impl EmbeddingFactory {
    /// Create an embedding provider from environment variables
    pub fn from_env() -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        let engine = std::env::var("RAG_EMBEDDING_ENGINE")
            .unwrap_or_else(|_| "openai".to_string())
            .to_lowercase();

        info!("Creating embedding provider: {}", engine);

        match engine.as_str() {
            "openai" => {
                let provider = OpenAIEmbeddings::from_env()?;
                Ok(Arc::new(provider))
            }
            _ => Err(EmbeddingError::ConfigError(format!(
                "Unsupported embedding engine: {}. Supported: openai",
                engine
            ))),
        }
    }
}
