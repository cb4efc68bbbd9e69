//! Deterministic stand-ins for the external services, shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::embeddings::{EmbeddingError, EmbeddingProvider};
use super::generation::{GenerationError, GenerationProvider};
use super::prompt::PromptMessage;

const DIMENSION: usize = 8;

/// Embeds text as a byte histogram, so similar texts get similar vectors
#[derive(Default)]
pub struct FakeEmbeddings {
    calls: AtomicUsize,
    fail_when_contains: Option<String>,
}

impl FakeEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any embed call whose text contains `fragment`
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_when_contains: Some(fragment.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSION];
        for byte in text.bytes() {
            vector[byte as usize % DIMENSION] += 1.0;
        }
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FakeEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fragment) = &self.fail_when_contains {
            if text.contains(fragment.as_str()) {
                return Err(EmbeddingError::ApiError("Rate limit reached".to_string()));
            }
        }
        Ok(Self::vector_for(text))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "fake-embedding"
    }
}

/// Replies with a fixed answer and records every prompt it receives
pub struct FakeGeneration {
    reply: Result<String, String>,
    prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl FakeGeneration {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<PromptMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GenerationProvider for FakeGeneration {
    async fn generate(&self, messages: &[PromptMessage]) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.reply.clone().map_err(GenerationError::ApiError)
    }

    fn model_name(&self) -> &str {
        "fake-generation"
    }
}
