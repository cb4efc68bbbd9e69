use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::retrieval::chunking::Chunk;

/// Metadata stored alongside every chunk vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub text: String,
    pub filename: String,
    pub chunk_index: usize,
}

impl RecordMetadata {
    /// Flat JSON object as sent to the vector stores
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("text".to_string(), Value::String(self.text.clone()));
        map.insert("filename".to_string(), Value::String(self.filename.clone()));
        map.insert("chunkIndex".to_string(), Value::from(self.chunk_index));
        map
    }
}

/// Represents a single vector record to be stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    pub fn from_chunk(chunk: &Chunk, values: Vec<f32>) -> Self {
        Self {
            id: chunk.id(),
            values,
            metadata: RecordMetadata {
                text: chunk.text.clone(),
                filename: chunk.filename.clone(),
                chunk_index: chunk.index,
            },
        }
    }
}

/// One result of a similarity query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Option<Map<String, Value>>,
}

impl QueryMatch {
    /// Chunk text carried in the metadata, or "" when absent
    pub fn text(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

/// Error types for vector database operations
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Vector index operations used by the retrieval pipelines
#[async_trait]
pub trait VectorDB: Send + Sync {
    /// Backend name for logs and the config endpoint
    fn name(&self) -> &'static str;

    /// Upsert records; an existing record with the same id is replaced
    async fn upsert(&self, collection_name: &str, records: Vec<VectorRecord>)
        -> Result<(), VectorError>;

    /// Return up to `top_k` matches ordered by the backend's similarity ranking
    async fn query(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, VectorError>;
}
