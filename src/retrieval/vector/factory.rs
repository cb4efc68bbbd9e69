use super::chroma::{ChromaClient, ChromaConfig};
use super::memory::InMemoryVectorStore;
use super::pinecone::{PineconeClient, PineconeConfig};
use super::types::{VectorDB, VectorError};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Supported vector database types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorDBType {
    Pinecone,
    Chroma,
    Memory,
}

impl FromStr for VectorDBType {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pinecone" => Ok(VectorDBType::Pinecone),
            "chroma" => Ok(VectorDBType::Chroma),
            "memory" => Ok(VectorDBType::Memory),
            _ => Err(VectorError::ConfigError(format!(
                "Unsupported VECTOR_DB type: {}. Supported types: pinecone, chroma, memory",
                s
            ))),
        }
    }
}

/// Factory for creating vector database clients
pub struct VectorDBFactory;

impl VectorDBFactory {
    /// Create a vector database client based on the specified type
    pub async fn create(db_type: VectorDBType) -> Result<Arc<dyn VectorDB>, VectorError> {
        info!("Creating vector database client: {:?}", db_type);

        match db_type {
            VectorDBType::Pinecone => {
                let config = PineconeConfig::from_env()?;
                Ok(Arc::new(PineconeClient::new(config)))
            }
            VectorDBType::Chroma => {
                let config = ChromaConfig::from_env()?;
                let client = ChromaClient::new(config).await?;
                Ok(Arc::new(client))
            }
            VectorDBType::Memory => {
                warn!("Using in-memory vector store; ingested documents are lost on restart");
                Ok(Arc::new(InMemoryVectorStore::new()))
            }
        }
    }

    /// Create a vector database client from environment variables
    /// Reads VECTOR_DB environment variable (defaults to "pinecone")
    pub async fn from_env() -> Result<Arc<dyn VectorDB>, VectorError> {
        let db_type_str = std::env::var("VECTOR_DB").unwrap_or_else(|_| "pinecone".to_string());
        let db_type: VectorDBType = db_type_str.parse()?;

        info!(
            "Initializing vector database from environment: {}",
            db_type_str
        );

        Self::create(db_type).await
    }
}
