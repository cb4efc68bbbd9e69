use super::types::{QueryMatch, VectorDB, VectorError, VectorRecord};
use async_trait::async_trait;
use chromadb::client::{ChromaAuthMethod, ChromaClient as ChromaDbClient, ChromaClientOptions};
use chromadb::collection::{ChromaCollection, CollectionEntries, QueryOptions};
use serde_json::Map;
use tracing::{debug, info};

/// ChromaDB client implementation
pub struct ChromaClient {
    client: ChromaDbClient,
}

/// Configuration for ChromaDB
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub url: Option<String>,
    pub database: String,
    pub auth: ChromaAuthMethod,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: None,
            database: "default_database".to_string(),
            auth: ChromaAuthMethod::None,
        }
    }
}

impl ChromaConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, VectorError> {
        // First check if CHROMA_URL is provided (full URL)
        let url = if let Ok(chroma_url) = std::env::var("CHROMA_URL") {
            Some(chroma_url)
        } else if let Ok(host) = std::env::var("CHROMA_HTTP_HOST") {
            let port = std::env::var("CHROMA_HTTP_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(8000);

            let ssl = std::env::var("CHROMA_HTTP_SSL")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                == "true";

            let protocol = if ssl { "https" } else { "http" };

            Some(format!("{}://{}:{}", protocol, host, port))
        } else {
            None
        };

        let database =
            std::env::var("CHROMA_DATABASE").unwrap_or_else(|_| "default_database".to_string());

        let auth = if let Ok(token) = std::env::var("CHROMA_AUTH_TOKEN") {
            ChromaAuthMethod::TokenAuth {
                token,
                header: chromadb::client::ChromaTokenHeader::Authorization,
            }
        } else {
            ChromaAuthMethod::None
        };

        Ok(Self {
            url,
            database,
            auth,
        })
    }
}

impl ChromaClient {
    /// Create a new ChromaClient with the given configuration
    pub async fn new(config: ChromaConfig) -> Result<Self, VectorError> {
        info!(
            "Initializing ChromaDB client: {:?} (database: {})",
            config.url, config.database
        );

        let options = ChromaClientOptions {
            url: config.url,
            database: config.database,
            auth: config.auth,
        };

        let client = ChromaDbClient::new(options).await.map_err(|e| {
            VectorError::ConnectionError(format!("Failed to connect to ChromaDB: {}", e))
        })?;

        info!("Successfully connected to ChromaDB");

        Ok(Self { client })
    }

    async fn get_or_create_collection(
        &self,
        collection_name: &str,
    ) -> Result<ChromaCollection, VectorError> {
        debug!("Getting or creating collection: {}", collection_name);

        self.client
            .get_or_create_collection(collection_name, None)
            .await
            .map_err(|e| {
                VectorError::OperationError(format!(
                    "Failed to get or create collection '{}': {}",
                    collection_name, e
                ))
            })
    }

    /// Convert our records to ChromaDB CollectionEntries
    fn records_to_entries(records: &[VectorRecord]) -> CollectionEntries<'_> {
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let embeddings: Vec<Vec<f32>> = records.iter().map(|r| r.values.clone()).collect();
        let documents: Vec<&str> = records.iter().map(|r| r.metadata.text.as_str()).collect();
        let metadatas: Vec<Map<String, serde_json::Value>> =
            records.iter().map(|r| r.metadata.to_map()).collect();

        CollectionEntries {
            ids,
            embeddings: Some(embeddings),
            metadatas: Some(metadatas),
            documents: Some(documents),
        }
    }
}

/// Chroma reports a missing collection as a 404, or as a 400 from servers that
/// predate the v2 error types. Status and body arrive in the error message.
fn is_collection_missing(err: &anyhow::Error) -> bool {
    let message = err.to_string();
    message.starts_with("404 ")
        || message.contains("NotFoundError")
        || message.contains("does not exist")
}

#[async_trait]
impl VectorDB for ChromaClient {
    fn name(&self) -> &'static str {
        "chroma"
    }

    async fn upsert(
        &self,
        collection_name: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorError> {
        if records.is_empty() {
            debug!("No records to upsert into collection: {}", collection_name);
            return Ok(());
        }

        info!(
            "Upserting {} records into collection: {}",
            records.len(),
            collection_name
        );

        let collection = self.get_or_create_collection(collection_name).await?;
        let entries = Self::records_to_entries(&records);

        collection.upsert(entries, None).await.map_err(|e| {
            VectorError::OperationError(format!(
                "Failed to upsert records into collection '{}': {}",
                collection_name, e
            ))
        })?;

        info!(
            "Successfully upserted {} records into collection: {}",
            records.len(),
            collection_name
        );
        Ok(())
    }

    async fn query(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, VectorError> {
        debug!(
            "Searching collection '{}' with top_k: {}",
            collection_name, top_k
        );

        let collection = match self.client.get_collection(collection_name).await {
            Ok(collection) => collection,
            // Nothing has been ingested yet
            Err(e) if is_collection_missing(&e) => {
                debug!("Collection '{}' does not exist", collection_name);
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(VectorError::ConnectionError(format!(
                    "Failed to get collection '{}': {}",
                    collection_name, e
                )))
            }
        };

        let include = if include_metadata {
            vec!["metadatas", "distances"]
        } else {
            vec!["distances"]
        };

        let query_options = QueryOptions {
            query_embeddings: Some(vec![vector]),
            query_texts: None,
            n_results: Some(top_k),
            where_metadata: None,
            where_document: None,
            include: Some(include),
        };

        let result = collection.query(query_options, None).await.map_err(|e| {
            VectorError::OperationError(format!(
                "Failed to search collection '{}': {}",
                collection_name, e
            ))
        })?;

        // One query vector, so only the first row of each result matrix matters
        let ids = result.ids.into_iter().next().unwrap_or_default();
        let mut distances = result
            .distances
            .and_then(|rows| rows.into_iter().next())
            .unwrap_or_default()
            .into_iter();
        let mut metadatas = result
            .metadatas
            .and_then(|rows| rows.into_iter().next())
            .unwrap_or_default()
            .into_iter();

        let matches: Vec<QueryMatch> = ids
            .into_iter()
            .map(|id| QueryMatch {
                id,
                score: distances.next().map(|d| 1.0 - d).unwrap_or_default(),
                metadata: metadatas.next().flatten(),
            })
            .collect();

        debug!(
            "Search returned {} results from collection: {}",
            matches.len(),
            collection_name
        );

        Ok(matches)
    }
}
