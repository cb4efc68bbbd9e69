use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::{QueryMatch, VectorDB, VectorError, VectorRecord};

/// Pinecone control plane, used to look up index hosts
pub const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

const API_VERSION: &str = "2025-01";

/// Configuration for Pinecone
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Data-plane host of the index. Resolved through the control plane when unset.
    pub index_host: Option<String>,
    pub control_plane_url: String,
    /// Empty means the default namespace
    pub namespace: String,
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_host: None,
            control_plane_url: DEFAULT_CONTROL_PLANE_URL.to_string(),
            namespace: String::new(),
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, VectorError> {
        let api_key = std::env::var("PINECONE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| VectorError::ConfigError("PINECONE_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);
        config.index_host = std::env::var("PINECONE_INDEX_HOST")
            .ok()
            .filter(|host| !host.is_empty());

        if let Ok(url) = std::env::var("PINECONE_CONTROL_URL") {
            config.control_plane_url = url;
        }

        if let Ok(namespace) = std::env::var("PINECONE_NAMESPACE") {
            config.namespace = namespace;
        }

        Ok(config)
    }
}

/// Pinecone client over the REST API.
///
/// A collection maps to a Pinecone index.
pub struct PineconeClient {
    http: reqwest::Client,
    config: PineconeConfig,
    /// index name -> data-plane base URL
    hosts: RwLock<HashMap<String, String>>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

/// Prefix bare hostnames (as returned by the control plane) with https
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Pull a readable message out of either data-plane or control-plane error bodies
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error").and_then(|e| e.get("message")))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

impl PineconeClient {
    pub fn new(config: PineconeConfig) -> Self {
        info!(
            "Initializing Pinecone client (host: {})",
            config.index_host.as_deref().unwrap_or("resolved per index")
        );

        Self {
            http: reqwest::Client::new(),
            config,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    fn namespace(&self) -> Option<&str> {
        Some(self.config.namespace.as_str()).filter(|ns| !ns.is_empty())
    }

    /// Data-plane base URL for `collection_name`
    async fn index_host(&self, collection_name: &str) -> Result<String, VectorError> {
        if let Some(host) = &self.config.index_host {
            return Ok(normalize_host(host));
        }

        if let Some(host) = self.hosts.read().await.get(collection_name) {
            return Ok(host.clone());
        }

        let host = self.describe_index(collection_name).await?;
        self.hosts
            .write()
            .await
            .insert(collection_name.to_string(), host.clone());
        Ok(host)
    }

    async fn describe_index(&self, collection_name: &str) -> Result<String, VectorError> {
        let url = format!(
            "{}/indexes/{}",
            self.config.control_plane_url.trim_end_matches('/'),
            collection_name
        );
        debug!("Resolving Pinecone index host: {}", url);

        let response = self
            .http
            .get(&url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| {
                VectorError::ConnectionError(format!("Failed to reach Pinecone: {}", e))
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(VectorError::CollectionNotFound(format!(
                "Pinecone index '{}' does not exist",
                collection_name
            )));
        }

        let response = Self::check_status(response, "describe index").await?;
        let described: DescribeIndexResponse = response.json().await.map_err(|e| {
            VectorError::SerializationError(format!("Invalid describe index response: {}", e))
        })?;

        let host = normalize_host(&described.host);
        info!("Resolved Pinecone index '{}' to {}", collection_name, host);
        Ok(host)
    }

    async fn check_status(
        response: reqwest::Response,
        action: &str,
    ) -> Result<reqwest::Response, VectorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(VectorError::OperationError(format!(
            "Pinecone {} returned {}: {}",
            action,
            status,
            error_detail(&body)
        )))
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        collection_name: &str,
        endpoint: &str,
        body: &T,
    ) -> Result<reqwest::Response, VectorError> {
        let host = self.index_host(collection_name).await?;

        let response = self
            .http
            .post(format!("{}{}", host, endpoint))
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                VectorError::ConnectionError(format!("Failed to reach Pinecone: {}", e))
            })?;

        Self::check_status(response, endpoint).await
    }
}

#[async_trait]
impl VectorDB for PineconeClient {
    fn name(&self) -> &'static str {
        "pinecone"
    }

    async fn upsert(
        &self,
        collection_name: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorError> {
        if records.is_empty() {
            debug!("No records to upsert into index: {}", collection_name);
            return Ok(());
        }

        info!(
            "Upserting {} records into Pinecone index: {}",
            records.len(),
            collection_name
        );

        let request = UpsertRequest {
            vectors: records
                .iter()
                .map(|record| UpsertVector {
                    id: &record.id,
                    values: &record.values,
                    metadata: record.metadata.to_map(),
                })
                .collect(),
            namespace: self.namespace(),
        };

        let response = self.post(collection_name, "/vectors/upsert", &request).await?;
        let upserted: UpsertResponse = response.json().await.map_err(|e| {
            VectorError::SerializationError(format!("Invalid upsert response: {}", e))
        })?;

        info!(
            "Successfully upserted {} records into Pinecone index: {}",
            upserted.upserted_count, collection_name
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
            "Querying Pinecone index '{}' with top_k: {}",
            collection_name, top_k
        );

        let request = QueryRequest {
            vector: &vector,
            top_k,
            include_metadata,
            include_values: false,
            namespace: self.namespace(),
        };

        let response = self.post(collection_name, "/query", &request).await?;
        let result: QueryResponse = response.json().await.map_err(|e| {
            VectorError::SerializationError(format!("Invalid query response: {}", e))
        })?;

        debug!(
            "Query returned {} matches from Pinecone index: {}",
            result.matches.len(),
            collection_name
        );

        Ok(result
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect())
    }
}
