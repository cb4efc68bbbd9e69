//! Process-local vector store using cosine similarity.
//!
//! Useful for local development without a vector database, and as the
//! backing store in tests. Contents are lost when the process exits.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{QueryMatch, VectorDB, VectorError, VectorRecord};

/// Collections are stored as nested maps: collection name → record id → record.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held in `collection_name`
    #[cfg(test)]
    pub async fn len(&self, collection_name: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection_name)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Ids in `collection_name`, sorted
    #[cfg(test)]
    pub async fn ids(&self, collection_name: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .collections
            .read()
            .await
            .get(collection_name)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

/// Returns 0.0 if either vector has zero magnitude
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorDB for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(
        &self,
        collection_name: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorError> {
        let mut collections = self.collections.write().await;
        let store = collections.entry(collection_name.to_string()).or_default();
        debug!(
            "Upserting {} records into in-memory collection: {}",
            records.len(),
            collection_name
        );
        for record in records {
            store.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, VectorError> {
        let collections = self.collections.read().await;
        let Some(store) = collections.get(collection_name) else {
            debug!("In-memory collection '{}' is empty", collection_name);
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, &VectorRecord)> = store
            .values()
            .map(|record| (cosine_similarity(&record.values, &vector), record))
            .collect();

        // Highest score first, ties broken by id so results are stable
        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, record)| QueryMatch {
                id: record.id.clone(),
                score,
                metadata: include_metadata.then(|| record.metadata.to_map()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::vector::types::RecordMetadata;

    fn record(id: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: RecordMetadata {
                text: format!("text of {}", id),
                filename: "f.txt".to_string(),
                chunk_index: 0,
            },
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_unknown_collection_is_empty() {
        let store = InMemoryVectorStore::new();
        let matches = store.query("docs", vec![1.0], 3, true).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity_and_truncates() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "docs",
                vec![
                    record("far", vec![0.0, 1.0]),
                    record("near", vec![1.0, 0.1]),
                    record("exact", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let matches = store.query("docs", vec![1.0, 0.0], 2, true).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert_eq!(matches[0].text(), "text of exact");

        let bare = store.query("docs", vec![1.0, 0.0], 1, false).await.unwrap();
        assert!(bare[0].metadata.is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let store = InMemoryVectorStore::new();
        store.upsert("docs", vec![record("a", vec![1.0])]).await.unwrap();
        store.upsert("docs", vec![record("a", vec![2.0])]).await.unwrap();

        assert_eq!(store.len("docs").await, 1);
        assert_eq!(store.ids("docs").await, vec!["a".to_string()]);
    }
}
