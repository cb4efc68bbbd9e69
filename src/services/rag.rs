use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::retrieval::prompt::{build_context, build_messages};
use crate::retrieval::{
    chunk_document, EmbeddingProvider, GenerationProvider, PromptTemplate, VectorDB, VectorRecord,
};

/// An uploaded file, held only for the duration of one ingestion
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub content: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }

    pub fn text(&self) -> AppResult<&str> {
        std::str::from_utf8(&self.content).map_err(|_| {
            AppError::BadRequest(format!("File {} is not valid UTF-8 text", self.filename))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub filename: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: usize,
}

#[derive(Debug, Clone)]
pub struct RagSettings {
    pub collection_name: String,
    pub chunk_size: usize,
    pub top_k: usize,
    pub prompt_template: PromptTemplate,
}

impl From<&Config> for RagSettings {
    fn from(config: &Config) -> Self {
        Self {
            collection_name: config.collection_name.clone(),
            chunk_size: config.chunk_size,
            top_k: config.top_k,
            prompt_template: config.prompt_template.clone(),
        }
    }
}

pub struct RAGService {
    embeddings: Arc<dyn EmbeddingProvider>,
    vector_db: Arc<dyn VectorDB>,
    generator: Arc<dyn GenerationProvider>,
    settings: RagSettings,
}

impl RAGService {
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        vector_db: Arc<dyn VectorDB>,
        generator: Arc<dyn GenerationProvider>,
        settings: RagSettings,
    ) -> Self {
        RAGService {
            embeddings,
            vector_db,
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub fn embedding_model(&self) -> &str {
        self.embeddings.model_name()
    }

    pub fn generation_model(&self) -> &str {
        self.generator.model_name()
    }

    pub fn vector_db_name(&self) -> &'static str {
        self.vector_db.name()
    }

    /// Chunk, embed and store a document. Nothing is stored unless every
    /// chunk was embedded.
    pub async fn ingest(&self, document: &Document) -> AppResult<IngestSummary> {
        let text = document.text()?;
        let chunks = chunk_document(&document.filename, text, self.settings.chunk_size);
        if chunks.is_empty() {
            return Err(AppError::BadRequest(format!(
                "File {} contains no text",
                document.filename
            )));
        }

        info!(
            "Ingesting {} chunks from {} into collection {}",
            chunks.len(),
            document.filename,
            self.settings.collection_name
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embeddings.embed_many(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(AppError::Internal(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, values)| VectorRecord::from_chunk(chunk, values))
            .collect();

        self.vector_db
            .upsert(&self.settings.collection_name, records)
            .await?;

        info!(
            "Stored {} chunks from {}",
            chunks.len(),
            document.filename
        );

        Ok(IngestSummary {
            filename: document.filename.clone(),
            chunk_count: chunks.len(),
        })
    }

    /// Answer a question grounded in the closest stored chunks
    pub async fn answer(&self, question: &str) -> AppResult<Answer> {
        if question.trim().is_empty() {
            return Err(AppError::BadRequest("Question is required".to_string()));
        }

        let vector = self.embeddings.embed(question).await?;
        let matches = self
            .vector_db
            .query(
                &self.settings.collection_name,
                vector,
                self.settings.top_k,
                true,
            )
            .await?;

        debug!(
            "Retrieved {} matches from collection {}",
            matches.len(),
            self.settings.collection_name
        );

        let context = build_context(&matches);
        let messages = build_messages(&self.settings.prompt_template, &context, question);
        let answer = self.generator.generate(&messages).await?;

        info!("Answered question using {} sources", matches.len());

        Ok(Answer {
            answer,
            sources: matches.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::prompt::Role;
    use crate::retrieval::testing::{FakeEmbeddings, FakeGeneration};
    use crate::retrieval::vector::InMemoryVectorStore;

    fn settings() -> RagSettings {
        RagSettings::from(&Config::default())
    }

    fn words(count: usize) -> String {
        (0..count)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn service(
        embeddings: Arc<FakeEmbeddings>,
        store: Arc<InMemoryVectorStore>,
        generator: Arc<FakeGeneration>,
    ) -> RAGService {
        RAGService::new(embeddings, store, generator, settings())
    }

    #[tokio::test]
    async fn test_ingest_splits_and_stores_chunks() {
        let store = Arc::new(InMemoryVectorStore::new());
        let rag = service(
            Arc::new(FakeEmbeddings::new()),
            store.clone(),
            Arc::new(FakeGeneration::replying("ok")),
        );

        let summary = rag
            .ingest(&Document::new("notes.txt", words(1200).into_bytes()))
            .await
            .unwrap();

        assert_eq!(summary.chunk_count, 3);
        assert_eq!(
            store.ids("docs").await,
            vec!["notes.txt-chunk-0", "notes.txt-chunk-1", "notes.txt-chunk-2"]
        );
    }

    #[tokio::test]
    async fn test_reingest_overwrites_records() {
        let store = Arc::new(InMemoryVectorStore::new());
        let rag = service(
            Arc::new(FakeEmbeddings::new()),
            store.clone(),
            Arc::new(FakeGeneration::replying("ok")),
        );

        rag.ingest(&Document::new("notes.txt", words(1200).into_bytes()))
            .await
            .unwrap();
        rag.ingest(&Document::new("notes.txt", words(1200).into_bytes()))
            .await
            .unwrap();

        assert_eq!(store.len("docs").await, 3);
    }

    #[tokio::test]
    async fn test_ingest_rejects_blank_and_binary_documents() {
        let embeddings = Arc::new(FakeEmbeddings::new());
        let rag = service(
            embeddings.clone(),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(FakeGeneration::replying("ok")),
        );

        let err = rag
            .ingest(&Document::new("blank.txt", b"  \n\t ".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("no text")));

        let err = rag
            .ingest(&Document::new("image.bin", vec![0xff, 0xfe, 0x00]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert_eq!(embeddings.calls(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let store = Arc::new(InMemoryVectorStore::new());
        let rag = service(
            Arc::new(FakeEmbeddings::failing_on("w700")),
            store.clone(),
            Arc::new(FakeGeneration::replying("ok")),
        );

        let err = rag
            .ingest(&Document::new("notes.txt", words(1200).into_bytes()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExternalServiceError(ref m) if m.contains("Rate limit")));
        assert_eq!(store.len("docs").await, 0);
    }

    #[tokio::test]
    async fn test_answer_without_documents() {
        let generator = Arc::new(FakeGeneration::replying("I don't know."));
        let rag = service(
            Arc::new(FakeEmbeddings::new()),
            Arc::new(InMemoryVectorStore::new()),
            generator.clone(),
        );

        let answer = rag.answer("What is in the notes?").await.unwrap();
        assert_eq!(answer.answer, "I don't know.");
        assert_eq!(answer.sources, 0);

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0][1].content, "What is in the notes?");
    }

    #[tokio::test]
    async fn test_answer_caps_sources_at_top_k() {
        let generator = Arc::new(FakeGeneration::replying("Paris."));
        let rag = RAGService::new(
            Arc::new(FakeEmbeddings::new()),
            Arc::new(InMemoryVectorStore::new()),
            generator.clone(),
            RagSettings {
                chunk_size: 2,
                ..settings()
            },
        );

        rag.ingest(&Document::new(
            "facts.txt",
            b"capital Paris river Seine tower Eiffel museum Louvre city lights".to_vec(),
        ))
        .await
        .unwrap();

        let answer = rag.answer("What is the capital?").await.unwrap();
        assert_eq!(answer.answer, "Paris.");
        assert_eq!(answer.sources, 3);

        let prompts = generator.prompts();
        let system = &prompts[0][0];
        assert_eq!(system.role, Role::System);
        let included = [
            "capital Paris",
            "river Seine",
            "tower Eiffel",
            "museum Louvre",
            "city lights",
        ]
        .iter()
        .filter(|chunk| system.content.contains(*chunk))
        .count();
        assert_eq!(included, 3);
    }

    #[tokio::test]
    async fn test_answer_rejects_blank_question() {
        let embeddings = Arc::new(FakeEmbeddings::new());
        let rag = service(
            embeddings.clone(),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(FakeGeneration::replying("ok")),
        );

        let err = rag.answer("   ").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(embeddings.calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_upstream_error() {
        let rag = service(
            Arc::new(FakeEmbeddings::new()),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(FakeGeneration::failing("model overloaded")),
        );

        let err = rag.answer("Anything?").await.unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(ref m) if m.contains("model overloaded")));
    }
}
