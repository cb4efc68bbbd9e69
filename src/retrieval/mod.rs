pub mod chunking;
pub mod embeddings;
pub mod generation;
pub mod prompt;
pub mod vector;

#[cfg(test)]
pub mod testing;

pub use chunking::chunk_document;
pub use embeddings::{EmbeddingError, EmbeddingFactory, EmbeddingProvider};
pub use generation::{GenerationError, GenerationFactory, GenerationProvider};
pub use prompt::PromptTemplate;
pub use vector::{VectorDB, VectorDBFactory, VectorError, VectorRecord};
