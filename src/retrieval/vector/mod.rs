pub mod chroma;
pub mod factory;
pub mod memory;
pub mod pinecone;
pub mod types;

pub use factory::VectorDBFactory;
#[cfg(test)]
pub use memory::InMemoryVectorStore;
pub use types::{QueryMatch, VectorDB, VectorError, VectorRecord};
