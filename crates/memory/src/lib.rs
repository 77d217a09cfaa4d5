//! Memory backends for crewloop.

pub mod in_memory;
pub mod vector;

pub use in_memory::InMemoryVectorStore;
pub use vector::{cosine_similarity, embed_text, vector_search};
