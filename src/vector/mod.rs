//! Embedding storage and similarity search for Limoncello
//!
//! Text is turned into vectors by an [`EmbeddingProvider`], stored in a
//! [`CollectionStore`](crate::storage::CollectionStore) as fixed-width bytes
//! (see [`codec`]), and ranked against queries by brute-force cosine
//! similarity.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use limoncello::storage::CollectionStore;
//! use limoncello::vector::{EmbeddingEngine, HashingEmbeddingProvider};
//!
//! let store = Arc::new(CollectionStore::in_memory());
//! let engine = EmbeddingEngine::new(store, Arc::new(HashingEmbeddingProvider::new(256)));
//!
//! engine.create_collection("articles")?;
//! engine.ingest("articles", "rust", "Rust is a systems programming language")?;
//! let results = engine.search(&["articles"], "systems language", 5)?;
//! ```

pub mod types;
pub mod codec;
pub mod similarity;
pub mod embedding;
pub mod engine;

pub use types::*;
pub use similarity::cosine_similarity;
pub use embedding::{
    create_provider, EmbeddingConfig, EmbeddingProvider, HashingEmbeddingProvider,
    MockEmbeddingProvider,
};
#[cfg(feature = "openai")]
pub use embedding::OpenAiEmbeddingProvider;
pub use engine::EmbeddingEngine;
