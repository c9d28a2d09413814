pub mod error;
pub mod types;
pub mod storage;
pub mod vector;
pub mod cli;

use error::Result;
use storage::CollectionStore;
use types::{Config, StoreStats};
use vector::embedding::{create_provider, EmbeddingConfig, EmbeddingProvider};
use vector::EmbeddingEngine;

use std::path::Path;
use std::sync::Arc;

/// Main database interface: one durable store plus the engine that embeds
/// into it and searches it.
pub struct Database {
    store: Arc<CollectionStore>,
    engine: EmbeddingEngine,
}

impl Database {
    /// Open (or create) the database file with the default configuration
    pub fn open<P: AsRef<Path>>(path: P, embedding: EmbeddingConfig) -> Result<Self> {
        Self::open_with_config(path, Config::default(), embedding)
    }

    /// Open (or create) the database file with custom configuration
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: Config,
        embedding: EmbeddingConfig,
    ) -> Result<Self> {
        let store = Arc::new(CollectionStore::open(path, config)?);
        let provider = create_provider(embedding)?;
        Ok(Self::with_parts(store, provider))
    }

    /// Assemble a database from an already opened store and provider
    pub fn with_parts(store: Arc<CollectionStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let engine = EmbeddingEngine::new(Arc::clone(&store), provider);
        Self { store, engine }
    }

    /// Create a collection. Creating an existing collection is a no-op.
    ///
    /// # Example
    /// ```ignore
    /// db.create_collection("articles")?;
    /// ```
    pub fn create_collection(&self, name: &str) -> Result<()> {
        self.engine.create_collection(name)
    }

    /// Drop a collection and every document in it
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        self.engine.drop_collection(name)
    }

    /// Embed `text` and store it under `key` in `collection`
    ///
    /// # Example
    /// ```ignore
    /// db.ingest("articles", "intro", "Limoncello is an embedded vector store")?;
    /// ```
    pub fn ingest(&self, collection: &str, key: &str, text: &str) -> Result<()> {
        self.engine.ingest(collection, key, text)
    }

    /// Embed and store several documents at once
    pub fn ingest_batch(&self, collection: &str, documents: &[(&str, &str)]) -> Result<usize> {
        self.engine.ingest_batch(collection, documents)
    }

    /// The `limit` documents across `collections` most similar to `query`
    ///
    /// # Example
    /// ```ignore
    /// let results = db.search(&["articles", "notes"], "vector databases", 10)?;
    /// for result in results {
    ///     println!("{}/{}: {:.4}", result.collection, result.key, result.score);
    /// }
    /// ```
    pub fn search<S: AsRef<str>>(
        &self,
        collections: &[S],
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.engine.search(collections, query, limit)
    }

    /// Stored vector for a document
    pub fn get_embedding(&self, collection: &str, key: &str) -> Result<Option<Embedding>> {
        self.engine.get_embedding(collection, key)
    }

    /// Delete a document. Returns whether it existed.
    pub fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        self.engine.delete_document(collection, key)
    }

    /// Count documents in a collection
    pub fn count(&self, collection: &str) -> Result<usize> {
        self.store.count(collection)
    }

    /// List all collections with document counts
    pub fn list_collections(&self) -> Vec<(String, usize)> {
        self.store.list_collections()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Rewrite the data file so it holds only live records
    pub fn compact(&self) -> Result<()> {
        self.store.compact()
    }

    /// Sync all changes to disk
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    pub fn store(&self) -> &Arc<CollectionStore> {
        &self.store
    }

    pub fn engine(&self) -> &EmbeddingEngine {
        &self.engine
    }
}

// Re-export commonly used types
pub use error::LimoncelloError;
pub use vector::{Embedding, SearchResult};
