//! Ingestion and brute-force similarity search over a collection store.

use super::codec;
use super::embedding::EmbeddingProvider;
use super::similarity::cosine_similarity;
use super::types::{Embedding, SearchResult};
use crate::error::{LimoncelloError, Result};
use crate::storage::CollectionStore;

use std::sync::Arc;
use tracing::debug;

/// Turns text into stored vectors and ranks stored vectors against queries.
///
/// The engine keeps no state of its own between calls; the store and the
/// embedding provider are injected by the caller.
pub struct EmbeddingEngine {
    store: Arc<CollectionStore>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingEngine {
    pub fn new(store: Arc<CollectionStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &Arc<CollectionStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Create a collection (no-op if it already exists)
    pub fn create_collection(&self, name: &str) -> Result<()> {
        self.store.create_collection(name)
    }

    /// Drop a collection and all of its documents
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        self.store.drop_collection(name)
    }

    /// Embed `text` and store it under `key`, replacing any previous vector.
    ///
    /// Nothing is written unless the provider succeeds.
    pub fn ingest(&self, collection: &str, key: &str, text: &str) -> Result<()> {
        validate_document(key, text)?;
        self.ensure_collection(collection)?;

        let vector = self.provider.embed(text)?;
        self.store.upsert(collection, key, codec::encode(&vector))?;

        debug!(collection, key, dimensions = vector.len(), "ingested document");
        Ok(())
    }

    /// Embed several documents with one provider call, then store them.
    ///
    /// A provider failure writes nothing. Documents are written one at a
    /// time afterwards, so a store failure can leave a prefix written.
    pub fn ingest_batch(&self, collection: &str, documents: &[(&str, &str)]) -> Result<usize> {
        for (key, text) in documents {
            validate_document(key, text)?;
        }
        self.ensure_collection(collection)?;

        let texts: Vec<&str> = documents.iter().map(|(_, text)| *text).collect();
        let vectors = self.provider.embed_batch(&texts)?;
        if vectors.len() != documents.len() {
            return Err(LimoncelloError::EmbeddingError(format!(
                "Provider returned {} embeddings for {} texts",
                vectors.len(),
                documents.len()
            )));
        }

        for ((key, _), vector) in documents.iter().zip(&vectors) {
            self.store.upsert(collection, key, codec::encode(vector))?;
        }

        debug!(collection, count = documents.len(), "ingested batch");
        Ok(documents.len())
    }

    /// Rank every document in `collections` by cosine similarity to `query`.
    ///
    /// Results are ordered by descending score; equal scores keep scan order
    /// (collections as given, keys in byte order). At most `limit` results
    /// are returned.
    pub fn search<S: AsRef<str>>(
        &self,
        collections: &[S],
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if query.is_empty() {
            return Err(LimoncelloError::MalformedInput(
                "Query text must not be empty".to_string(),
            ));
        }

        let query_vector = self.provider.embed(query)?;
        let pairs = self.store.scan_many(collections)?;
        let scanned = pairs.len();

        let mut results = Vec::with_capacity(scanned);
        for pair in pairs {
            let vector = codec::decode(&pair.value).map_err(|e| {
                LimoncelloError::MalformedInput(format!(
                    "Document '{}' in collection '{}': {}",
                    pair.key, pair.collection, e
                ))
            })?;
            let score = cosine_similarity(&query_vector, &vector);
            results.push(SearchResult::new(pair.collection, pair.key, score));
        }

        // Stable sort; NaN scores rank last
        results.sort_by(|a, b| rank_key(b.score).total_cmp(&rank_key(a.score)));
        results.truncate(limit);

        debug!(scanned, returned = results.len(), limit, "search complete");
        Ok(results)
    }

    /// Decoded vector stored under `key`, if any
    pub fn get_embedding(&self, collection: &str, key: &str) -> Result<Option<Embedding>> {
        self.store
            .get(collection, key)?
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    /// Remove a document. Returns whether it existed.
    pub fn delete_document(&self, collection: &str, key: &str) -> Result<bool> {
        self.store.delete(collection, key)
    }

    fn ensure_collection(&self, collection: &str) -> Result<()> {
        if self.store.contains_collection(collection) {
            Ok(())
        } else {
            Err(LimoncelloError::CollectionNotFound(collection.to_string()))
        }
    }
}

fn validate_document(key: &str, text: &str) -> Result<()> {
    if key.is_empty() {
        return Err(LimoncelloError::MalformedInput(
            "Document key must not be empty".to_string(),
        ));
    }
    if text.is_empty() {
        return Err(LimoncelloError::MalformedInput(format!(
            "Text for document '{}' must not be empty",
            key
        )));
    }
    Ok(())
}

#[inline]
fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::embedding::MockEmbeddingProvider;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed vector per text and counts calls
    struct FixedEmbeddingProvider {
        vectors: HashMap<String, Embedding>,
        calls: AtomicUsize,
    }

    impl FixedEmbeddingProvider {
        fn new(entries: &[(&str, Embedding)]) -> Self {
            Self {
                vectors: entries
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EmbeddingProvider for FixedEmbeddingProvider {
        fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| LimoncelloError::EmbeddingError(format!("no vector for '{}'", text)))
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingProvider;

    impl EmbeddingProvider for FailingProvider {
        fn embed(&self, _text: &str) -> Result<Embedding> {
            Err(LimoncelloError::EmbeddingError("quota exceeded".to_string()))
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    /// Unit vector whose cosine with [1, 0] is `s`
    fn at_similarity(s: f64) -> Embedding {
        vec![s, (1.0 - s * s).sqrt()]
    }

    fn engine_with(provider: Arc<dyn EmbeddingProvider>) -> EmbeddingEngine {
        EmbeddingEngine::new(Arc::new(CollectionStore::in_memory()), provider)
    }

    fn keys(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn test_ranking_order_and_limit() {
        let provider = Arc::new(FixedEmbeddingProvider::new(&[
            ("query", vec![1.0, 0.0]),
            ("close", at_similarity(0.9)),
            ("middle", at_similarity(0.5)),
            ("far", at_similarity(0.1)),
        ]));
        let engine = engine_with(provider);
        engine.create_collection("docs").unwrap();

        // Key order differs from similarity order
        engine.ingest("docs", "c", "close").unwrap();
        engine.ingest("docs", "a", "middle").unwrap();
        engine.ingest("docs", "b", "far").unwrap();

        let results = engine.search(&["docs"], "query", 2).unwrap();
        assert_eq!(keys(&results), vec!["c", "a"]);
        assert!((results[0].score - 0.9).abs() < 1e-9);
        assert!((results[1].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_limit_larger_than_result_count() {
        let engine = engine_with(Arc::new(MockEmbeddingProvider::new(16)));
        engine.create_collection("docs").unwrap();
        for key in ["a", "b", "c"] {
            engine.ingest("docs", key, &format!("text {}", key)).unwrap();
        }

        let results = engine.search(&["docs"], "query", 100).unwrap();
        assert_eq!(results.len(), 3);

        assert!(engine.search(&["docs"], "query", 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_scan_order() {
        let provider = Arc::new(FixedEmbeddingProvider::new(&[
            ("query", vec![1.0, 0.0]),
            ("same", vec![1.0, 1.0]),
        ]));
        let engine = engine_with(provider);
        engine.create_collection("x").unwrap();
        engine.create_collection("y").unwrap();
        engine.ingest("x", "b", "same").unwrap();
        engine.ingest("x", "a", "same").unwrap();
        engine.ingest("y", "z", "same").unwrap();

        let results = engine.search(&["y", "x"], "query", 10).unwrap();
        let order: Vec<(&str, &str)> = results
            .iter()
            .map(|r| (r.collection.as_str(), r.key.as_str()))
            .collect();
        assert_eq!(order, vec![("y", "z"), ("x", "a"), ("x", "b")]);
    }

    #[test]
    fn test_upsert_keeps_latest_embedding() {
        let engine = engine_with(Arc::new(MockEmbeddingProvider::new(8)));
        engine.create_collection("docs").unwrap();

        engine.ingest("docs", "k", "first").unwrap();
        engine.ingest("docs", "k", "second").unwrap();
        engine.ingest("docs", "k", "second").unwrap();

        assert_eq!(engine.store().count("docs").unwrap(), 1);
        let expected = engine.provider().embed("second").unwrap();
        assert_eq!(engine.get_embedding("docs", "k").unwrap(), Some(expected));
    }

    #[test]
    fn test_collection_isolation() {
        let engine = engine_with(Arc::new(MockEmbeddingProvider::new(8)));
        engine.create_collection("a").unwrap();
        engine.create_collection("b").unwrap();
        engine.ingest("a", "only-in-a", "hello").unwrap();

        assert!(engine.search(&["b"], "hello", 10).unwrap().is_empty());
        assert_eq!(keys(&engine.search(&["a"], "hello", 10).unwrap()), vec!["only-in-a"]);
    }

    #[test]
    fn test_missing_collection() {
        let provider = Arc::new(FixedEmbeddingProvider::new(&[("text", vec![1.0, 0.0])]));
        let engine = engine_with(provider.clone());
        engine.create_collection("docs").unwrap();

        assert!(matches!(
            engine.ingest("nonexistent", "k", "text"),
            Err(LimoncelloError::CollectionNotFound(_))
        ));
        assert_eq!(provider.calls(), 0);

        match engine.search(&["docs", "nonexistent"], "text", 5) {
            Err(LimoncelloError::CollectionNotFound(name)) => assert_eq!(name, "nonexistent"),
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(!engine.store().contains_collection("nonexistent"));
        assert_eq!(engine.store().count("docs").unwrap(), 0);
    }

    #[test]
    fn test_provider_failure_writes_nothing() {
        let engine = engine_with(Arc::new(FailingProvider));
        engine.create_collection("docs").unwrap();

        assert!(matches!(
            engine.ingest("docs", "k", "text"),
            Err(LimoncelloError::EmbeddingError(_))
        ));
        assert!(matches!(
            engine.ingest_batch("docs", &[("a", "x"), ("b", "y")]),
            Err(LimoncelloError::EmbeddingError(_))
        ));
        assert!(matches!(
            engine.search(&["docs"], "q", 1),
            Err(LimoncelloError::EmbeddingError(_))
        ));
        assert_eq!(engine.store().count("docs").unwrap(), 0);
    }

    #[test]
    fn test_degenerate_input_rejected() {
        let engine = engine_with(Arc::new(MockEmbeddingProvider::new(8)));
        engine.create_collection("docs").unwrap();

        let malformed = |r: Result<()>| matches!(r, Err(LimoncelloError::MalformedInput(_)));
        assert!(malformed(engine.ingest("docs", "", "text")));
        assert!(malformed(engine.ingest("docs", "k", "")));
        assert!(malformed(engine.ingest_batch("docs", &[("a", "x"), ("", "y")]).map(|_| ())));
        assert!(malformed(engine.search(&["docs"], "", 3).map(|_| ())));
        assert_eq!(engine.store().count("docs").unwrap(), 0);
    }

    #[test]
    fn test_self_similarity() {
        let engine = engine_with(Arc::new(MockEmbeddingProvider::new(64)));
        engine.create_collection("docs").unwrap();
        engine.ingest("docs", "one", "identical text").unwrap();
        engine.ingest("docs", "two", "identical text").unwrap();

        let one = engine.get_embedding("docs", "one").unwrap().unwrap();
        let two = engine.get_embedding("docs", "two").unwrap().unwrap();
        assert!((cosine_similarity(&one, &two) - 1.0).abs() < 1e-9);

        let results = engine.search(&["docs"], "identical text", 2).unwrap();
        assert!(results.iter().all(|r| (r.score - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_ingest_batch() {
        let engine = engine_with(Arc::new(MockEmbeddingProvider::new(8)));
        engine.create_collection("docs").unwrap();

        let written = engine
            .ingest_batch("docs", &[("a", "alpha"), ("b", "beta")])
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            engine.get_embedding("docs", "b").unwrap(),
            Some(engine.provider().embed("beta").unwrap())
        );
    }

    #[test]
    fn test_corrupt_value_is_reported() {
        let engine = engine_with(Arc::new(MockEmbeddingProvider::new(2)));
        engine.create_collection("docs").unwrap();
        engine.store().upsert("docs", "bad", vec![0u8; 12]).unwrap();

        assert!(matches!(
            engine.search(&["docs"], "q", 1),
            Err(LimoncelloError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_delete_document() {
        let engine = engine_with(Arc::new(MockEmbeddingProvider::new(8)));
        engine.create_collection("docs").unwrap();
        engine.ingest("docs", "k", "text").unwrap();

        assert!(engine.delete_document("docs", "k").unwrap());
        assert!(!engine.delete_document("docs", "k").unwrap());
        assert_eq!(engine.get_embedding("docs", "k").unwrap(), None);
    }
}
