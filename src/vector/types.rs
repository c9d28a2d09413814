//! Vector types and data structures

use serde::{Deserialize, Serialize};

/// A vector embedding (array of f64 values)
pub type Embedding = Vec<f64>;

/// One ranked hit of a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Collection the document was found in
    pub collection: String,
    /// Document key
    pub key: String,
    /// Cosine similarity to the query, in [-1, 1]
    pub score: f64,
}

impl SearchResult {
    pub fn new(collection: impl Into<String>, key: impl Into<String>, score: f64) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            score,
        }
    }
}
