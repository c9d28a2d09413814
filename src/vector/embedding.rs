//! Embedding providers for vector generation
//!
//! Supports multiple embedding backends:
//! - Deterministic mock vectors for tests
//! - Feature-hashed bag of words, for offline use without a model
//! - OpenAI API (behind the `openai` feature)

use super::similarity::normalize;
use super::types::Embedding;
use crate::error::{LimoncelloError, Result};

use std::sync::Arc;

/// Model requested from OpenAI when none is configured
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-ada-002";

/// Trait for embedding providers
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts (batched)
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Get the dimensionality of embeddings
    fn dimensions(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Mock embedding provider for testing (hash-seeded unit vectors)
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl EmbeddingProvider for MockEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut rng_state = u64::from(crc32fast::hash(text.as_bytes()));
        let mut vector: Embedding = (0..self.dimensions)
            .map(|_| {
                // Simple LCG random number generator
                rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((rng_state >> 11) as f64) / ((1u64 << 53) as f64) * 2.0 - 1.0
            })
            .collect();

        normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Feature-hashing embeddings: every lowercased word bumps one dimension.
///
/// Texts that share words point in similar directions, which is enough for
/// basic semantic search without a model. Words are bucketed by CRC32 so
/// vectors written to disk keep matching queries across builds.
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn text_to_features(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f64; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = crc32fast::hash(word.to_lowercase().as_bytes());
            let idx = hash as usize % self.dimensions;
            vector[idx] += 1.0;
        }

        normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for HashingEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.text_to_features(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

#[cfg(feature = "openai")]
pub use openai::OpenAiEmbeddingProvider;

#[cfg(feature = "openai")]
mod openai {
    use super::{Embedding, EmbeddingProvider};
    use crate::error::{LimoncelloError, Result};
    use reqwest::blocking::Client;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use tracing::debug;

    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

    #[derive(Serialize)]
    struct EmbeddingRequest<'a> {
        input: &'a [&'a str],
        model: &'a str,
        user: &'a str,
    }

    #[derive(Deserialize)]
    struct EmbeddingResponse {
        data: Vec<EmbeddingData>,
    }

    #[derive(Deserialize)]
    struct EmbeddingData {
        index: usize,
        embedding: Vec<f64>,
    }

    /// Embeddings from the OpenAI `/embeddings` endpoint
    pub struct OpenAiEmbeddingProvider {
        client: Client,
        api_key: String,
        model: String,
        base_url: String,
    }

    impl OpenAiEmbeddingProvider {
        pub fn new(api_key: String, model: String, base_url: Option<String>) -> Result<Self> {
            if api_key.is_empty() {
                return Err(LimoncelloError::EmbeddingError(
                    "OpenAI API key is empty".to_string(),
                ));
            }

            let client = Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .map_err(|e| LimoncelloError::EmbeddingError(e.to_string()))?;

            Ok(Self {
                client,
                api_key,
                model,
                base_url: base_url
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            })
        }

        fn request(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
            let body = EmbeddingRequest {
                input: texts,
                model: &self.model,
                user: "limoncello",
            };

            let response = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .map_err(|e| LimoncelloError::EmbeddingError(format!("Error while embedding: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().unwrap_or_default();
                return Err(LimoncelloError::EmbeddingError(format!(
                    "OpenAI returned {}: {}",
                    status, detail
                )));
            }

            let mut parsed: EmbeddingResponse = response
                .json()
                .map_err(|e| LimoncelloError::EmbeddingError(format!("Invalid response: {}", e)))?;

            if parsed.data.len() != texts.len() {
                return Err(LimoncelloError::EmbeddingError(format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                )));
            }

            parsed.data.sort_by_key(|d| d.index);
            debug!(model = %self.model, count = texts.len(), "fetched embeddings");
            Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
        }
    }

    impl EmbeddingProvider for OpenAiEmbeddingProvider {
        fn embed(&self, text: &str) -> Result<Embedding> {
            let mut embeddings = self.request(&[text])?;
            embeddings
                .pop()
                .ok_or_else(|| LimoncelloError::EmbeddingError("Empty embedding response".into()))
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            self.request(texts)
        }

        fn dimensions(&self) -> usize {
            match self.model.as_str() {
                "text-embedding-3-large" => 3072,
                _ => 1536,
            }
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }
}

/// Configuration for embedding providers
#[derive(Debug, Clone)]
pub enum EmbeddingConfig {
    /// Mock provider for testing
    Mock { dimensions: usize },

    /// Feature-hashed bag of words
    Hashing { dimensions: usize },

    /// OpenAI API
    OpenAi {
        api_key: String,
        model: String,
        base_url: Option<String>,
    },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::Hashing { dimensions: 384 }
    }
}

/// Create an embedding provider from configuration
pub fn create_provider(config: EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config {
        EmbeddingConfig::Mock { dimensions } => Ok(Arc::new(MockEmbeddingProvider::new(dimensions))),
        EmbeddingConfig::Hashing { dimensions } => {
            if dimensions == 0 {
                return Err(LimoncelloError::MalformedInput(
                    "Embedding dimensions must be positive".to_string(),
                ));
            }
            Ok(Arc::new(HashingEmbeddingProvider::new(dimensions)))
        }
        #[cfg(feature = "openai")]
        EmbeddingConfig::OpenAi { api_key, model, base_url } => {
            Ok(Arc::new(OpenAiEmbeddingProvider::new(api_key, model, base_url)?))
        }
        #[cfg(not(feature = "openai"))]
        EmbeddingConfig::OpenAi { .. } => Err(LimoncelloError::NotImplemented(
            "OpenAI embeddings require the `openai` feature".into(),
        )),
    }
}
