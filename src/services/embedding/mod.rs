//! Text-to-vector embeddings.
//!
//! [`EmbeddingProvider`] is the seam to whatever runtime produces vectors.
//! [`EmbeddingService`] wraps a provider with a bounded per-item cache, a call
//! timeout and bounded fan-out for candidate sets.

use crate::algorithms::scorer::Candidate;
use crate::config::EmbeddingConfig;
use crate::error::{RecommenderError, Result};
use crate::models::Item;
use crate::utils::{hash_str, normalize_vector, validation::validate_embedding};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize;
}

/// Runtime tuning forwarded to providers that load model weights.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeOptions {
    pub model_path: String,
    pub context_window_size: usize,
    pub batch_size: usize,
    pub thread_count: usize,
}

impl From<&EmbeddingConfig> for RuntimeOptions {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            context_window_size: config.context_window_size,
            batch_size: config.batch_size,
            thread_count: config.thread_count,
        }
    }
}

/// Deterministic feature-hashing embedder over lowercase word tokens.
///
/// Each token lands in one signed bucket; the result is L2-normalized, so texts
/// sharing vocabulary point in similar directions. It needs no model weights.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
    options: RuntimeOptions,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize, options: RuntimeOptions) -> Self {
        Self { dimension, options }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            let hash = hash_str(&token);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        normalize_vector(&mut embedding);
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            return Err(RecommenderError::EmbeddingUnavailable(
                "hashing provider configured with zero dimensions".into(),
            ));
        }
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

/// Builds the provider named by `config.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashing" => {
            info!(
                "Using hashing embedding provider ({} dimensions, {} threads)",
                config.dimension, config.thread_count
            );
            Ok(Arc::new(HashingEmbeddingProvider::new(config.dimension, config.into())))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: hashing"),
    }
}

#[derive(Debug, Clone)]
struct CachedEmbedding {
    text_hash: u64,
    embedding: Vec<f32>,
}

/// Item embeddings keyed by item id, invalidated when the item's text changes.
#[derive(Debug)]
pub struct EmbeddingCache {
    entries: DashMap<String, CachedEmbedding>,
    capacity: usize,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self { entries: DashMap::new(), capacity }
    }

    pub fn get(&self, item_id: &str, text_hash: u64) -> Option<Vec<f32>> {
        self.entries
            .get(item_id)
            .filter(|entry| entry.text_hash == text_hash)
            .map(|entry| entry.embedding.clone())
    }

    pub fn insert(&self, item_id: &str, text_hash: u64, embedding: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }

        if self.entries.len() >= self.capacity && !self.entries.contains_key(item_id) {
            let victim = self.entries.iter().next().map(|entry| entry.key().clone());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }

        self.entries.insert(item_id.to_string(), CachedEmbedding { text_hash, embedding });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    timeout: Duration,
    max_concurrency: usize,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            cache: EmbeddingCache::new(config.cache_size),
            timeout: Duration::from_millis(config.timeout_ms),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Embeds free text, treating a provider that exceeds the timeout as unavailable.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = match tokio::time::timeout(self.timeout, self.provider.embed(text)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Embedding provider timed out after {:?}", self.timeout);
                return Err(RecommenderError::EmbeddingUnavailable(format!(
                    "embedding timed out after {:?}",
                    self.timeout
                )));
            }
        };

        validate_embedding(&embedding)?;
        Ok(embedding)
    }

    pub async fn embed_item(&self, item: &Item) -> Result<Vec<f32>> {
        let text = item.embedding_text();
        let text_hash = hash_str(&text);

        if let Some(embedding) = self.cache.get(&item.id, text_hash) {
            return Ok(embedding);
        }

        let embedding = self.embed_text(&text).await?;
        self.cache.insert(&item.id, text_hash, embedding.clone());
        debug!("Embedded item {}", item.id);
        Ok(embedding)
    }

    /// Embeds `items` with at most `max_concurrency` provider calls in flight.
    ///
    /// Completion order is unspecified; the first failure aborts the batch.
    pub async fn embed_items(&self, items: Vec<Item>) -> Result<Vec<Candidate>> {
        stream::iter(items)
            .map(|item| async move {
                let embedding = self.embed_item(&item).await?;
                Ok::<_, RecommenderError>(Candidate { item, embedding })
            })
            .buffer_unordered(self.max_concurrency)
            .try_collect()
            .await
    }
}
