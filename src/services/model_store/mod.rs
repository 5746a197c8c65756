//! Versioned model storage with a single active version.
//!
//! Commits are optimistic: a trained model carries the max version its
//! trainer observed, and the store rejects it with `VersionConflict` if
//! another commit landed in between. Version assignment, deactivation of the
//! previous model and activation of the new one happen under one write lock,
//! so readers see either the old active model or the new one, never both and
//! never neither.

use crate::error::{RecommenderError, Result};
use crate::models::*;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

#[async_trait]
pub trait ModelRepository: Send + Sync {
    async fn commit(&self, model: UncommittedModel) -> Result<Model>;
    async fn get_active(&self) -> Option<Model>;
    async fn get_version(&self, version: u64) -> Option<Model>;
    /// All models, ascending by version.
    async fn list_versions(&self) -> Vec<Model>;
    /// Highest committed version, or 0 when nothing has been committed.
    async fn max_version(&self) -> u64;
    async fn attach_recommendations(
        &self,
        version: u64,
        summaries: Vec<RecommendationSummary>,
    ) -> Result<Model>;
}

#[derive(Debug, Default)]
struct ModelState {
    models: Vec<Model>,
    active: Option<usize>,
}

impl ModelState {
    fn max_version(&self) -> u64 {
        self.models.last().map(|m| m.version).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct ModelStore {
    state: RwLock<ModelState>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version_count(&self) -> usize {
        self.state.read().models.len()
    }

    pub fn active_version(&self) -> Option<u64> {
        let state = self.state.read();
        state.active.map(|index| state.models[index].version)
    }
}

#[async_trait]
impl ModelRepository for ModelStore {
    async fn commit(&self, model: UncommittedModel) -> Result<Model> {
        let mut state = self.state.write();

        let found = state.max_version();
        if found != model.base_version {
            warn!(
                "Rejected model commit based on version {} (current max is {})",
                model.base_version, found
            );
            return Err(RecommenderError::VersionConflict {
                expected: model.base_version,
                found,
            });
        }

        let committed = Model {
            version: found + 1,
            target_embedding: model.target_embedding,
            metadata: model.metadata,
            is_active: true,
        };

        if let Some(previous) = state.active {
            state.models[previous].is_active = false;
        }
        state.models.push(committed.clone());
        let index = state.models.len() - 1;
        state.active = Some(index);

        info!(
            "Activated model version {} (trained on {} items, {} successful, {} clicks)",
            committed.version,
            committed.metadata.item_count,
            committed.metadata.successful_item_count,
            committed.metadata.total_clicks
        );
        Ok(committed)
    }

    async fn get_active(&self) -> Option<Model> {
        let state = self.state.read();
        state.active.map(|index| state.models[index].clone())
    }

    async fn get_version(&self, version: u64) -> Option<Model> {
        let state = self.state.read();
        state.models.iter().find(|m| m.version == version).cloned()
    }

    async fn list_versions(&self) -> Vec<Model> {
        self.state.read().models.clone()
    }

    async fn max_version(&self) -> u64 {
        self.state.read().max_version()
    }

    async fn attach_recommendations(
        &self,
        version: u64,
        summaries: Vec<RecommendationSummary>,
    ) -> Result<Model> {
        let mut state = self.state.write();
        let model = state
            .models
            .iter_mut()
            .find(|m| m.version == version)
            .ok_or_else(|| RecommenderError::InvalidInput(format!("unknown model version {}", version)))?;

        model.metadata.recommendations = summaries;
        Ok(model.clone())
    }
}
