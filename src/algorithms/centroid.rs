use crate::algorithms::scorer::Candidate;
use crate::error::{RecommenderError, Result};
use crate::models::{Item, ModelMetadata, UncommittedModel};
use nalgebra::DVector;

/// Builds a click-weighted centroid of successful items' embeddings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidTrainer;

impl CentroidTrainer {
    pub fn new() -> Self {
        Self
    }

    /// Items with at least one click. Fails when there are none.
    pub fn select_successful(&self, items: &[Item]) -> Result<Vec<Item>> {
        let successful: Vec<Item> = items.iter().filter(|item| item.clicks > 0).cloned().collect();
        if successful.is_empty() {
            return Err(RecommenderError::TrainingDataEmpty);
        }
        Ok(successful)
    }

    /// Weighted per-dimension average of `successful` embeddings, weight = clicks / total clicks.
    ///
    /// `item_count` is the size of the population the successful set was drawn from
    /// and only feeds the model metadata.
    pub fn fit(
        &self,
        item_count: usize,
        successful: &[Candidate],
        base_version: u64,
    ) -> Result<UncommittedModel> {
        let successful: Vec<&Candidate> =
            successful.iter().filter(|c| c.item.clicks > 0).collect();
        let first = successful.first().ok_or(RecommenderError::TrainingDataEmpty)?;

        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(RecommenderError::DimensionMismatch { expected: 1, found: 0 });
        }

        let total_clicks: u64 = successful.iter().map(|c| c.item.clicks).sum();
        let mut centroid = DVector::<f64>::zeros(dimension);

        for candidate in &successful {
            if candidate.embedding.len() != dimension {
                return Err(RecommenderError::DimensionMismatch {
                    expected: dimension,
                    found: candidate.embedding.len(),
                });
            }
            let weight = candidate.item.clicks as f64 / total_clicks as f64;
            let embedding = DVector::from_iterator(
                dimension,
                candidate.embedding.iter().map(|&v| v as f64),
            );
            centroid += embedding * weight;
        }

        Ok(UncommittedModel {
            base_version,
            target_embedding: centroid.iter().map(|&v| v as f32).collect(),
            metadata: ModelMetadata::new(item_count, successful.len(), total_clicks),
        })
    }
}
