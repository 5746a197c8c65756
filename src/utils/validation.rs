use crate::error::{RecommenderError, Result};
use crate::models::*;

const MAX_TITLE_LEN: usize = 512;

pub fn validate_item(item: &Item) -> Result<()> {
    if item.id.trim().is_empty() {
        return Err(RecommenderError::InvalidInput("item id cannot be empty".into()));
    }

    if item.title.trim().is_empty() {
        return Err(RecommenderError::InvalidInput("item title cannot be empty".into()));
    }

    if item.title.chars().count() > MAX_TITLE_LEN {
        return Err(RecommenderError::InvalidInput(format!(
            "item title too long (max {} characters)",
            MAX_TITLE_LEN
        )));
    }

    Ok(())
}

pub fn validate_interaction(interaction: &Interaction) -> Result<()> {
    if interaction.user_id.trim().is_empty() {
        return Err(RecommenderError::InvalidInput("user id cannot be empty".into()));
    }

    if interaction.item_id.trim().is_empty() {
        return Err(RecommenderError::InvalidInput("item id cannot be empty".into()));
    }

    let max_future = chrono::Utc::now() + chrono::Duration::hours(1);
    if interaction.timestamp > max_future {
        return Err(RecommenderError::InvalidInput(
            "timestamp cannot be more than 1 hour in the future".into(),
        ));
    }

    Ok(())
}

pub fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(RecommenderError::InvalidInput("embedding cannot be empty".into()));
    }

    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(RecommenderError::InvalidInput(
            "embedding contains invalid values (NaN or Infinity)".into(),
        ));
    }

    Ok(())
}

/// Resolves a caller-supplied limit against the configured default and ceiling.
pub fn validate_limit(limit: Option<usize>, default_limit: usize, max_limit: usize) -> Result<usize> {
    match limit {
        None => Ok(default_limit),
        Some(0) => Err(RecommenderError::InvalidInput("limit must be greater than zero".into())),
        Some(n) if n > max_limit => Err(RecommenderError::InvalidInput(format!(
            "limit {} exceeds maximum of {}",
            n, max_limit
        ))),
        Some(n) => Ok(n),
    }
}
