use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommenderError>;

#[derive(Debug, Error)]
pub enum RecommenderError {
    #[error("embedding runtime unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("no item has clicks > 0; nothing to train on")]
    TrainingDataEmpty,

    #[error("model version conflict: expected max version {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    #[error("generated text mentions none of the candidate items")]
    MalformedGenerationOutput,

    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("no active model has been trained yet")]
    NoActiveModel,

    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("text generation failed: {0}")]
    Generation(String),
}

impl RecommenderError {
    /// Whether the caller can reasonably retry the same operation after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable(_) | Self::VersionConflict { .. } | Self::Generation(_)
        )
    }

    /// HTTP status the server answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::ItemNotFound(_) | Self::NoActiveModel => StatusCode::NOT_FOUND,
            Self::VersionConflict { .. } => StatusCode::CONFLICT,
            Self::TrainingDataEmpty | Self::MalformedGenerationOutput => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::EmbeddingUnavailable(_) | Self::Generation(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
