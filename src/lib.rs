pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::RecommenderError;
pub use models::*;

use anyhow::Result;
use services::catalog::InMemoryCatalog;
use services::embedding::{create_provider, EmbeddingProvider, EmbeddingService};
use services::generation::TextGenerator;
use services::interactions::InteractionRecorder;
use services::model_store::ModelStore;
use services::recommendation::RecommendationService;
use services::training::TrainingService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<InMemoryCatalog>,
    pub model_store: Arc<ModelStore>,
    pub embeddings: Arc<EmbeddingService>,
    pub recommendation_service: Arc<RecommendationService>,
    pub training_service: Arc<TrainingService>,
    pub interaction_recorder: Arc<InteractionRecorder>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let provider = create_provider(&config.embedding)?;
        Ok(Self::with_components(config, provider, None))
    }

    /// Wires the services around an explicit embedding provider and optional
    /// text generator.
    pub fn with_components(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let config = Arc::new(config);

        let catalog = Arc::new(InMemoryCatalog::new());
        let model_store = Arc::new(ModelStore::new());
        let embeddings = Arc::new(EmbeddingService::new(provider, &config.embedding));

        let recommendation_service = Arc::new(RecommendationService::new(
            catalog.clone(),
            model_store.clone(),
            embeddings.clone(),
            generator,
            config.clone(),
        ));

        let training_service = Arc::new(TrainingService::new(
            catalog.clone(),
            model_store.clone(),
            embeddings.clone(),
            config.clone(),
        ));

        let interaction_recorder = Arc::new(InteractionRecorder::new(
            catalog.clone(),
            catalog.clone(),
            config.interactions.last_clicked_policy,
        ));

        Self {
            config,
            catalog,
            model_store,
            embeddings,
            recommendation_service,
            training_service,
            interaction_recorder,
        }
    }
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
