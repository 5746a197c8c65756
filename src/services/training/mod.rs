use crate::algorithms::CentroidTrainer;
use crate::config::Config;
use crate::error::{RecommenderError, Result};
use crate::models::*;
use crate::services::catalog::CatalogStore;
use crate::services::embedding::EmbeddingService;
use crate::services::model_store::ModelRepository;
use crate::utils::retry_with_backoff;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct TrainingService {
    catalog: Arc<dyn CatalogStore>,
    models: Arc<dyn ModelRepository>,
    embeddings: Arc<EmbeddingService>,
    trainer: CentroidTrainer,
    config: Arc<Config>,
}

impl TrainingService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        models: Arc<dyn ModelRepository>,
        embeddings: Arc<EmbeddingService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            catalog,
            models,
            embeddings,
            trainer: CentroidTrainer::new(),
            config,
        }
    }

    /// Trains a model from the current catalog without committing it.
    ///
    /// The store's max version is read before any item data, so a commit that
    /// lands while this runs is detected at commit time.
    pub async fn train(&self) -> Result<UncommittedModel> {
        let base_version = self.models.max_version().await;
        let items = self
            .catalog
            .list_items_with_interactions(self.config.training.item_limit)
            .await;

        let successful = self.trainer.select_successful(&items)?;
        info!(
            "Training on {} items ({} with clicks) from base version {}",
            items.len(),
            successful.len(),
            base_version
        );

        let candidates = self.embeddings.embed_items(successful).await?;
        self.trainer.fit(items.len(), &candidates, base_version)
    }

    pub async fn commit(&self, model: UncommittedModel) -> Result<Model> {
        self.models.commit(model).await
    }

    /// Trains and commits, retraining on fresh data after a version conflict.
    pub async fn train_and_commit(&self) -> Result<Model> {
        retry_with_backoff(
            move || async move {
                let model = self.train().await?;
                self.commit(model).await
            },
            self.config.training.max_commit_retries,
            Duration::from_millis(self.config.training.retry_backoff_ms),
            |e: &RecommenderError| matches!(e, RecommenderError::VersionConflict { .. }),
        )
        .await
    }

    pub async fn list_versions(&self) -> Vec<Model> {
        self.models.list_versions().await
    }

    pub async fn active_model(&self) -> Option<Model> {
        self.models.get_active().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::InMemoryCatalog;
    use crate::services::embedding::HashingEmbeddingProvider;
    use crate::services::model_store::ModelStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `conflicts` commits as if another trainer had won the race.
    struct ContendedStore {
        inner: ModelStore,
        conflicts: AtomicUsize,
    }

    #[async_trait]
    impl ModelRepository for ContendedStore {
        async fn commit(&self, model: UncommittedModel) -> Result<Model> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                let found = self.inner.max_version().await + 1;
                return Err(RecommenderError::VersionConflict { expected: model.base_version, found });
            }
            self.inner.commit(model).await
        }

        async fn get_active(&self) -> Option<Model> {
            self.inner.get_active().await
        }

        async fn get_version(&self, version: u64) -> Option<Model> {
            self.inner.get_version(version).await
        }

        async fn list_versions(&self) -> Vec<Model> {
            self.inner.list_versions().await
        }

        async fn max_version(&self) -> u64 {
            self.inner.max_version().await
        }

        async fn attach_recommendations(
            &self,
            version: u64,
            summaries: Vec<RecommendationSummary>,
        ) -> Result<Model> {
            self.inner.attach_recommendations(version, summaries).await
        }
    }

    async fn service_with(
        models: Arc<dyn ModelRepository>,
        items: Vec<Item>,
    ) -> TrainingService {
        let mut config = Config::default();
        config.training.retry_backoff_ms = 1;
        let config = Arc::new(config);

        let catalog = Arc::new(InMemoryCatalog::new());
        for item in items {
            catalog.upsert_item(item).await.unwrap();
        }

        let provider = Arc::new(HashingEmbeddingProvider::new(32, (&config.embedding).into()));
        let embeddings = Arc::new(EmbeddingService::new(provider, &config.embedding));
        TrainingService::new(catalog, models, embeddings, config)
    }

    #[tokio::test]
    async fn test_train_and_commit_activates_first_version() {
        let store = Arc::new(ModelStore::new());
        let service = service_with(
            store.clone(),
            vec![
                Item::new("a", "AlphaWidget", "widgets").with_clicks(4),
                Item::new("b", "BetaGadget", "gadgets"),
            ],
        )
        .await;

        let model = service.train_and_commit().await.unwrap();
        assert_eq!(model.version, 1);
        assert!(model.is_active);
        assert_eq!(model.target_embedding.len(), 32);
        assert_eq!(model.metadata.item_count, 2);
        assert_eq!(model.metadata.successful_item_count, 1);
        assert_eq!(model.metadata.total_clicks, 4);
    }

    #[tokio::test]
    async fn test_empty_training_data_creates_no_version() {
        let store = Arc::new(ModelStore::new());
        let service = service_with(
            store.clone(),
            vec![Item::new("a", "AlphaWidget", "widgets"), Item::new("b", "BetaGadget", "gadgets")],
        )
        .await;

        let result = service.train_and_commit().await;
        assert!(matches!(result, Err(RecommenderError::TrainingDataEmpty)));
        assert_eq!(store.version_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_trained_model_is_rejected() {
        let store = Arc::new(ModelStore::new());
        let service = service_with(
            store.clone(),
            vec![Item::new("a", "AlphaWidget", "widgets").with_clicks(1)],
        )
        .await;

        let stale = service.train().await.unwrap();
        service.train_and_commit().await.unwrap();

        assert!(matches!(
            service.commit(stale).await,
            Err(RecommenderError::VersionConflict { expected: 0, found: 1 })
        ));
        assert_eq!(store.version_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_past_version_conflicts() {
        let store = Arc::new(ContendedStore {
            inner: ModelStore::new(),
            conflicts: AtomicUsize::new(2),
        });
        let service = service_with(
            store.clone(),
            vec![Item::new("a", "AlphaWidget", "widgets").with_clicks(1)],
        )
        .await;

        let model = service.train_and_commit().await.unwrap();
        assert_eq!(model.version, 1);
        assert_eq!(store.conflicts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let store = Arc::new(ContendedStore {
            inner: ModelStore::new(),
            conflicts: AtomicUsize::new(100),
        });
        let service = service_with(
            store.clone(),
            vec![Item::new("a", "AlphaWidget", "widgets").with_clicks(1)],
        )
        .await;

        let result = service.train_and_commit().await;
        assert!(matches!(result, Err(RecommenderError::VersionConflict { .. })));
        assert_eq!(store.inner.version_count(), 0);
    }
}
