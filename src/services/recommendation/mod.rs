use crate::algorithms::scorer::{rank_order, Candidate};
use crate::algorithms::{ResponseParser, Scorer};
use crate::config::Config;
use crate::error::{RecommenderError, Result};
use crate::models::*;
use crate::services::catalog::CatalogStore;
use crate::services::embedding::EmbeddingService;
use crate::services::generation::TextGenerator;
use crate::services::model_store::ModelRepository;
use crate::utils::validation::{validate_embedding, validate_limit};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

pub struct RecommendationService {
    catalog: Arc<dyn CatalogStore>,
    models: Arc<dyn ModelRepository>,
    embeddings: Arc<EmbeddingService>,
    generator: Option<Arc<dyn TextGenerator>>,
    scorer: Scorer,
    parser: ResponseParser,
    config: Arc<Config>,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        models: Arc<dyn ModelRepository>,
        embeddings: Arc<EmbeddingService>,
        generator: Option<Arc<dyn TextGenerator>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            catalog,
            models,
            embeddings,
            generator,
            scorer: Scorer::new(),
            parser: ResponseParser::new(),
            config,
        }
    }

    fn resolve_limit(&self, limit: Option<usize>) -> Result<usize> {
        validate_limit(
            limit,
            self.config.recommendation.default_limit,
            self.config.recommendation.max_limit,
        )
    }

    /// Fetches candidates by id, each id once, in first-occurrence order.
    async fn fetch_candidates(&self, candidate_item_ids: &[String]) -> Result<Vec<Item>> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(candidate_item_ids.len());
        let mut unique = Vec::with_capacity(candidate_item_ids.len());
        for id in candidate_item_ids {
            if seen.insert(id.as_str()) {
                unique.push(id.clone());
            }
        }
        self.catalog.get_items(&unique).await
    }

    async fn rank_against(
        &self,
        target: &[f32],
        items: Vec<Item>,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        let candidates = self.embeddings.embed_items(items).await?;
        let ranked = self.scorer.rank(&candidates, target, limit, Utc::now());

        Ok(ranked
            .into_iter()
            .map(|scored| Recommendation {
                reasoning: Some(scored.breakdown.describe()),
                score: scored.breakdown.combined,
                item: scored.item,
            })
            .collect())
    }

    /// Ranks the requested candidates against a context, an explicit embedding,
    /// or the active model's target embedding when no target is given.
    pub async fn recommend(&self, request: &RecommendationRequest) -> Result<RecommendationResponse> {
        let limit = self.resolve_limit(request.limit)?;

        let (target, model_version) = match &request.target {
            Some(RecommendationTarget::Context(context)) => {
                (self.embeddings.embed_text(context).await?, None)
            }
            Some(RecommendationTarget::Embedding(embedding)) => {
                validate_embedding(embedding)?;
                (embedding.clone(), None)
            }
            None => {
                let model = self.models.get_active().await.ok_or(RecommenderError::NoActiveModel)?;
                (model.target_embedding, Some(model.version))
            }
        };

        let items = self.fetch_candidates(&request.candidate_item_ids).await?;
        let recommendations = self.rank_against(&target, items, limit).await?;

        info!(
            "Ranked {} candidates, returning {}",
            request.candidate_item_ids.len(),
            recommendations.len()
        );

        Ok(RecommendationResponse {
            recommendations,
            model_version,
            generated_at: Utc::now(),
        })
    }

    /// Extracts recommendations from already-generated text about the candidates.
    pub async fn recommend_from_text(
        &self,
        generated_text: &str,
        candidate_item_ids: &[String],
        limit: Option<usize>,
    ) -> Result<RecommendationResponse> {
        let limit = self.resolve_limit(limit)?;
        let items = self.fetch_candidates(candidate_item_ids).await?;
        self.rank_generated(generated_text, items, limit).await
    }

    /// Ranks candidates by how closely they resemble `item_id`, using that item's
    /// embedding as the target. An empty candidate list means the whole catalog.
    /// The item itself is never returned.
    pub async fn similar_items(
        &self,
        item_id: &str,
        candidate_item_ids: &[String],
        limit: Option<usize>,
    ) -> Result<RecommendationResponse> {
        let limit = self.resolve_limit(limit)?;
        let anchor = self
            .catalog
            .get_item(item_id)
            .await
            .ok_or_else(|| RecommenderError::ItemNotFound(item_id.to_string()))?;
        let target = self.embeddings.embed_item(&anchor).await?;

        let items: Vec<Item> = if candidate_item_ids.is_empty() {
            self.catalog.list_items().await
        } else {
            self.fetch_candidates(candidate_item_ids).await?
        }
        .into_iter()
        .filter(|item| item.id != anchor.id)
        .collect();

        let recommendations = self.rank_against(&target, items, limit).await?;
        debug!("Found {} items similar to {}", recommendations.len(), anchor.id);

        Ok(RecommendationResponse {
            recommendations,
            model_version: None,
            generated_at: Utc::now(),
        })
    }

    /// Every catalog item with its score from the active model's recorded
    /// recommendations, 0.0 when unrecorded.
    pub async fn list_items(&self) -> Vec<ItemListing> {
        let recorded: HashMap<String, f32> = self
            .models
            .get_active()
            .await
            .map(|model| {
                model
                    .metadata
                    .recommendations
                    .into_iter()
                    .map(|summary| (summary.item_id, summary.score))
                    .collect()
            })
            .unwrap_or_default();

        self.catalog
            .list_items()
            .await
            .into_iter()
            .map(|item| ItemListing {
                score: recorded.get(&item.id).copied().unwrap_or(0.0),
                item,
            })
            .collect()
    }

    /// Prompts the configured generator about the candidates and parses its answer.
    pub async fn recommend_with_generator(
        &self,
        user_context: &str,
        candidate_item_ids: &[String],
        limit: Option<usize>,
    ) -> Result<RecommendationResponse> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| RecommenderError::Generation("no text generator configured".into()))?;

        let limit = self.resolve_limit(limit)?;
        let items = self.fetch_candidates(candidate_item_ids).await?;
        let prompt = self.parser.build_prompt(user_context, &items, limit);
        let generated = generator.generate(&prompt).await?;

        let response = self.rank_generated(&generated, items, limit).await?;

        if let Some(version) = response.model_version {
            let summaries = response.recommendations.iter().map(Recommendation::summary).collect();
            self.models.attach_recommendations(version, summaries).await?;
        }

        Ok(response)
    }

    async fn rank_generated(
        &self,
        generated_text: &str,
        items: Vec<Item>,
        limit: usize,
    ) -> Result<RecommendationResponse> {
        let mut recommendations = self.parser.parse(generated_text, &items);
        let mut model_version = None;

        if !self.config.recommendation.text_scores_authoritative && !recommendations.is_empty() {
            if let Some(model) = self.models.get_active().await {
                self.rescore(&mut recommendations, &items, &model).await?;
                model_version = Some(model.version);
            }
        }

        recommendations.truncate(limit);
        debug!("Generated text yielded {} recommendations", recommendations.len());

        Ok(RecommendationResponse {
            recommendations,
            model_version,
            generated_at: Utc::now(),
        })
    }

    /// Replaces marker-count scores with vector scores against `model`, keeping
    /// the generated text as reasoning.
    async fn rescore(
        &self,
        recommendations: &mut [Recommendation],
        candidate_set: &[Item],
        model: &Model,
    ) -> Result<()> {
        let max_clicks_in_set = candidate_set.iter().map(|item| item.clicks).max().unwrap_or(0);
        let mentioned: Vec<Item> = recommendations.iter().map(|r| r.item.clone()).collect();

        let embeddings: HashMap<String, Vec<f32>> = self
            .embeddings
            .embed_items(mentioned)
            .await?
            .into_iter()
            .map(|Candidate { item, embedding }| (item.id, embedding))
            .collect();

        let now = Utc::now();
        for recommendation in recommendations.iter_mut() {
            if let Some(embedding) = embeddings.get(&recommendation.item.id) {
                recommendation.score = self
                    .scorer
                    .score(&recommendation.item, embedding, &model.target_embedding, max_clicks_in_set, now)
                    .combined;
            }
        }

        recommendations.sort_by(|a, b| rank_order(a.score, &a.item.id, b.score, &b.item.id));
        Ok(())
    }

    pub async fn active_model(&self) -> Option<Model> {
        self.models.get_active().await
    }
}
