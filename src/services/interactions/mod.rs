use crate::config::LastClickedPolicy;
use crate::error::{RecommenderError, Result};
use crate::models::*;
use crate::services::catalog::{CatalogStore, InteractionLog};
use crate::utils::validation::validate_interaction;
use std::sync::Arc;
use tracing::debug;

/// Appends interactions to the log and folds them into item statistics.
///
/// Only `click` interactions move the click counter; every type refreshes
/// `last_clicked` according to the configured policy.
pub struct InteractionRecorder {
    catalog: Arc<dyn CatalogStore>,
    log: Arc<dyn InteractionLog>,
    policy: LastClickedPolicy,
}

impl InteractionRecorder {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        log: Arc<dyn InteractionLog>,
        policy: LastClickedPolicy,
    ) -> Self {
        Self { catalog, log, policy }
    }

    pub async fn record(&self, interaction: Interaction) -> Result<InteractionAck> {
        validate_interaction(&interaction)?;

        if self.catalog.get_item(&interaction.item_id).await.is_none() {
            return Err(RecommenderError::ItemNotFound(interaction.item_id.clone()));
        }

        self.log.append(interaction.clone()).await?;
        let item = self.catalog.apply_interaction(&interaction, self.policy).await?;

        debug!(
            "Recorded {:?} by {} on {} (clicks now {})",
            interaction.interaction_type, interaction.user_id, item.id, item.clicks
        );

        Ok(InteractionAck {
            interaction_id: interaction.id,
            item_id: item.id,
            clicks: item.clicks,
            last_clicked: item.last_clicked,
        })
    }

    pub async fn record_interaction(
        &self,
        user_id: &str,
        item_id: &str,
        interaction_type: InteractionType,
    ) -> Result<InteractionAck> {
        self.record(Interaction::new(user_id, item_id, interaction_type)).await
    }
}
