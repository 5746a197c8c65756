use crate::config::LastClickedPolicy;
use crate::error::{RecommenderError, Result};
use crate::models::*;
use crate::utils::validation::validate_item;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a new item, or refreshes the descriptive fields of an existing one.
    ///
    /// Click statistics of an existing item are kept; only interactions move them.
    async fn upsert_item(&self, item: Item) -> Result<Item>;
    async fn get_item(&self, item_id: &str) -> Option<Item>;
    /// Every item, ordered by id.
    async fn list_items(&self) -> Vec<Item>;
    /// Items in the order requested; fails on the first unknown id.
    async fn get_items(&self, item_ids: &[String]) -> Result<Vec<Item>>;
    /// Items for training: clicked items first, then by id, at most `limit`.
    async fn list_items_with_interactions(&self, limit: usize) -> Vec<Item>;
    /// Applies one interaction to its item's counters and returns the updated item.
    async fn apply_interaction(
        &self,
        interaction: &Interaction,
        policy: LastClickedPolicy,
    ) -> Result<Item>;
}

#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn append(&self, interaction: Interaction) -> Result<()>;
    async fn list_for_item(&self, item_id: &str) -> Vec<Interaction>;
    async fn len(&self) -> usize;
}

/// Items behind per-record locks plus an append-only interaction log.
#[derive(Default)]
pub struct InMemoryCatalog {
    items: DashMap<String, Arc<Mutex<Item>>>,
    interactions: RwLock<Vec<Interaction>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn upsert_item(&self, item: Item) -> Result<Item> {
        validate_item(&item)?;

        match self.items.entry(item.id.clone()) {
            Entry::Occupied(entry) => {
                let mut stored = entry.get().lock();
                stored.title = item.title;
                stored.description = item.description;
                stored.category = item.category;
                stored.attributes = item.attributes;
                Ok(stored.clone())
            }
            Entry::Vacant(entry) => {
                info!("Added catalog item: {}", item.id);
                entry.insert(Arc::new(Mutex::new(item.clone())));
                Ok(item)
            }
        }
    }

    async fn get_item(&self, item_id: &str) -> Option<Item> {
        self.items.get(item_id).map(|entry| entry.value().lock().clone())
    }

    async fn get_items(&self, item_ids: &[String]) -> Result<Vec<Item>> {
        item_ids
            .iter()
            .map(|id| {
                self.items
                    .get(id)
                    .map(|entry| entry.value().lock().clone())
                    .ok_or_else(|| RecommenderError::ItemNotFound(id.clone()))
            })
            .collect()
    }

    async fn list_items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .map(|entry| entry.value().lock().clone())
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    async fn list_items_with_interactions(&self, limit: usize) -> Vec<Item> {
        let mut items = self.list_items().await;
        items.sort_by_key(|item| item.clicks == 0);

        if items.len() > limit {
            warn!(
                "Catalog holds {} items, training on the first {} (clicked items first)",
                items.len(),
                limit
            );
            items.truncate(limit);
        }
        items
    }

    async fn apply_interaction(
        &self,
        interaction: &Interaction,
        policy: LastClickedPolicy,
    ) -> Result<Item> {
        let slot = self
            .items
            .get(&interaction.item_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RecommenderError::ItemNotFound(interaction.item_id.clone()))?;

        let mut item = slot.lock();
        if interaction.interaction_type == InteractionType::Click {
            item.clicks += 1;
        }

        item.last_clicked = match (policy, item.last_clicked) {
            (LastClickedPolicy::Monotonic, Some(current)) if current >= interaction.timestamp => {
                Some(current)
            }
            _ => Some(interaction.timestamp),
        };

        Ok(item.clone())
    }
}

#[async_trait]
impl InteractionLog for InMemoryCatalog {
    async fn append(&self, interaction: Interaction) -> Result<()> {
        self.interactions.write().push(interaction);
        Ok(())
    }

    async fn list_for_item(&self, item_id: &str) -> Vec<Interaction> {
        self.interactions
            .read()
            .iter()
            .filter(|interaction| interaction.item_id == item_id)
            .cloned()
            .collect()
    }

    async fn len(&self) -> usize {
        self.interactions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_get_items_preserves_request_order() {
        let catalog = InMemoryCatalog::new();
        for id in ["a", "b", "c"] {
            catalog.upsert_item(Item::new(id, id.to_uppercase(), "cat")).await.unwrap();
        }

        let ids = vec!["c".to_string(), "a".to_string()];
        let items = catalog.get_items(&ids).await.unwrap();
        assert_eq!(items[0].id, "c");
        assert_eq!(items[1].id, "a");
    }

    #[tokio::test]
    async fn test_get_items_reports_missing_id() {
        let catalog = InMemoryCatalog::new();
        let result = catalog.get_items(&["ghost".to_string()]).await;
        assert!(matches!(result, Err(RecommenderError::ItemNotFound(id)) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_item() {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.upsert_item(Item::new("x", "", "cat")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_items_sorted_and_limited() {
        let catalog = InMemoryCatalog::new();
        for id in ["d", "b", "a", "c"] {
            catalog.upsert_item(Item::new(id, id, "cat")).await.unwrap();
        }
        let items = catalog.list_items_with_interactions(3).await;
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let all: Vec<String> = catalog.list_items().await.into_iter().map(|i| i.id).collect();
        assert_eq!(all, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_clicked_items_survive_training_limit() {
        let catalog = InMemoryCatalog::new();
        for id in ["a", "b", "c"] {
            catalog.upsert_item(Item::new(id, id, "cat")).await.unwrap();
        }
        catalog.upsert_item(Item::new("z", "z", "cat")).await.unwrap();
        let click = Interaction::new("u", "z", InteractionType::Click);
        catalog.apply_interaction(&click, LastClickedPolicy::Overwrite).await.unwrap();

        let items = catalog.list_items_with_interactions(2).await;
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[tokio::test]
    async fn test_reupsert_keeps_click_statistics() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_item(Item::new("a", "A", "cat")).await.unwrap();
        for _ in 0..3 {
            let click = Interaction::new("u", "a", InteractionType::Click);
            catalog.apply_interaction(&click, LastClickedPolicy::Overwrite).await.unwrap();
        }
        let before = catalog.get_item("a").await.unwrap();

        let refreshed = catalog
            .upsert_item(Item::new("a", "A v2", "cat").with_description("new copy").with_clicks(99))
            .await
            .unwrap();

        assert_eq!(refreshed.title, "A v2");
        assert_eq!(refreshed.description, "new copy");
        assert_eq!(refreshed.clicks, 3);
        assert_eq!(refreshed.last_clicked, before.last_clicked);
        assert_eq!(catalog.get_item("a").await.unwrap(), refreshed);
    }

    #[tokio::test]
    async fn test_monotonic_policy_ignores_older_timestamp() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_item(Item::new("a", "A", "cat")).await.unwrap();
        let now = Utc::now();

        let newer = Interaction::new("u", "a", InteractionType::Click).at(now);
        let older = Interaction::new("u", "a", InteractionType::Click).at(now - Duration::hours(3));

        catalog.apply_interaction(&newer, LastClickedPolicy::Monotonic).await.unwrap();
        let item = catalog.apply_interaction(&older, LastClickedPolicy::Monotonic).await.unwrap();
        assert_eq!(item.last_clicked, Some(now));
        assert_eq!(item.clicks, 2);
    }

    #[tokio::test]
    async fn test_overwrite_policy_takes_last_write() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_item(Item::new("a", "A", "cat")).await.unwrap();
        let now = Utc::now();
        let older = now - Duration::hours(3);

        catalog
            .apply_interaction(&Interaction::new("u", "a", InteractionType::View).at(now), LastClickedPolicy::Overwrite)
            .await
            .unwrap();
        let item = catalog
            .apply_interaction(&Interaction::new("u", "a", InteractionType::View).at(older), LastClickedPolicy::Overwrite)
            .await
            .unwrap();
        assert_eq!(item.last_clicked, Some(older));
        assert_eq!(item.clicks, 0);
    }

    #[tokio::test]
    async fn test_concurrent_clicks_are_not_lost() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.upsert_item(Item::new("hot", "Hot", "cat")).await.unwrap();

        let mut handles = Vec::new();
        for n in 0..50 {
            let catalog = catalog.clone();
            handles.push(tokio::spawn(async move {
                let click = Interaction::new(format!("user-{n}"), "hot", InteractionType::Click);
                catalog.apply_interaction(&click, LastClickedPolicy::Overwrite).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(catalog.get_item("hot").await.unwrap().clicks, 50);
    }
}
