use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub last_clicked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Click,
    View,
    Purchase,
    Favorite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub user_id: String,
    pub item_id: String,
    pub interaction_type: InteractionType,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationSummary {
    pub item_id: String,
    pub score: f32,
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    pub trained_on: DateTime<Utc>,
    pub item_count: usize,
    pub successful_item_count: usize,
    pub total_clicks: u64,
    pub avg_clicks_per_item: f64,
    #[serde(default)]
    pub recommendations: Vec<RecommendationSummary>,
}

/// Output of a training run, not yet versioned or activated.
///
/// `base_version` is the highest committed version the trainer saw when it
/// started; the store refuses the commit if that has moved on since.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncommittedModel {
    pub base_version: u64,
    pub target_embedding: Vec<f32>,
    pub metadata: ModelMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub version: u64,
    pub target_embedding: Vec<f32>,
    pub metadata: ModelMetadata,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub item: Item,
    pub score: f32,
    pub reasoning: Option<String>,
}

/// What a recommendation request is ranked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTarget {
    Context(String),
    Embedding(Vec<f32>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub target: Option<RecommendationTarget>,
    pub candidate_item_ids: Vec<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
    pub model_version: Option<u64>,
    pub generated_at: DateTime<Utc>,
}

/// Catalog ingestion payload. Click statistics are not part of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemUpsert {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// An item with its score in the active model's recorded recommendations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemListing {
    #[serde(flatten)]
    pub item: Item,
    /// 0.0 when the item is absent from the recorded list or no model is active.
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionAck {
    pub interaction_id: Uuid,
    pub item_id: String,
    pub clicks: u64,
    pub last_clicked: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: category.into(),
            attributes: serde_json::Map::new(),
            clicks: 0,
            last_clicked: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_clicks(mut self, clicks: u64) -> Self {
        self.clicks = clicks;
        self
    }

    pub fn with_last_clicked(mut self, at: DateTime<Utc>) -> Self {
        self.last_clicked = Some(at);
        self
    }

    /// Text handed to the embedding provider for this item.
    pub fn embedding_text(&self) -> String {
        let attributes = serde_json::Value::Object(self.attributes.clone());
        format!(
            "Title: {}\nDescription: {}\nCategory: {}\nAttributes: {}",
            self.title, self.description, self.category, attributes
        )
    }
}

impl From<ItemUpsert> for Item {
    fn from(upsert: ItemUpsert) -> Self {
        Self {
            id: upsert.id,
            title: upsert.title,
            description: upsert.description,
            category: upsert.category,
            attributes: upsert.attributes,
            clicks: 0,
            last_clicked: None,
        }
    }
}

impl Interaction {
    pub fn new(user_id: impl Into<String>, item_id: impl Into<String>, interaction_type: InteractionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            item_id: item_id.into(),
            interaction_type,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl ModelMetadata {
    pub fn new(item_count: usize, successful_item_count: usize, total_clicks: u64) -> Self {
        let avg_clicks_per_item = if item_count == 0 {
            0.0
        } else {
            total_clicks as f64 / item_count as f64
        };

        Self {
            trained_on: Utc::now(),
            item_count,
            successful_item_count,
            total_clicks,
            avg_clicks_per_item,
            recommendations: Vec::new(),
        }
    }
}

impl Recommendation {
    pub fn summary(&self) -> RecommendationSummary {
        RecommendationSummary {
            item_id: self.item.id.clone(),
            score: self.score,
            reasoning: self.reasoning.clone(),
        }
    }
}
