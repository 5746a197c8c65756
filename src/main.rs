use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use clickrank::services::catalog::CatalogStore;
use clickrank::{init_tracing, AppState, Config, RecommenderError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

struct ApiError(RecommenderError);

impl From<RecommenderError> for ApiError {
    fn from(err: RecommenderError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }

        (status, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
struct GeneratedRecommendationRequest {
    generated_text: String,
    candidate_item_ids: Vec<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GenerateRecommendationRequest {
    user_context: String,
    candidate_item_ids: Vec<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SimilarItemsRequest {
    #[serde(default)]
    candidate_item_ids: Vec<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct InteractionRequest {
    user_id: String,
    item_id: String,
    interaction_type: clickrank::InteractionType,
    timestamp: Option<DateTime<Utc>>,
    metadata: Option<serde_json::Value>,
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HashMap<String, String>>> {
    let mut status = HashMap::new();
    status.insert("status".to_string(), "healthy".to_string());
    status.insert("service".to_string(), "clickrank".to_string());
    status.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());
    status.insert(
        "active_model".to_string(),
        state
            .model_store
            .active_version()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string()),
    );

    Json(ApiResponse::success(status))
}

async fn upsert_item(
    State(state): State<AppState>,
    Json(upsert): Json<clickrank::ItemUpsert>,
) -> ApiResult<clickrank::Item> {
    let item = state.catalog.upsert_item(upsert.into()).await?;
    Ok(Json(ApiResponse::success(item)))
}

async fn list_items(State(state): State<AppState>) -> Json<ApiResponse<Vec<clickrank::ItemListing>>> {
    Json(ApiResponse::success(state.recommendation_service.list_items().await))
}

async fn similar_items(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(request): Json<SimilarItemsRequest>,
) -> ApiResult<clickrank::RecommendationResponse> {
    let response = state
        .recommendation_service
        .similar_items(&item_id, &request.candidate_item_ids, request.limit)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> ApiResult<clickrank::Item> {
    let item = state
        .catalog
        .get_item(&item_id)
        .await
        .ok_or(RecommenderError::ItemNotFound(item_id))?;
    Ok(Json(ApiResponse::success(item)))
}

async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<clickrank::RecommendationRequest>,
) -> ApiResult<clickrank::RecommendationResponse> {
    let response = state.recommendation_service.recommend(&request).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn recommend_generated(
    State(state): State<AppState>,
    Json(request): Json<GeneratedRecommendationRequest>,
) -> ApiResult<clickrank::RecommendationResponse> {
    let response = state
        .recommendation_service
        .recommend_from_text(&request.generated_text, &request.candidate_item_ids, request.limit)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn recommend_with_generator(
    State(state): State<AppState>,
    Json(request): Json<GenerateRecommendationRequest>,
) -> ApiResult<clickrank::RecommendationResponse> {
    let response = state
        .recommendation_service
        .recommend_with_generator(&request.user_context, &request.candidate_item_ids, request.limit)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn record_interaction(
    State(state): State<AppState>,
    Json(request): Json<InteractionRequest>,
) -> ApiResult<clickrank::InteractionAck> {
    let mut interaction =
        clickrank::Interaction::new(request.user_id, request.item_id, request.interaction_type);
    if let Some(timestamp) = request.timestamp {
        interaction = interaction.at(timestamp);
    }
    if let Some(metadata) = request.metadata {
        interaction = interaction.with_metadata(metadata);
    }

    let ack = state.interaction_recorder.record(interaction).await?;
    Ok(Json(ApiResponse::success(ack)))
}

async fn train_model(State(state): State<AppState>) -> ApiResult<clickrank::Model> {
    let model = state.training_service.train_and_commit().await?;
    Ok(Json(ApiResponse::success(model)))
}

async fn list_models(State(state): State<AppState>) -> Json<ApiResponse<Vec<clickrank::Model>>> {
    Json(ApiResponse::success(state.training_service.list_versions().await))
}

async fn active_model(State(state): State<AppState>) -> ApiResult<clickrank::Model> {
    let model = state
        .training_service
        .active_model()
        .await
        .ok_or(RecommenderError::NoActiveModel)?;
    Ok(Json(ApiResponse::success(model)))
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/items", get(list_items).post(upsert_item))
        .route("/items/:item_id", get(get_item))
        .route("/items/:item_id/similar", post(similar_items))
        .route("/recommendations", post(recommend))
        .route("/recommendations/generated", post(recommend_generated))
        .route("/recommendations/generate", post(recommend_with_generator))
        .route("/interactions", post(record_interaction))
        .route("/models/train", post(train_model))
        .route("/models", get(list_models))
        .route("/models/active", get(active_model))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.server.socket_addr()?;
    let state = AppState::new(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let path = std::env::var("CLICKRANK_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let config = Config::load(&path)?;
    info!("Starting ClickRank server with config: {:?}", config.server);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()?
        .block_on(serve(config))
}
