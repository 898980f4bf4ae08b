use axum::{
    extract::{Path, State},
    response::Json,
};
use model::entities::tag;
use sea_orm::{EntityTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, CachedData, ErrorResponse};

const TAGS_CACHE_KEY: &str = "tags:all";

/// Tag representation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
    /// Hex color such as `#E26C2D`
    pub color: String,
    pub slug: String,
}

impl From<tag::Model> for TagResponse {
    fn from(model: tag::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            color: model.color,
            slug: model.slug,
        }
    }
}

/// List all tags
#[utoipa::path(
    get,
    path = "/api/tags",
    responses(
        (status = 200, description = "List of all tags", body = ApiResponse<Vec<TagResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "tags"
)]
#[instrument(skip(state))]
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Vec<TagResponse>>>> {
    if let Some(CachedData::Tags(tags)) = state.cache.get(TAGS_CACHE_KEY).await {
        trace!("Serving {} tags from cache", tags.len());
        return Ok(Json(ApiResponse::new(tags, "Tags retrieved successfully")));
    }

    debug!("Fetching all tags");
    let tags: Vec<TagResponse> = tag::Entity::find()
        .order_by_asc(tag::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(TagResponse::from)
        .collect();

    info!("Fetched {} tags", tags.len());
    state
        .cache
        .insert(TAGS_CACHE_KEY.to_string(), CachedData::Tags(tags.clone()))
        .await;

    Ok(Json(ApiResponse::new(tags, "Tags retrieved successfully")))
}

/// Get a tag by ID
#[utoipa::path(
    get,
    path = "/api/tags/{tag_id}",
    params(
        ("tag_id" = i32, Path, description = "Tag ID")
    ),
    responses(
        (status = 200, description = "Tag details", body = ApiResponse<TagResponse>),
        (status = 404, description = "Tag not found", body = ErrorResponse)
    ),
    tag = "tags"
)]
#[instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    Path(tag_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<TagResponse>>> {
    let tag = tag::Entity::find_by_id(tag_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Tag {} not found", tag_id);
            ApiError::NotFound("Tag")
        })?;

    Ok(Json(ApiResponse::new(
        TagResponse::from(tag),
        "Tag retrieved successfully",
    )))
}
