use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use model::entities::ingredient;
use sea_orm::{sea_query::LikeExpr, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, CachedData, ErrorResponse};

const LIKE_ESCAPE: char = '!';

/// `LIKE` pattern matching names that start with `prefix` literally.
fn prefix_pattern(prefix: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

/// Ingredient representation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngredientResponse {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

impl From<ingredient::Model> for IngredientResponse {
    fn from(model: ingredient::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            measurement_unit: model.measurement_unit,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct IngredientQuery {
    /// Name prefix to search for
    pub name: Option<String>,
}

/// List ingredients, optionally filtered by name prefix
#[utoipa::path(
    get,
    path = "/api/ingredients",
    params(IngredientQuery),
    responses(
        (status = 200, description = "Matching ingredients ordered by name", body = ApiResponse<Vec<IngredientResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "ingredients"
)]
#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> ApiResult<Json<ApiResponse<Vec<IngredientResponse>>>> {
    let prefix = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let cache_key = format!("ingredients:{}", prefix.unwrap_or_default());

    if let Some(CachedData::Ingredients(ingredients)) = state.cache.get(&cache_key).await {
        trace!("Serving {} ingredients from cache", ingredients.len());
        return Ok(Json(ApiResponse::new(
            ingredients,
            "Ingredients retrieved successfully",
        )));
    }

    debug!("Fetching ingredients with prefix {:?}", prefix);
    let mut select = ingredient::Entity::find();
    if let Some(prefix) = prefix {
        select = select.filter(ingredient::Column::Name.like(prefix_pattern(prefix)));
    }
    let ingredients: Vec<IngredientResponse> = select
        .order_by_asc(ingredient::Column::Name)
        .order_by_asc(ingredient::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(IngredientResponse::from)
        .collect();

    info!("Fetched {} ingredients", ingredients.len());
    state
        .cache
        .insert(cache_key, CachedData::Ingredients(ingredients.clone()))
        .await;

    Ok(Json(ApiResponse::new(
        ingredients,
        "Ingredients retrieved successfully",
    )))
}

/// Get an ingredient by ID
#[utoipa::path(
    get,
    path = "/api/ingredients/{ingredient_id}",
    params(
        ("ingredient_id" = i32, Path, description = "Ingredient ID")
    ),
    responses(
        (status = 200, description = "Ingredient details", body = ApiResponse<IngredientResponse>),
        (status = 404, description = "Ingredient not found", body = ErrorResponse)
    ),
    tag = "ingredients"
)]
#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(ingredient_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<IngredientResponse>>> {
    let ingredient = ingredient::Entity::find_by_id(ingredient_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Ingredient {} not found", ingredient_id);
            ApiError::NotFound("Ingredient")
        })?;

    Ok(Json(ApiResponse::new(
        IngredientResponse::from(ingredient),
        "Ingredient retrieved successfully",
    )))
}
