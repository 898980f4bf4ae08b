use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use model::entities::favorite;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tracing::{debug, info, instrument};

use super::recipes::{find_recipe, ShortRecipeResponse};
use crate::auth::AuthUser;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Add a recipe to the caller's favorites
#[utoipa::path(
    post,
    path = "/api/recipes/{recipe_id}/favorite",
    params(
        ("recipe_id" = i32, Path, description = "Recipe ID")
    ),
    responses(
        (status = 201, description = "Added to favorites", body = ApiResponse<ShortRecipeResponse>),
        (status = 400, description = "Already in favorites", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "recipes"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn add_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(recipe_id): Path<i32>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ShortRecipeResponse>>)> {
    let recipe = find_recipe(&state.db, recipe_id).await?;

    if favorite::Entity::find_by_id((auth.user.id, recipe.id))
        .one(&state.db)
        .await?
        .is_some()
    {
        debug!("Recipe {} already in favorites of {}", recipe.id, auth.user.id);
        return Err(ApiError::BadRequest("Recipe is already in favorites".to_string()));
    }

    let inserted = favorite::ActiveModel {
        user_id: Set(auth.user.id),
        recipe_id: Set(recipe.id),
    }
    .insert(&state.db)
    .await;
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::BadRequest("Recipe is already in favorites".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    info!("User {} favorited recipe {}", auth.user.id, recipe.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            ShortRecipeResponse::new(recipe, &state.settings.media_url),
            "Recipe added to favorites",
        )),
    ))
}

/// Remove a recipe from the caller's favorites
#[utoipa::path(
    delete,
    path = "/api/recipes/{recipe_id}/favorite",
    params(
        ("recipe_id" = i32, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Removed from favorites"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Recipe not found or not in favorites", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "recipes"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(recipe_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let recipe = find_recipe(&state.db, recipe_id).await?;

    let result = favorite::Entity::delete_by_id((auth.user.id, recipe.id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Favorite"));
    }

    info!("User {} removed recipe {} from favorites", auth.user.id, recipe.id);
    Ok(StatusCode::NO_CONTENT)
}
