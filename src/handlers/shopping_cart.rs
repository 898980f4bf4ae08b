use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use compute::{aggregate_shopping_list, render_shopping_list};
use model::entities::shopping_cart;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tracing::{debug, info, instrument};

use super::recipes::{find_recipe, ShortRecipeResponse};
use crate::auth::AuthUser;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

/// Put a recipe into the caller's shopping cart
#[utoipa::path(
    post,
    path = "/api/recipes/{recipe_id}/shopping_cart",
    params(
        ("recipe_id" = i32, Path, description = "Recipe ID")
    ),
    responses(
        (status = 201, description = "Added to the shopping cart", body = ApiResponse<ShortRecipeResponse>),
        (status = 400, description = "Already in the shopping cart", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "recipes"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn add_to_shopping_cart(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(recipe_id): Path<i32>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ShortRecipeResponse>>)> {
    let recipe = find_recipe(&state.db, recipe_id).await?;

    if shopping_cart::Entity::find_by_id((auth.user.id, recipe.id))
        .one(&state.db)
        .await?
        .is_some()
    {
        debug!("Recipe {} already in cart of {}", recipe.id, auth.user.id);
        return Err(ApiError::BadRequest(
            "Recipe is already in the shopping cart".to_string(),
        ));
    }

    let inserted = shopping_cart::ActiveModel {
        user_id: Set(auth.user.id),
        recipe_id: Set(recipe.id),
    }
    .insert(&state.db)
    .await;
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::BadRequest(
                "Recipe is already in the shopping cart".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    info!("User {} put recipe {} into the cart", auth.user.id, recipe.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            ShortRecipeResponse::new(recipe, &state.settings.media_url),
            "Recipe added to the shopping cart",
        )),
    ))
}

/// Take a recipe out of the caller's shopping cart
#[utoipa::path(
    delete,
    path = "/api/recipes/{recipe_id}/shopping_cart",
    params(
        ("recipe_id" = i32, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Removed from the shopping cart"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Recipe not found or not in the cart", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "recipes"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn remove_from_shopping_cart(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(recipe_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let recipe = find_recipe(&state.db, recipe_id).await?;

    let result = shopping_cart::Entity::delete_by_id((auth.user.id, recipe.id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Shopping cart entry"));
    }

    info!("User {} removed recipe {} from the cart", auth.user.id, recipe.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Download the aggregated ingredient list for the cart as plain text
#[utoipa::path(
    get,
    path = "/api/recipes/download_shopping_cart",
    responses(
        (status = 200, description = "One `name (unit) - total` line per ingredient", body = String, content_type = "text/plain"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "recipes"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Response> {
    let items = aggregate_shopping_list(&state.db, auth.user.id).await?;
    info!("Exporting {} shopping list lines for user {}", items.len(), auth.user.id);

    let body = render_shopping_list(&items);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", SHOPPING_LIST_FILENAME),
            ),
        ],
        body,
    )
        .into_response())
}
