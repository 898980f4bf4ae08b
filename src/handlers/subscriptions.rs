use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use axum_valid::Valid;
use model::entities::{follow, recipe, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::recipes::ShortRecipeResponse;
use crate::auth::AuthUser;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::helpers::pagination::{fetch_page, PageParams};
use crate::schemas::{ApiResponse, AppState, ErrorResponse, Page};

/// A followed author together with their latest recipes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<ShortRecipeResponse>,
    /// Total number of recipes by this author
    pub recipes_count: u64,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct SubscriptionQuery {
    /// Page number, starting at 1
    #[validate(range(min = 1, max = 1000000))]
    pub page: Option<u64>,
    /// Authors per page
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Maximum number of recipes embedded per author
    pub recipes_limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct RecipesLimitQuery {
    /// Maximum number of recipes embedded in the response
    pub recipes_limit: Option<u64>,
}

/// Attach each author's recipes, newest first, truncated to `recipes_limit`.
async fn with_recipes<C: ConnectionTrait>(
    db: &C,
    media_url: &str,
    authors: Vec<user::Model>,
    recipes_limit: Option<u64>,
) -> ApiResult<Vec<SubscriptionResponse>> {
    let ids: Vec<i32> = authors.iter().map(|a| a.id).collect();
    let mut by_author: HashMap<i32, Vec<recipe::Model>> = HashMap::new();
    if !ids.is_empty() {
        for recipe in recipe::Entity::find()
            .filter(recipe::Column::AuthorId.is_in(ids))
            .order_by_desc(recipe::Column::PubDate)
            .order_by_desc(recipe::Column::Id)
            .all(db)
            .await?
        {
            by_author.entry(recipe.author_id).or_default().push(recipe);
        }
    }

    Ok(authors
        .into_iter()
        .map(|author| {
            let recipes = by_author.remove(&author.id).unwrap_or_default();
            let recipes_count = recipes.len() as u64;
            let shown = recipes_limit.map_or(recipes.len(), |limit| limit as usize);
            SubscriptionResponse {
                email: author.email,
                id: author.id,
                username: author.username,
                first_name: author.first_name,
                last_name: author.last_name,
                is_subscribed: true,
                recipes: recipes
                    .into_iter()
                    .take(shown)
                    .map(|r| ShortRecipeResponse::new(r, media_url))
                    .collect(),
                recipes_count,
            }
        })
        .collect())
}

/// List the authors the caller follows
#[utoipa::path(
    get,
    path = "/api/users/subscriptions",
    params(SubscriptionQuery),
    responses(
        (status = 200, description = "Page of followed authors", body = ApiResponse<Page<SubscriptionResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "subscriptions"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Valid(Query(query)), _): WithRejection<Valid<Query<SubscriptionQuery>>, ApiError>,
) -> ApiResult<Json<ApiResponse<Page<SubscriptionResponse>>>> {
    let params = PageParams::new(query.page, query.limit, state.settings.page_size);

    let followed = follow::Entity::find()
        .select_only()
        .column(follow::Column::FollowingId)
        .filter(follow::Column::UserId.eq(auth.user.id))
        .into_query();
    let select = user::Entity::find()
        .filter(user::Column::Id.in_subquery(followed))
        .order_by_asc(user::Column::Username)
        .order_by_asc(user::Column::Id);
    let (authors, count) = fetch_page(&state.db, select, params).await?;
    debug!("User {} follows {} authors", auth.user.id, count);

    let results = with_recipes(
        &state.db,
        &state.settings.media_url,
        authors,
        query.recipes_limit,
    )
    .await?;
    Ok(Json(ApiResponse::new(
        params.into_page(results, count),
        "Subscriptions retrieved successfully",
    )))
}

/// Follow an author
#[utoipa::path(
    post,
    path = "/api/users/{user_id}/subscribe",
    params(
        ("user_id" = i32, Path, description = "Author ID"),
        RecipesLimitQuery
    ),
    responses(
        (status = 201, description = "Subscribed", body = ApiResponse<SubscriptionResponse>),
        (status = 400, description = "Self-subscription or already subscribed", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Author not found", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "subscriptions"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn subscribe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(author_id): Path<i32>,
    WithRejection(Valid(Query(query)), _): WithRejection<Valid<Query<RecipesLimitQuery>>, ApiError>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SubscriptionResponse>>)> {
    let author = user::Entity::find_by_id(author_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Author {} not found", author_id);
            ApiError::NotFound("User")
        })?;

    if author.id == auth.user.id {
        warn!("User {} tried to subscribe to themselves", auth.user.id);
        return Err(ApiError::BadRequest("You cannot subscribe to yourself".to_string()));
    }

    let already = follow::Entity::find_by_id((auth.user.id, author.id))
        .one(&state.db)
        .await?
        .is_some();
    if already {
        return Err(ApiError::BadRequest(format!(
            "Already subscribed to {}",
            author.username
        )));
    }

    let inserted = follow::ActiveModel {
        user_id: Set(auth.user.id),
        following_id: Set(author.id),
    }
    .insert(&state.db)
    .await;
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::BadRequest(format!(
                "Already subscribed to {}",
                author.username
            )));
        }
        Err(e) => return Err(e.into()),
    }

    info!("User {} subscribed to {}", auth.user.id, author.id);
    let response = with_recipes(
        &state.db,
        &state.settings.media_url,
        vec![author],
        query.recipes_limit,
    )
    .await?
    .pop()
    .ok_or_else(|| ApiError::Internal("empty subscription batch".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(response, "Subscribed successfully")),
    ))
}

/// Stop following an author
#[utoipa::path(
    delete,
    path = "/api/users/{user_id}/subscribe",
    params(
        ("user_id" = i32, Path, description = "Author ID")
    ),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Author not found or not followed", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "subscriptions"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(author_id): Path<i32>,
) -> ApiResult<StatusCode> {
    if user::Entity::find_by_id(author_id).one(&state.db).await?.is_none() {
        warn!("Author {} not found", author_id);
        return Err(ApiError::NotFound("User"));
    }

    let result = follow::Entity::delete_by_id((auth.user.id, author_id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        debug!("User {} was not subscribed to {}", auth.user.id, author_id);
        return Err(ApiError::NotFound("Subscription"));
    }

    info!("User {} unsubscribed from {}", auth.user.id, author_id);
    Ok(StatusCode::NO_CONTENT)
}
