use std::collections::{BTreeMap, HashMap, HashSet};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::{Query, WithRejection};
use chrono::{DateTime, Utc};
use model::entities::{
    favorite, ingredient, recipe, recipe_ingredient, recipe_tag, shopping_cart, tag, user,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::tags::TagResponse;
use super::users::{followed_authors, UserResponse};
use crate::auth::{AuthUser, MaybeUser};
use crate::error::{ApiError, ApiResult};
use crate::helpers::images::{image_url, remove_image, save_image};
use crate::helpers::pagination::{fetch_page, PageParams};
use crate::schemas::{ApiResponse, AppState, ErrorResponse, Page};

/// One ingredient line in a recipe write request
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct RecipeIngredientInput {
    /// Ingredient ID
    pub id: i32,
    #[validate(range(min = 1, max = 32000))]
    pub amount: i32,
}

/// Request body for creating a recipe
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateRecipeRequest {
    #[validate(length(min = 1), nested)]
    pub ingredients: Vec<RecipeIngredientInput>,
    /// Tag IDs
    #[validate(length(min = 1))]
    pub tags: Vec<i32>,
    /// Base64 data URI, e.g. `data:image/png;base64,...`
    pub image: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1))]
    pub text: String,
    /// Minutes
    #[validate(range(min = 1, max = 32000))]
    pub cooking_time: i32,
}

/// Request body for a partial recipe update. Present `ingredients` and
/// `tags` replace the stored sets.
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateRecipeRequest {
    #[validate(length(min = 1), nested)]
    pub ingredients: Option<Vec<RecipeIngredientInput>>,
    #[validate(length(min = 1))]
    pub tags: Option<Vec<i32>>,
    pub image: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub text: Option<String>,
    #[validate(range(min = 1, max = 32000))]
    pub cooking_time: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeIngredientResponse {
    /// Ingredient ID
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Full recipe representation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeResponse {
    pub id: i32,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    /// Image URL
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// Compact representation used by favorites, the cart and subscriptions
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShortRecipeResponse {
    pub id: i32,
    pub name: String,
    /// Image URL
    pub image: String,
    pub cooking_time: i32,
}

impl ShortRecipeResponse {
    pub fn new(model: recipe::Model, media_url: &str) -> Self {
        Self {
            id: model.id,
            image: image_url(media_url, &model.image),
            name: model.name,
            cooking_time: model.cooking_time,
        }
    }
}

/// Recipe listing filters
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct RecipeListQuery {
    /// Page number, starting at 1
    #[validate(range(min = 1, max = 1000000))]
    pub page: Option<u64>,
    /// Items per page
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Only recipes by this author
    pub author: Option<i32>,
    /// Tag slugs; a recipe matches when it has any of them
    #[serde(default)]
    pub tags: Vec<String>,
    /// `1` or `true` to list only the caller's favorites
    pub is_favorited: Option<String>,
    /// `1` or `true` to list only recipes in the caller's cart
    pub is_in_shopping_cart: Option<String>,
}

fn flag_set(value: &Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1") | Some("true")
    )
}

/// Look up a recipe or fail with 404.
pub async fn find_recipe<C: ConnectionTrait>(db: &C, recipe_id: i32) -> ApiResult<recipe::Model> {
    recipe::Entity::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Recipe {} not found", recipe_id);
            ApiError::NotFound("Recipe")
        })
}

/// Which of `recipe_ids` the viewer has favorited and put in the cart.
async fn member_recipe_ids<C: ConnectionTrait>(
    db: &C,
    viewer: Option<i32>,
    recipe_ids: &[i32],
) -> ApiResult<(HashSet<i32>, HashSet<i32>)> {
    let Some(user_id) = viewer else {
        return Ok((HashSet::new(), HashSet::new()));
    };

    let favorites = favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .filter(favorite::Column::RecipeId.is_in(recipe_ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|f| f.recipe_id)
        .collect();
    let in_cart = shopping_cart::Entity::find()
        .filter(shopping_cart::Column::UserId.eq(user_id))
        .filter(shopping_cart::Column::RecipeId.is_in(recipe_ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.recipe_id)
        .collect();

    Ok((favorites, in_cart))
}

/// Build read representations for a batch of recipes with a fixed number
/// of queries regardless of batch size.
pub async fn build_recipe_responses<C: ConnectionTrait>(
    db: &C,
    media_url: &str,
    viewer: Option<i32>,
    recipes: Vec<recipe::Model>,
) -> ApiResult<Vec<RecipeResponse>> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }

    let recipe_ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<i32> = recipes
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let followed = followed_authors(db, viewer, &author_ids).await?;

    let mut tags: HashMap<i32, Vec<TagResponse>> = HashMap::new();
    for (link, tag) in recipe_tag::Entity::find()
        .filter(recipe_tag::Column::RecipeId.is_in(recipe_ids.iter().copied()))
        .order_by_asc(recipe_tag::Column::TagId)
        .find_also_related(tag::Entity)
        .all(db)
        .await?
    {
        if let Some(tag) = tag {
            tags.entry(link.recipe_id).or_default().push(TagResponse::from(tag));
        }
    }

    let mut ingredients: HashMap<i32, Vec<RecipeIngredientResponse>> = HashMap::new();
    for (line, ingredient) in recipe_ingredient::Entity::find()
        .filter(recipe_ingredient::Column::RecipeId.is_in(recipe_ids.iter().copied()))
        .order_by_asc(recipe_ingredient::Column::IngredientId)
        .find_also_related(ingredient::Entity)
        .all(db)
        .await?
    {
        if let Some(ingredient) = ingredient {
            ingredients
                .entry(line.recipe_id)
                .or_default()
                .push(RecipeIngredientResponse {
                    id: ingredient.id,
                    name: ingredient.name,
                    measurement_unit: ingredient.measurement_unit,
                    amount: line.amount,
                });
        }
    }

    let (favorites, in_cart) = member_recipe_ids(db, viewer, &recipe_ids).await?;

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                error!("Recipe {} references missing author {}", recipe.id, recipe.author_id);
                ApiError::Internal(format!("missing author for recipe {}", recipe.id))
            })?;
            Ok(RecipeResponse {
                id: recipe.id,
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                author: UserResponse::new(author, followed.contains(&recipe.author_id)),
                ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorites.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
                name: recipe.name,
                image: image_url(media_url, &recipe.image),
                text: recipe.text,
                cooking_time: recipe.cooking_time,
                pub_date: recipe.pub_date,
            })
        })
        .collect()
}

async fn build_one(
    state: &AppState,
    viewer: Option<i32>,
    recipe: recipe::Model,
) -> ApiResult<RecipeResponse> {
    build_recipe_responses(&state.db, &state.settings.media_url, viewer, vec![recipe])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("empty recipe batch".to_string()))
}

/// Checks the referenced ingredients and tags: no duplicates and no unknown
/// IDs. All problems are reported together.
async fn check_components<C: ConnectionTrait>(
    db: &C,
    ingredients: Option<&[RecipeIngredientInput]>,
    tags: Option<&[i32]>,
) -> ApiResult<()> {
    let mut problems: BTreeMap<String, Vec<String>> = BTreeMap::new();

    if let Some(ingredients) = ingredients {
        let ids: Vec<i32> = ingredients.iter().map(|i| i.id).collect();
        let existing = ingredient_ids_in(db, &ids).await?;
        if let Some(message) = id_problem(&ids, &existing, "ingredient") {
            problems.insert("ingredients".to_string(), vec![message]);
        }
    }
    if let Some(tags) = tags {
        let existing = tag_ids_in(db, tags).await?;
        if let Some(message) = id_problem(tags, &existing, "tag") {
            problems.insert("tags".to_string(), vec![message]);
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        debug!("Recipe components rejected: {:?}", problems);
        Err(ApiError::Validation(problems))
    }
}

fn id_problem(ids: &[i32], existing: &HashSet<i32>, kind: &str) -> Option<String> {
    let unique: HashSet<i32> = ids.iter().copied().collect();
    if unique.len() != ids.len() {
        return Some(format!("Each {} may be listed only once", kind));
    }

    let mut missing: Vec<i32> = unique.difference(existing).copied().collect();
    if missing.is_empty() {
        return None;
    }
    missing.sort_unstable();
    let listed: Vec<String> = missing.iter().map(i32::to_string).collect();
    Some(format!("Unknown {} ids: {}", kind, listed.join(", ")))
}

async fn ingredient_ids_in<C: ConnectionTrait>(db: &C, ids: &[i32]) -> ApiResult<HashSet<i32>> {
    Ok(ingredient::Entity::find()
        .filter(ingredient::Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect())
}

async fn tag_ids_in<C: ConnectionTrait>(db: &C, ids: &[i32]) -> ApiResult<HashSet<i32>> {
    Ok(tag::Entity::find()
        .filter(tag::Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect())
}

async fn replace_ingredients<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    ingredients: &[RecipeIngredientInput],
) -> ApiResult<()> {
    recipe_ingredient::Entity::delete_many()
        .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
        .exec(db)
        .await?;
    if ingredients.is_empty() {
        return Ok(());
    }

    recipe_ingredient::Entity::insert_many(ingredients.iter().map(|line| {
        recipe_ingredient::ActiveModel {
            recipe_id: Set(recipe_id),
            ingredient_id: Set(line.id),
            amount: Set(line.amount),
        }
    }))
    .exec_without_returning(db)
    .await?;
    Ok(())
}

async fn replace_tags<C: ConnectionTrait>(db: &C, recipe_id: i32, tags: &[i32]) -> ApiResult<()> {
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(db)
        .await?;
    if tags.is_empty() {
        return Ok(());
    }

    recipe_tag::Entity::insert_many(tags.iter().map(|tag_id| recipe_tag::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(*tag_id),
    }))
    .exec_without_returning(db)
    .await?;
    Ok(())
}

/// List recipes, newest first
#[utoipa::path(
    get,
    path = "/api/recipes",
    params(RecipeListQuery),
    responses(
        (status = 200, description = "Page of recipes", body = ApiResponse<Page<RecipeResponse>>),
        (status = 400, description = "Invalid filter or pagination parameters", body = ErrorResponse)
    ),
    tag = "recipes"
)]
#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: MaybeUser,
    WithRejection(Query(query), _): WithRejection<Query<RecipeListQuery>, ApiError>,
) -> ApiResult<Json<ApiResponse<Page<RecipeResponse>>>> {
    query.validate()?;
    let params = PageParams::new(query.page, query.limit, state.settings.page_size);
    let only_favorites = flag_set(&query.is_favorited);
    let only_cart = flag_set(&query.is_in_shopping_cart);

    let mut select = recipe::Entity::find();
    if let Some(author_id) = query.author {
        select = select.filter(recipe::Column::AuthorId.eq(author_id));
    }
    if !query.tags.is_empty() {
        let tagged = recipe_tag::Entity::find()
            .select_only()
            .column(recipe_tag::Column::RecipeId)
            .inner_join(tag::Entity)
            .filter(tag::Column::Slug.is_in(query.tags.iter().cloned()))
            .into_query();
        select = select.filter(recipe::Column::Id.in_subquery(tagged));
    }
    if only_favorites || only_cart {
        let Some(user_id) = viewer.id() else {
            debug!("Anonymous caller asked for a personal filter, returning empty page");
            return Ok(Json(ApiResponse::new(
                params.into_page(Vec::new(), 0),
                "Recipes retrieved successfully",
            )));
        };
        if only_favorites {
            let favorites = favorite::Entity::find()
                .select_only()
                .column(favorite::Column::RecipeId)
                .filter(favorite::Column::UserId.eq(user_id))
                .into_query();
            select = select.filter(recipe::Column::Id.in_subquery(favorites));
        }
        if only_cart {
            let cart = shopping_cart::Entity::find()
                .select_only()
                .column(shopping_cart::Column::RecipeId)
                .filter(shopping_cart::Column::UserId.eq(user_id))
                .into_query();
            select = select.filter(recipe::Column::Id.in_subquery(cart));
        }
    }

    let select = select
        .order_by_desc(recipe::Column::PubDate)
        .order_by_desc(recipe::Column::Id);
    let (recipes, count) = fetch_page(&state.db, select, params).await?;
    trace!("Fetched {} of {} recipes", recipes.len(), count);

    let results =
        build_recipe_responses(&state.db, &state.settings.media_url, viewer.id(), recipes).await?;
    Ok(Json(ApiResponse::new(
        params.into_page(results, count),
        "Recipes retrieved successfully",
    )))
}

/// Publish a recipe
#[utoipa::path(
    post,
    path = "/api/recipes",
    request_body = CreateRecipeRequest,
    responses(
        (status = 201, description = "Recipe created", body = ApiResponse<RecipeResponse>),
        (status = 400, description = "Invalid recipe", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "recipes"
)]
#[instrument(skip(state, auth, request), fields(user_id = auth.user.id))]
pub async fn create_recipe(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Json(request), _): WithRejection<Json<CreateRecipeRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<ApiResponse<RecipeResponse>>)> {
    debug!("Creating recipe '{}'", request.name);
    request.validate()?;
    check_components(&state.db, Some(&request.ingredients), Some(&request.tags)).await?;

    let image = save_image(&state.settings.media_root, &request.image).await?;

    let stored = async {
        let txn = state.db.begin().await?;
        let recipe = recipe::ActiveModel {
            author_id: Set(auth.user.id),
            name: Set(request.name.clone()),
            image: Set(image.clone()),
            text: Set(request.text.clone()),
            cooking_time: Set(request.cooking_time),
            pub_date: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        replace_ingredients(&txn, recipe.id, &request.ingredients).await?;
        replace_tags(&txn, recipe.id, &request.tags).await?;
        txn.commit().await?;
        Ok::<_, ApiError>(recipe)
    }
    .await;

    let recipe = match stored {
        Ok(recipe) => recipe,
        Err(e) => {
            remove_image(&state.settings.media_root, &image).await;
            return Err(e);
        }
    };

    info!("Recipe {} created by user {}", recipe.id, auth.user.id);
    let response = build_one(&state, Some(auth.user.id), recipe).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(response, "Recipe created successfully")),
    ))
}

/// Get a recipe by ID
#[utoipa::path(
    get,
    path = "/api/recipes/{recipe_id}",
    params(
        ("recipe_id" = i32, Path, description = "Recipe ID")
    ),
    responses(
        (status = 200, description = "Recipe details", body = ApiResponse<RecipeResponse>),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    tag = "recipes"
)]
#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(recipe_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<RecipeResponse>>> {
    let recipe = find_recipe(&state.db, recipe_id).await?;
    let response = build_one(&state, viewer.id(), recipe).await?;
    Ok(Json(ApiResponse::new(response, "Recipe retrieved successfully")))
}

/// Partially update a recipe (author only)
#[utoipa::path(
    patch,
    path = "/api/recipes/{recipe_id}",
    params(
        ("recipe_id" = i32, Path, description = "Recipe ID")
    ),
    request_body = UpdateRecipeRequest,
    responses(
        (status = 200, description = "Recipe updated", body = ApiResponse<RecipeResponse>),
        (status = 400, description = "Invalid recipe", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Caller is not the author", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "recipes"
)]
#[instrument(skip(state, auth, request), fields(user_id = auth.user.id))]
pub async fn update_recipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(recipe_id): Path<i32>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateRecipeRequest>, ApiError>,
) -> ApiResult<Json<ApiResponse<RecipeResponse>>> {
    let existing = find_recipe(&state.db, recipe_id).await?;
    if existing.author_id != auth.user.id {
        warn!("User {} may not edit recipe {}", auth.user.id, recipe_id);
        return Err(ApiError::PermissionDenied);
    }

    request.validate()?;
    check_components(&state.db, request.ingredients.as_deref(), request.tags.as_deref()).await?;

    let new_image = match &request.image {
        Some(data) => Some(save_image(&state.settings.media_root, data).await?),
        None => None,
    };
    let old_image = existing.image.clone();

    let stored = async {
        let txn = state.db.begin().await?;
        let mut active: recipe::ActiveModel = existing.into();
        if let Some(name) = &request.name {
            active.name = Set(name.clone());
        }
        if let Some(text) = &request.text {
            active.text = Set(text.clone());
        }
        if let Some(cooking_time) = request.cooking_time {
            active.cooking_time = Set(cooking_time);
        }
        if let Some(image) = &new_image {
            active.image = Set(image.clone());
        }
        let recipe = active.update(&txn).await?;

        if let Some(ingredients) = &request.ingredients {
            replace_ingredients(&txn, recipe.id, ingredients).await?;
        }
        if let Some(tags) = &request.tags {
            replace_tags(&txn, recipe.id, tags).await?;
        }
        txn.commit().await?;
        Ok::<_, ApiError>(recipe)
    }
    .await;

    let recipe = match stored {
        Ok(recipe) => recipe,
        Err(e) => {
            if let Some(image) = &new_image {
                remove_image(&state.settings.media_root, image).await;
            }
            return Err(e);
        }
    };
    if new_image.is_some() {
        remove_image(&state.settings.media_root, &old_image).await;
    }

    info!("Recipe {} updated", recipe.id);
    let response = build_one(&state, Some(auth.user.id), recipe).await?;
    Ok(Json(ApiResponse::new(response, "Recipe updated successfully")))
}

/// Delete a recipe (author only)
#[utoipa::path(
    delete,
    path = "/api/recipes/{recipe_id}",
    params(
        ("recipe_id" = i32, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Caller is not the author", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "recipes"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(recipe_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let recipe = find_recipe(&state.db, recipe_id).await?;
    if recipe.author_id != auth.user.id {
        warn!("User {} may not delete recipe {}", auth.user.id, recipe_id);
        return Err(ApiError::PermissionDenied);
    }

    recipe::Entity::delete_by_id(recipe.id).exec(&state.db).await?;
    remove_image(&state.settings.media_root, &recipe.image).await;

    info!("Recipe {} deleted", recipe_id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert!(flag_set(&Some("1".to_string())));
        assert!(flag_set(&Some("True".to_string())));
        assert!(!flag_set(&Some("0".to_string())));
        assert!(!flag_set(&None));
    }

    #[test]
    fn test_id_problems() {
        let existing: HashSet<i32> = [1, 2, 3].into_iter().collect();
        assert_eq!(id_problem(&[1, 2], &existing, "tag"), None);
        assert_eq!(
            id_problem(&[1, 1], &existing, "tag"),
            Some("Each tag may be listed only once".to_string())
        );
        assert_eq!(
            id_problem(&[9, 1, 7], &existing, "ingredient"),
            Some("Unknown ingredient ids: 7, 9".to_string())
        );
    }
}
