use std::collections::{BTreeMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use axum_valid::Valid;
use chrono::Utc;
use model::entities::{follow, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{hash_password, verify_password, AuthUser, MaybeUser};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::helpers::pagination::{fetch_page, PaginationQuery};
use crate::schemas::{ApiResponse, AppState, ErrorResponse, Page};

/// Registration request
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email, length(max = 254))]
    pub email: String,
    /// Letters, digits and `@ . + - _` only
    #[validate(length(min = 1, max = 150), custom(function = "common::validate_username"))]
    pub username: String,
    #[validate(length(min = 1, max = 150))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150))]
    pub last_name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Password change request
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct SetPasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// User representation. `is_subscribed` is relative to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserResponse {
    pub fn new(model: user::Model, is_subscribed: bool) -> Self {
        Self {
            email: model.email,
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            is_subscribed,
        }
    }
}

/// Of the given authors, the ones `viewer` follows.
pub async fn followed_authors<C: ConnectionTrait>(
    db: &C,
    viewer: Option<i32>,
    author_ids: &[i32],
) -> ApiResult<HashSet<i32>> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let follows = follow::Entity::find()
        .filter(follow::Column::UserId.eq(viewer))
        .filter(follow::Column::FollowingId.is_in(author_ids.iter().copied()))
        .all(db)
        .await?;
    Ok(follows.into_iter().map(|f| f.following_id).collect())
}

/// List users ordered by username
#[utoipa::path(
    get,
    path = "/api/users",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Page of users", body = ApiResponse<Page<UserResponse>>),
        (status = 400, description = "Invalid pagination parameters", body = ErrorResponse)
    ),
    tag = "users"
)]
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    WithRejection(Valid(Query(query)), _): WithRejection<Valid<Query<PaginationQuery>>, ApiError>,
) -> ApiResult<Json<ApiResponse<Page<UserResponse>>>> {
    let params = query.resolve(state.settings.page_size);
    debug!("Listing users, page {} of size {}", params.page, params.limit);

    let select = user::Entity::find()
        .order_by_asc(user::Column::Username)
        .order_by_asc(user::Column::Id);
    let (users, count) = fetch_page(&state.db, select, params).await?;

    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    let followed = followed_authors(&state.db, viewer.id(), &ids).await?;
    let results = users
        .into_iter()
        .map(|u| {
            let subscribed = followed.contains(&u.id);
            UserResponse::new(u, subscribed)
        })
        .collect();

    trace!("Returning {} of {} users", ids.len(), count);
    Ok(Json(ApiResponse::new(
        params.into_page(results, count),
        "Users retrieved successfully",
    )))
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request or email/username taken", body = ErrorResponse)
    ),
    tag = "users"
)]
#[instrument(skip(state, request))]
pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateUserRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    debug!("Registering user with username: {}", request.username);
    request.validate()?;

    let email = request.email.trim().to_lowercase();
    let mut taken = BTreeMap::new();
    if user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&state.db)
        .await?
        .is_some()
    {
        taken.insert("email".to_string(), vec!["A user with that email already exists".to_string()]);
    }
    if user::Entity::find()
        .filter(user::Column::Username.eq(request.username.as_str()))
        .one(&state.db)
        .await?
        .is_some()
    {
        taken.insert(
            "username".to_string(),
            vec!["A user with that username already exists".to_string()],
        );
    }
    if !taken.is_empty() {
        warn!("Registration rejected, taken fields: {:?}", taken.keys());
        return Err(ApiError::Validation(taken));
    }

    let password_hash = hash_password(&request.password).map_err(|e| {
        error!("Password hashing failed: {}", e);
        ApiError::Internal("password hashing failed".to_string())
    })?;

    let new_user = user::ActiveModel {
        email: Set(email),
        username: Set(request.username),
        first_name: Set(request.first_name),
        last_name: Set(request.last_name),
        password_hash: Set(password_hash),
        date_joined: Set(Utc::now()),
        ..Default::default()
    };

    match new_user.insert(&state.db).await {
        Ok(user_model) => {
            info!(
                "User created successfully with ID: {}, username: {}",
                user_model.id, user_model.username
            );
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::new(
                    UserResponse::new(user_model, false),
                    "User created successfully",
                )),
            ))
        }
        Err(e) if is_unique_violation(&e) => {
            warn!("Concurrent registration hit a unique constraint: {}", e);
            Err(ApiError::BadRequest(
                "A user with that email or username already exists".to_string(),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "users"
)]
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let user = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("User {} not found", user_id);
            ApiError::NotFound("User")
        })?;

    let subscribed = followed_authors(&state.db, viewer.id(), &[user.id])
        .await?
        .contains(&user.id);

    Ok(Json(ApiResponse::new(
        UserResponse::new(user, subscribed),
        "User retrieved successfully",
    )))
}

/// Current user profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Authenticated user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "users"
)]
#[instrument(skip(auth), fields(user_id = auth.user.id))]
pub async fn me(auth: AuthUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::new(
        UserResponse::new(auth.user, false),
        "User retrieved successfully",
    ))
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/api/users/set_password",
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or invalid new password", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "users"
)]
#[instrument(skip(state, auth, request), fields(user_id = auth.user.id))]
pub async fn set_password(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Json(request), _): WithRejection<Json<SetPasswordRequest>, ApiError>,
) -> ApiResult<StatusCode> {
    request.validate()?;

    if !verify_password(&request.current_password, &auth.user.password_hash) {
        warn!("Wrong current password for user {}", auth.user.id);
        return Err(ApiError::field("current_password", "Invalid password"));
    }

    let password_hash = hash_password(&request.new_password).map_err(|e| {
        error!("Password hashing failed: {}", e);
        ApiError::Internal("password hashing failed".to_string())
    })?;

    let user_id = auth.user.id;
    let mut active: user::ActiveModel = auth.user.into();
    active.password_hash = Set(password_hash);
    active.update(&state.db).await?;

    info!("Password changed for user {}", user_id);
    Ok(StatusCode::NO_CONTENT)
}
