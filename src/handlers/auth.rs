use axum::{extract::State, http::StatusCode, response::Json};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use model::entities::{auth_token, user};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::auth::{generate_token, hash_token, verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Credentials for obtaining a token
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued token. Only its digest is stored server side.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TokenResponse {
    pub auth_token: String,
}

/// Exchange email and password for an API token
#[utoipa::path(
    post,
    path = "/api/auth/token/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<Json<ApiResponse<TokenResponse>>> {
    debug!("Login attempt for {}", request.email);

    let found = user::Entity::find()
        .filter(user::Column::Email.eq(request.email.trim().to_lowercase()))
        .one(&state.db)
        .await?;

    let user = match found {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => {
            warn!("Rejected login for {}", request.email);
            return Err(ApiError::BadRequest(
                "Unable to log in with provided credentials".to_string(),
            ));
        }
    };

    let token = generate_token();
    auth_token::ActiveModel {
        key: Set(hash_token(&token)),
        user_id: Set(user.id),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    info!("Issued token for user {}", user.id);
    Ok(Json(ApiResponse::new(
        TokenResponse { auth_token: token },
        "Logged in successfully",
    )))
}

/// Revoke the token used for this request
#[utoipa::path(
    post,
    path = "/api/auth/token/logout",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "auth"
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> ApiResult<StatusCode> {
    auth_token::Entity::delete_by_id(auth.token_key)
        .exec(&state.db)
        .await?;

    info!("Revoked token for user {}", auth.user.id);
    Ok(StatusCode::NO_CONTENT)
}
