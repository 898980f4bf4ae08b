use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use model::entities::{auth_token, user};
use sea_orm::EntityTrait;
use tracing::{debug, trace};

use super::crypto::hash_token;
use crate::error::ApiError;
use crate::schemas::AppState;

/// The authenticated caller. Rejects with 401 when no valid token is sent.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: user::Model,
    /// Stored digest of the presented token, used to revoke it on logout.
    pub token_key: String,
}

/// Caller on routes open to anonymous users. A missing header yields `None`;
/// a malformed or unknown token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<user::Model>);

impl MaybeUser {
    pub fn id(&self) -> Option<i32> {
        self.0.as_ref().map(|user| user.id)
    }
}

/// Pulls the raw token from `Authorization: Token <key>` or `Bearer <key>`.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ApiError::InvalidToken)?;

    value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Some)
        .ok_or(ApiError::InvalidToken)
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, ApiError> {
    let Some(token) = bearer_token(parts)? else {
        trace!("No Authorization header present");
        return Ok(None);
    };

    let token_key = hash_token(token);
    let found = auth_token::Entity::find_by_id(token_key.clone())
        .find_also_related(user::Entity)
        .one(&state.db)
        .await?;

    match found {
        Some((_, Some(user))) => {
            trace!("Resolved token for user {}", user.id);
            Ok(Some(AuthUser { user, token_key }))
        }
        _ => {
            debug!("Rejected unknown token");
            Err(ApiError::InvalidToken)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await?.ok_or(ApiError::NotAuthenticated)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = resolve(parts, state).await?;
        Ok(MaybeUser(auth.map(|auth| auth.user)))
    }
}
