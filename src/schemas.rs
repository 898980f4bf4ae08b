use std::collections::BTreeMap;
use std::sync::Arc;

use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::config::Settings;
use crate::handlers::{
    auth::{LoginRequest, TokenResponse},
    ingredients::IngredientResponse,
    recipes::{
        CreateRecipeRequest, RecipeIngredientInput, RecipeIngredientResponse,
        RecipeResponse, ShortRecipeResponse, UpdateRecipeRequest,
    },
    subscriptions::SubscriptionResponse,
    tags::TagResponse,
    users::{CreateUserRequest, SetPasswordRequest, UserResponse},
};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache for the read-only catalog listings
    pub cache: Cache<String, CachedData>,
    /// Runtime configuration
    pub settings: Arc<Settings>,
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    Tags(Vec<TagResponse>),
    Ingredients(Vec<IngredientResponse>),
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Per-field validation messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

/// One page of a paginated listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    /// Total number of items across all pages
    pub count: u64,
    /// Next page number, if any
    pub next: Option<u64>,
    /// Previous page number, if any
    pub previous: Option<u64>,
    pub results: Vec<T>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Registers the `Authorization: Token <key>` scheme.
struct TokenAuthAddon;

impl Modify for TokenAuthAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token_auth",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Token <key> as returned by /api/auth/token/login",
                ))),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::me,
        crate::handlers::users::set_password,
        crate::handlers::subscriptions::list_subscriptions,
        crate::handlers::subscriptions::subscribe,
        crate::handlers::subscriptions::unsubscribe,
        crate::handlers::tags::list_tags,
        crate::handlers::tags::get_tag,
        crate::handlers::ingredients::list_ingredients,
        crate::handlers::ingredients::get_ingredient,
        crate::handlers::recipes::list_recipes,
        crate::handlers::recipes::create_recipe,
        crate::handlers::recipes::get_recipe,
        crate::handlers::recipes::update_recipe,
        crate::handlers::recipes::delete_recipe,
        crate::handlers::favorites::add_favorite,
        crate::handlers::favorites::remove_favorite,
        crate::handlers::shopping_cart::add_to_shopping_cart,
        crate::handlers::shopping_cart::remove_from_shopping_cart,
        crate::handlers::shopping_cart::download_shopping_cart,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            LoginRequest,
            TokenResponse,
            CreateUserRequest,
            SetPasswordRequest,
            UserResponse,
            SubscriptionResponse,
            TagResponse,
            IngredientResponse,
            CreateRecipeRequest,
            UpdateRecipeRequest,
            RecipeIngredientInput,
            RecipeIngredientResponse,
            RecipeResponse,
            ShortRecipeResponse,
        )
    ),
    modifiers(&TokenAuthAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Token login and logout"),
        (name = "users", description = "Registration, profiles and passwords"),
        (name = "subscriptions", description = "Following other authors"),
        (name = "tags", description = "Read-only recipe tags"),
        (name = "ingredients", description = "Read-only ingredient catalog"),
        (name = "recipes", description = "Recipes, favorites and the shopping cart"),
    ),
    info(
        title = "Foodgram API",
        description = "Recipe sharing backend: recipes, subscriptions, favorites and shopping lists",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
