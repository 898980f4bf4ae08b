use crate::handlers::{
    auth::{login, logout},
    favorites::{add_favorite, remove_favorite},
    health::health_check,
    ingredients::{get_ingredient, list_ingredients},
    recipes::{create_recipe, delete_recipe, get_recipe, list_recipes, update_recipe},
    shopping_cart::{add_to_shopping_cart, download_shopping_cart, remove_from_shopping_cart},
    subscriptions::{list_subscriptions, subscribe, unsubscribe},
    tags::{get_tag, list_tags},
    users::{create_user, get_user, list_users, me, set_password},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::{Layer, ServiceBuilder};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, normalize_path::NormalizePathLayer,
    services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Upper bound for request bodies; recipe images travel inline as base64.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let settings = state.settings.clone();

    let api = Router::new()
        // Token auth
        .route("/auth/token/login", post(login))
        .route("/auth/token/logout", post(logout))
        // Users and subscriptions
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(me))
        .route("/users/set_password", post(set_password))
        .route("/users/subscriptions", get(list_subscriptions))
        .route("/users/:user_id", get(get_user))
        .route("/users/:user_id/subscribe", post(subscribe).delete(unsubscribe))
        // Read-only catalog
        .route("/tags", get(list_tags))
        .route("/tags/:tag_id", get(get_tag))
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:ingredient_id", get(get_ingredient))
        // Recipes
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/download_shopping_cart", get(download_shopping_cart))
        .route(
            "/recipes/:recipe_id",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:recipe_id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/recipes/:recipe_id/shopping_cart",
            post(add_to_shopping_cart).delete(remove_from_shopping_cart),
        );

    // Clients address API routes with and without a trailing slash. The path
    // has to be rewritten before routing, so the layer wraps the whole subtree.
    let api = NormalizePathLayer::trim_trailing_slash().layer(api.with_state(state.clone()));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest_service("/api", api)
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    if settings.media_url.starts_with('/') && settings.media_url.len() > 1 {
        router = router.nest_service(
            settings.media_url.trim_end_matches('/'),
            ServeDir::new(&settings.media_root),
        );
    } else {
        warn!("media_url {:?} is not an absolute path, media will not be served", settings.media_url);
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(settings.request_timeout_secs)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
