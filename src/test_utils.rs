use crate::config::{build_app_state, Settings};
use crate::router::create_router;
use crate::schemas::{ApiResponse, AppState};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use model::entities::{ingredient, tag};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::{json, Value};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const PASSWORD: &str = "correct-horse-battery";

/// 1x1 transparent PNG as a data URI
pub const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Settings pointing at a throwaway media directory
pub fn test_settings() -> Settings {
    Settings {
        database_url: "sqlite::memory:".to_string(),
        media_root: std::env::temp_dir().join(format!("foodgram-test-{}", uuid::Uuid::new_v4())),
        ..Settings::default()
    }
}

/// Create AppState for testing
pub async fn setup_test_app_state() -> AppState {
    build_app_state(setup_test_db().await, test_settings())
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level is taken from RUST_LOG and defaults to WARN. The subscriber
/// stays installed for as long as the returned guard lives.
pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| match level.to_uppercase().as_str() {
            "ERROR" => Some(Level::ERROR),
            "WARN" => Some(Level::WARN),
            "INFO" => Some(Level::INFO),
            "DEBUG" => Some(Level::DEBUG),
            "TRACE" => Some(Level::TRACE),
            _ => None,
        })
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// A running test server plus direct access to its state for seeding.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    _tracing: tracing::subscriber::DefaultGuard,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.state.settings.media_root);
    }
}

/// Create the axum app for testing
pub async fn setup_test_app() -> TestApp {
    let tracing = init_test_tracing();
    let state = setup_test_app_state().await;
    let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");

    TestApp {
        server,
        state,
        _tracing: tracing,
    }
}

pub fn auth_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Token {}", token)).expect("valid header"),
    )
}

impl TestApp {
    /// Register `username` with the shared test password and return the new user ID.
    pub async fn register(&self, username: &str) -> i32 {
        let response = self
            .server
            .post("/api/users")
            .json(&json!({
                "email": format!("{}@example.com", username),
                "username": username,
                "first_name": "Test",
                "last_name": "Cook",
                "password": PASSWORD,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        body.data["id"].as_i64().expect("user id") as i32
    }

    pub async fn login(&self, username: &str) -> String {
        let response = self
            .server
            .post("/api/auth/token/login")
            .json(&json!({
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
            }))
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        body.data["auth_token"].as_str().expect("token").to_string()
    }

    /// Register and log in, returning `(user_id, token)`.
    pub async fn user(&self, username: &str) -> (i32, String) {
        let id = self.register(username).await;
        let token = self.login(username).await;
        (id, token)
    }

    pub async fn ingredient(&self, name: &str, unit: &str) -> i32 {
        ingredient::ActiveModel {
            name: Set(name.to_string()),
            measurement_unit: Set(unit.to_string()),
            ..Default::default()
        }
        .insert(&self.state.db)
        .await
        .expect("Failed to create ingredient")
        .id
    }

    pub async fn tag(&self, name: &str, color: &str, slug: &str) -> i32 {
        tag::ActiveModel {
            name: Set(name.to_string()),
            color: Set(color.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        }
        .insert(&self.state.db)
        .await
        .expect("Failed to create tag")
        .id
    }

    /// Publish a recipe through the API and return its ID.
    pub async fn recipe(&self, token: &str, name: &str, ingredients: &[(i32, i32)], tags: &[i32]) -> i32 {
        let (key, value) = auth_header(token);
        let response = self
            .server
            .post("/api/recipes")
            .add_header(key, value)
            .json(&recipe_payload(name, ingredients, tags))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        body.data["id"].as_i64().expect("recipe id") as i32
    }
}

pub fn recipe_payload(name: &str, ingredients: &[(i32, i32)], tags: &[i32]) -> Value {
    json!({
        "ingredients": ingredients
            .iter()
            .map(|(id, amount)| json!({"id": id, "amount": amount}))
            .collect::<Vec<_>>(),
        "tags": tags,
        "image": PNG_DATA_URI,
        "name": name,
        "text": "Mix everything and cook.",
        "cooking_time": 15,
    })
}
