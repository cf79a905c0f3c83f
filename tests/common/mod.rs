use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use wixbuddy_server::{
    AppState, DbOperations, OpenRouterClient, Settings, StripeClient,
};

/// Application state over a lazy pool: nothing connects until a query
/// actually runs, so request paths that fail before touching the store
/// can be exercised without a database.
pub fn lazy_state() -> AppState {
    let config = Settings::new().expect("Failed to load test config");
    state_from(config)
}

pub fn state_from(config: Settings) -> AppState {
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .expect("Failed to create lazy pool");
    let db = DbOperations::new(Arc::new(pool));
    let completion = Arc::new(OpenRouterClient::new(&config.chat).expect("chat client"));
    let provider = Arc::new(StripeClient::new(&config.billing).expect("billing client"));

    AppState::assemble(config, db, completion, provider)
}

/// Connected state for tests that need a real database. Runs migrations.
#[allow(dead_code)]
pub async fn connected_state(config: Settings) -> AppState {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let db = DbOperations::new(Arc::new(pool));
    let completion = Arc::new(OpenRouterClient::new(&config.chat).expect("chat client"));
    let provider = Arc::new(StripeClient::new(&config.billing).expect("billing client"));

    AppState::assemble(config, db, completion, provider)
}

/// Unique email per test run to keep reruns independent.
#[allow(dead_code)]
pub fn unique_email(prefix: &str) -> String {
    format!("{}+{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}
