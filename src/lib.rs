pub mod auth;
pub mod billing;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod survey;

use std::sync::Arc;

use actix_web::HttpResponse;
use sqlx::postgres::PgPoolOptions;

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

pub use auth::{AuthService, AuthUser, MaybeUser, TokenManager};
pub use billing::{BillingApi, BillingService, StripeClient};
pub use chat::{ChatService, CompletionApi, OpenRouterClient};
pub use db::{DbOperations, User};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db: DbOperations,
    pub tokens: Arc<TokenManager>,
    pub auth: Arc<AuthService>,
    pub chat: Arc<ChatService>,
    pub billing: Arc<BillingService>,
}

impl AppState {
    /// Connect the pool and wire the real upstream clients.
    pub async fn new(config: Settings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await
            .map_err(|e| {
                AppError::Database(error::DatabaseError::ConnectionError(e.to_string()))
            })?;

        let db = DbOperations::new(Arc::new(pool));
        let completion: Arc<dyn CompletionApi> = Arc::new(OpenRouterClient::new(&config.chat)?);
        let provider: Arc<dyn BillingApi> = Arc::new(StripeClient::new(&config.billing)?);

        Ok(Self::assemble(config, db, completion, provider))
    }

    /// Wire services around an existing store and injected upstream
    /// clients. Tests use this to substitute mocks.
    pub fn assemble(
        config: Settings,
        db: DbOperations,
        completion: Arc<dyn CompletionApi>,
        provider: Arc<dyn BillingApi>,
    ) -> Self {
        let config = Arc::new(config);
        let tokens = Arc::new(TokenManager::new(db.clone(), config.auth.token_ttl_days));
        let auth = Arc::new(AuthService::new(db.clone(), tokens.clone()));
        let chat = Arc::new(ChatService::new(db.clone(), completion));
        let billing = Arc::new(BillingService::new(
            db.clone(),
            provider,
            config.billing.success_url.clone(),
            config.billing.cancel_url.clone(),
        ));

        Self { config, db, tokens, auth, chat, billing }
    }
}
