use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use std::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use wixbuddy_server::auth::handlers as auth_handlers;
use wixbuddy_server::billing::handlers as billing_handlers;
use wixbuddy_server::chat::handlers as chat_handlers;
use wixbuddy_server::{health_check, survey, AppError, AppState, Settings};

#[actix_web::main]
async fn main() -> wixbuddy_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully");

    info!("Starting server at {}:{}", config.server.host, config.server.port);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let state = web::Data::new(state);

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;

    // Start HTTP server
    let cors_settings = config.cors.clone();
    HttpServer::new(move || {
        let cors = if cors_settings.enabled {
            let cors_config = Cors::default();

            let cors_config = if cors_settings.allow_any_origin {
                cors_config
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .expose_any_header()
            } else {
                // More restrictive CORS for production use
                cors_config
                    .allowed_origin("https://app.wixbuddy.com")
                    .allowed_origin("http://localhost:3000")
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                    .allowed_headers(vec!["Authorization", "Content-Type"])
                    .supports_credentials()
            };

            cors_config.max_age(cors_settings.max_age as usize)
        } else {
            // CORS disabled - use most restrictive settings
            Cors::default()
        };

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .route("/auth/signup", web::post().to(auth_handlers::signup))
            .route("/auth/signin", web::post().to(auth_handlers::signin))
            .route("/auth/refresh", web::post().to(auth_handlers::refresh))
            .route("/auth/logout", web::post().to(auth_handlers::logout))
            .route("/account-settings", web::get().to(auth_handlers::get_profile))
            .route("/account-settings", web::put().to(auth_handlers::update_profile))
            .route("/account-settings", web::post().to(auth_handlers::change_password))
            .route("/account-settings", web::delete().to(auth_handlers::delete_account))
            .route("/questions", web::get().to(survey::list_questions))
            .route("/subscription/plans", web::get().to(billing_handlers::list_plans))
            .route("/subscription/create", web::post().to(billing_handlers::create_subscription))
            .route("/subscription/cancel", web::post().to(billing_handlers::cancel_subscription))
            .route("/subscription/status", web::get().to(billing_handlers::subscription_status))
            .route(
                "/subscription/payment-history",
                web::get().to(billing_handlers::payment_history),
            )
            .route("/webhook/billing", web::post().to(billing_handlers::billing_webhook))
            .route("/chatbot/", web::post().to(chat_handlers::chatbot))
            .route("/chatbot/history/", web::get().to(chat_handlers::chat_history))
            .route("/chatbot/session/{id}/", web::get().to(chat_handlers::get_chat_session))
            .route(
                "/chatbot/session/{id}/delete/",
                web::delete().to(chat_handlers::delete_chat_session),
            )
            .route(
                "/chatbot/history/delete-all/",
                web::delete().to(chat_handlers::delete_all_chat_history),
            )
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(())
}
