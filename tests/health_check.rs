use actix_web::{test, web, App};
use wixbuddy_server::health_check;

#[actix_web::test]
async fn test_health_check() {
    let app = test::init_service(
        App::new().route("/health", web::get().to(health_check)),
    )
    .await;

    let response = test::TestRequest::get()
        .uri("/health")
        .send_request(&app)
        .await;

    assert!(response.status().is_success());
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body.get("timestamp").is_some());
}
