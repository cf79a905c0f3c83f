use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::error::{AppError, UpstreamError};

/// Checkout session handed back to the client for redirect.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Subscription state as reported by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

/// External billing provider operations. Local subscription rows are never
/// written here; they materialize through webhook reconciliation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillingApi: Send + Sync {
    async fn create_checkout_session(
        &self,
        customer_email: &str,
        price_id: &str,
        user_id: Uuid,
        plan_id: Uuid,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, UpstreamError>;

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<ProviderSubscription, UpstreamError>;
}

/// Stripe-compatible REST client. The base URL is configurable so tests
/// can point it at a local mock server.
pub struct StripeClient {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &BillingConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, context, "billing provider returned an error");
            return Err(UpstreamError::Billing(format!(
                "{}: status {}: {}",
                context, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::Billing(format!("{}: malformed response: {}", context, e)))
    }
}

#[async_trait]
impl BillingApi for StripeClient {
    async fn create_checkout_session(
        &self,
        customer_email: &str,
        price_id: &str,
        user_id: Uuid,
        plan_id: Uuid,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, UpstreamError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("mode", "subscription"),
                ("customer_email", customer_email),
                ("line_items[0][price]", price_id),
                ("line_items[0][quantity]", "1"),
                ("success_url", success_url),
                ("cancel_url", cancel_url),
                ("metadata[user_id]", &user_id.to_string()),
                ("metadata[plan_id]", &plan_id.to_string()),
            ])
            .send()
            .await
            .map_err(|e| UpstreamError::Billing(format!("checkout session: {}", e)))?;

        Self::parse(response, "checkout session").await
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<ProviderSubscription, UpstreamError> {
        let url = format!("{}/v1/subscriptions/{}", self.api_url, subscription_id);

        let response = if at_period_end {
            self.http
                .post(&url)
                .basic_auth(&self.secret_key, None::<&str>)
                .form(&[("cancel_at_period_end", "true")])
                .send()
                .await
        } else {
            self.http
                .delete(&url)
                .basic_auth(&self.secret_key, None::<&str>)
                .send()
                .await
        }
        .map_err(|e| UpstreamError::Billing(format!("cancel subscription: {}", e)))?;

        Self::parse(response, "cancel subscription").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: String) -> BillingConfig {
        BillingConfig {
            api_url: url,
            secret_key: "sk_test_secret".into(),
            webhook_secret: "whsec_test".into(),
            success_url: "http://localhost:3000/success".into(),
            cancel_url: "http://localhost:3000/cancel".into(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_create_checkout_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("mode=subscription"))
            .and(body_string_contains("customer_email=a%40x.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_1",
                "url": "https://checkout.example/cs_test_1"
            })))
            .mount(&server)
            .await;

        let client = StripeClient::new(&test_config(server.uri())).unwrap();
        let session = client
            .create_checkout_session(
                "a@x.com",
                "price_1",
                Uuid::new_v4(),
                Uuid::new_v4(),
                "http://localhost:3000/success",
                "http://localhost:3000/cancel",
            )
            .await
            .unwrap();

        assert_eq!(session.id, "cs_test_1");
        assert_eq!(session.url, "https://checkout.example/cs_test_1");
    }

    #[tokio::test]
    async fn test_cancel_at_period_end_posts_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/subscriptions/sub_1"))
            .and(body_string_contains("cancel_at_period_end=true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sub_1",
                "status": "active",
                "cancel_at_period_end": true
            })))
            .mount(&server)
            .await;

        let client = StripeClient::new(&test_config(server.uri())).unwrap();
        let sub = client.cancel_subscription("sub_1", true).await.unwrap();
        assert_eq!(sub.status, "active");
        assert!(sub.cancel_at_period_end);
    }

    #[tokio::test]
    async fn test_immediate_cancel_uses_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/subscriptions/sub_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sub_1",
                "status": "canceled"
            })))
            .mount(&server)
            .await;

        let client = StripeClient::new(&test_config(server.uri())).unwrap();
        let sub = client.cancel_subscription("sub_1", false).await.unwrap();
        assert_eq!(sub.status, "canceled");
        assert!(!sub.cancel_at_period_end);
    }

    #[tokio::test]
    async fn test_provider_error_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402).set_body_string("card declined"))
            .mount(&server)
            .await;

        let client = StripeClient::new(&test_config(server.uri())).unwrap();
        let err = client
            .create_checkout_session(
                "a@x.com",
                "price_1",
                Uuid::new_v4(),
                Uuid::new_v4(),
                "http://localhost:3000/success",
                "http://localhost:3000/cancel",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Billing(_)));
    }
}
