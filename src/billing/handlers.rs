use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::billing::webhook::{self, BillingEvent};
use crate::db::models::{PaymentRecord, Subscription, SubscriptionPlan};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub id: Uuid,
    pub name: String,
    pub plan_type: String,
    pub billing_cycle: String,
    pub price_cents: i64,
    pub features: serde_json::Value,
}

impl From<SubscriptionPlan> for PlanResponse {
    fn from(plan: SubscriptionPlan) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            plan_type: plan.plan_type,
            billing_cycle: plan.billing_cycle,
            price_cents: plan.price_cents,
            features: plan.features,
        }
    }
}

pub async fn list_plans(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let plans = state.billing.list_plans().await?;
    let plans: Vec<PlanResponse> = plans.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(plans))
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub plan_id: Uuid,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

pub async fn create_subscription(
    user: AuthUser,
    req: web::Json<CreateSubscriptionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let session = state
        .billing
        .create_checkout(
            &user.0,
            req.plan_id,
            req.success_url.as_deref(),
            req.cancel_url.as_deref(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "checkout_url": session.url,
        "session_id": session.id
    })))
}

#[derive(Debug, Deserialize)]
pub struct CancelSubscriptionRequest {
    pub cancel_at_period_end: bool,
}

pub async fn cancel_subscription(
    user: AuthUser,
    req: web::Json<CancelSubscriptionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state
        .billing
        .cancel(user.0.id, req.cancel_at_period_end)
        .await?;

    let message = if req.cancel_at_period_end {
        "Subscription will be canceled at the end of the current period"
    } else {
        "Subscription canceled immediately"
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": message })))
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub days_until_renewal: i64,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        let days_until_renewal = (sub.current_period_end - Utc::now()).num_days();
        Self {
            id: sub.id,
            plan_id: sub.plan_id,
            status: sub.status,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
            days_until_renewal,
        }
    }
}

pub async fn subscription_status(
    user: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    match state.billing.latest_subscription(user.0.id).await? {
        Some(sub) => Ok(HttpResponse::Ok().json(SubscriptionResponse::from(sub))),
        None => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "No subscription found"
        }))),
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentRecord> for PaymentResponse {
    fn from(payment: PaymentRecord) -> Self {
        Self {
            id: payment.id,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            status: payment.status,
            created_at: payment.created_at,
        }
    }
}

pub async fn payment_history(
    user: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let payments = state.billing.payment_history(user.0.id).await?;
    let payments: Vec<PaymentResponse> = payments.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(payments))
}

/// Provider webhook ingestion. The signature is checked over the raw bytes
/// before anything is parsed.
pub async fn billing_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let header = req
        .headers()
        .get(webhook::SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Validation("missing webhook signature".into()))?;

    webhook::verify_signature(
        &body,
        header,
        &state.config.billing.webhook_secret,
        Utc::now(),
    )?;

    let event: BillingEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed webhook payload: {}", e)))?;

    state.billing.reconcile(event).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true })))
}
