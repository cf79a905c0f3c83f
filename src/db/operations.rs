use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{
    AccessToken, ChatMessage, ChatSession, PaymentRecord, Question, RefreshToken, Subscription,
    SubscriptionPlan, User,
};
use crate::error::AppError;

/// Data access facade over the connection pool. All row-level state
/// transitions (token deactivation, session close) are single atomic
/// UPDATE statements guarded by the prior state.
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    // ---- users ----

    pub async fn create_user(&self, user: &User) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name, family_name, job_title,
                               current_company, is_email_verified, agreed_to_policy,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.family_name)
        .bind(&user.job_title)
        .bind(&user.current_company)
        .bind(user.is_email_verified)
        .bind(user.agreed_to_policy)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool())
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    /// Partial profile update. Absent fields keep their stored value.
    pub async fn update_user_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        family_name: Option<&str>,
        job_title: Option<&str>,
        current_company: Option<&str>,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                family_name = COALESCE($3, family_name),
                job_title = COALESCE($4, job_title),
                current_company = COALESCE($5, current_company),
                updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(family_name)
        .bind(job_title)
        .bind(current_company)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        Ok(user)
    }

    pub async fn update_user_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Cascades to tokens, chat sessions, subscriptions and payments.
    pub async fn delete_user(&self, id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    // ---- tokens ----

    pub async fn create_refresh_token(&self, token: &RefreshToken) -> Result<RefreshToken, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token, is_active, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.is_active)
        .bind(token.created_at)
        .bind(token.expires_at)
        .fetch_one(self.pool())
        .await?;

        Ok(token)
    }

    pub async fn create_access_token(&self, token: &AccessToken) -> Result<AccessToken, AppError> {
        let token = sqlx::query_as::<_, AccessToken>(
            r#"
            INSERT INTO access_tokens (id, user_id, refresh_token_id, token, is_active,
                                       created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(token.refresh_token_id)
        .bind(&token.token)
        .bind(token.is_active)
        .bind(token.created_at)
        .bind(token.expires_at)
        .fetch_one(self.pool())
        .await?;

        Ok(token)
    }

    pub async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>, AppError> {
        let token = sqlx::query_as::<_, AccessToken>("SELECT * FROM access_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(self.pool())
            .await?;

        Ok(token)
    }

    pub async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>, AppError> {
        let token =
            sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token = $1")
                .bind(token)
                .fetch_optional(self.pool())
                .await?;

        Ok(token)
    }

    /// Atomic deactivation; concurrent calls on the same token are
    /// idempotent. Returns the number of rows flipped.
    pub async fn deactivate_access_token(&self, token: &str) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE access_tokens SET is_active = FALSE WHERE token = $1 AND is_active = TRUE")
                .bind(token)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected())
    }

    pub async fn extend_refresh_token(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET expires_at = $2 WHERE token = $1 AND is_active = TRUE")
                .bind(token)
                .bind(expires_at)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected())
    }

    // ---- chat ----

    pub async fn create_chat_session(&self, session: &ChatSession) -> Result<ChatSession, AppError> {
        let session = sqlx::query_as::<_, ChatSession>(
            r#"
            INSERT INTO chat_sessions (id, user_id, start_time)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.start_time)
        .fetch_one(self.pool())
        .await?;

        Ok(session)
    }

    /// Ownership is part of the lookup: an anonymous caller only matches
    /// sessions with no owner, a user only their own.
    pub async fn get_chat_session(
        &self,
        id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Option<ChatSession>, AppError> {
        let session = sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE id = $1 AND user_id IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(session)
    }

    /// First close wins: the guard on end_time makes the transition atomic.
    pub async fn close_chat_session(&self, id: Uuid) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE chat_sessions SET end_time = $2 WHERE id = $1 AND end_time IS NULL")
                .bind(id)
                .bind(Utc::now())
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected())
    }

    pub async fn create_chat_message(&self, message: &ChatMessage) -> Result<ChatMessage, AppError> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (id, session_id, sender, content, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(message.session_id)
        .bind(&message.sender)
        .bind(&message.content)
        .bind(message.timestamp)
        .fetch_one(self.pool())
        .await?;

        Ok(message)
    }

    pub async fn list_chat_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, AppError> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_messages WHERE session_id = $1 ORDER BY timestamp ASC",
        )
        .bind(session_id)
        .fetch_all(self.pool())
        .await?;

        Ok(messages)
    }

    pub async fn list_chat_sessions(
        &self,
        user_id: Option<Uuid>,
    ) -> Result<Vec<ChatSession>, AppError> {
        let sessions = sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE user_id IS NOT DISTINCT FROM $1 ORDER BY start_time DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(sessions)
    }

    pub async fn delete_chat_session(
        &self,
        id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND user_id IS NOT DISTINCT FROM $2")
                .bind(id)
                .bind(user_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_all_chat_sessions(&self, user_id: Option<Uuid>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE user_id IS NOT DISTINCT FROM $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    // ---- subscription plans ----

    pub async fn list_active_plans(&self) -> Result<Vec<SubscriptionPlan>, AppError> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE is_active = TRUE ORDER BY price_cents ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(plans)
    }

    pub async fn get_active_plan(&self, id: Uuid) -> Result<Option<SubscriptionPlan>, AppError> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(plan)
    }

    // ---- subscriptions ----

    pub async fn get_active_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = $1 AND status IN ('active', 'trialing')",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(sub)
    }

    pub async fn get_latest_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(sub)
    }

    pub async fn get_subscription_by_external_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, AppError> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE stripe_subscription_id = $1",
        )
        .bind(stripe_subscription_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(sub)
    }

    /// Idempotent: a second creation event for the same external id is a
    /// no-op. Returns the number of rows inserted (0 or 1).
    pub async fn insert_subscription(&self, sub: &Subscription) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, plan_id, stripe_subscription_id,
                                       stripe_customer_id, status, current_period_start,
                                       current_period_end, cancel_at_period_end,
                                       provider_updated_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (stripe_subscription_id) DO NOTHING
            "#,
        )
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(sub.plan_id)
        .bind(&sub.stripe_subscription_id)
        .bind(&sub.stripe_customer_id)
        .bind(&sub.status)
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(sub.cancel_at_period_end)
        .bind(sub.provider_updated_at)
        .bind(sub.created_at)
        .bind(sub.updated_at)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Last-write-wins on the provider-reported timestamp, so duplicated or
    /// out-of-order webhook deliveries never roll state backwards.
    pub async fn update_subscription_from_provider(
        &self,
        stripe_subscription_id: &str,
        status: &str,
        current_period_start: DateTime<Utc>,
        current_period_end: DateTime<Utc>,
        cancel_at_period_end: bool,
        provider_updated_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2,
                current_period_start = $3,
                current_period_end = $4,
                cancel_at_period_end = $5,
                provider_updated_at = $6,
                updated_at = $7
            WHERE stripe_subscription_id = $1
              AND (provider_updated_at IS NULL OR provider_updated_at <= $6)
            "#,
        )
        .bind(stripe_subscription_id)
        .bind(status)
        .bind(current_period_start)
        .bind(current_period_end)
        .bind(cancel_at_period_end)
        .bind(provider_updated_at)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_subscription_canceled(
        &self,
        stripe_subscription_id: &str,
        provider_updated_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', provider_updated_at = $2, updated_at = $3
            WHERE stripe_subscription_id = $1
              AND (provider_updated_at IS NULL OR provider_updated_at <= $2)
            "#,
        )
        .bind(stripe_subscription_id)
        .bind(provider_updated_at)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Mirrors the provider response after an explicit cancel request.
    pub async fn set_subscription_state(
        &self,
        id: Uuid,
        status: &str,
        cancel_at_period_end: bool,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = $2, cancel_at_period_end = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(cancel_at_period_end)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    // ---- payments ----

    /// Append-only; deduplicated solely by the external payment id.
    pub async fn insert_payment(&self, payment: &PaymentRecord) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (id, user_id, subscription_id, stripe_payment_intent_id,
                                  amount_cents, currency, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (stripe_payment_intent_id) DO NOTHING
            "#,
        )
        .bind(payment.id)
        .bind(payment.user_id)
        .bind(payment.subscription_id)
        .bind(&payment.stripe_payment_intent_id)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(&payment.status)
        .bind(payment.created_at)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_payments(&self, user_id: Uuid) -> Result<Vec<PaymentRecord>, AppError> {
        let payments = sqlx::query_as::<_, PaymentRecord>(
            "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(payments)
    }

    // ---- questions ----

    pub async fn list_active_questions(&self) -> Result<Vec<Question>, AppError> {
        let questions = sqlx::query_as::<_, Question>(
            r#"SELECT * FROM questions WHERE is_active = TRUE ORDER BY "order" ASC"#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(questions)
    }
}
