use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::extractor::{bearer_token, AuthUser};
use crate::db::models::User;
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub family_name: Option<String>,
    pub job_title: Option<String>,
    pub current_company: Option<String>,
    pub is_email_verified: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            family_name: user.family_name,
            job_title: user.job_title,
            current_company: user.current_company,
            is_email_verified: user.is_email_verified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub access: String,
    pub refresh: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub agreed_to_policy: bool,
}

pub async fn signup(
    req: web::Json<SignUpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received signup request for email: {}", req.email);

    let user = state
        .auth
        .signup(&req.email, &req.password, &req.confirm_password, req.agreed_to_policy)
        .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "status": "success",
        "email": user.email,
        "message": "User created successfully."
    })))
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

pub async fn signin(
    req: web::Json<SignInRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    match state.auth.signin(&req.email, &req.password).await {
        Ok((user, pair)) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "user": UserResponse::from(user),
            "tokens": TokensResponse {
                access: pair.access.token.clone(),
                refresh: pair.refresh.token.clone(),
                expires_in: pair.access.expires_in(),
            }
        }))),
        Err(e) => {
            error!("Sign-in failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

pub async fn refresh(
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let access = state.tokens.refresh(&req.refresh).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "access": access.token,
        "expires_in": access.expires_in()
    })))
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req).ok_or(AuthError::MissingToken)?;

    state.tokens.revoke(&token).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Logged out successfully."
    })))
}

pub async fn get_profile(user: AuthUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(UserResponse::from(user.0)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub family_name: Option<String>,
    pub job_title: Option<String>,
    pub current_company: Option<String>,
}

pub async fn update_profile(
    user: AuthUser,
    req: web::Json<UpdateProfileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let updated = state
        .auth
        .update_profile(
            user.0.id,
            req.name.as_deref(),
            req.family_name.as_deref(),
            req.job_title.as_deref(),
            req.current_company.as_deref(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Profile updated successfully",
        "user": UserResponse::from(updated)
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    user: AuthUser,
    req: web::Json<ChangePasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state
        .auth
        .change_password(&user.0, &req.current_password, &req.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Password changed successfully"
    })))
}

/// Account deletion first tries to cancel any live billing subscription at
/// the provider; a failure there is logged and never blocks the deletion.
pub async fn delete_account(
    user: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.billing.cancel_best_effort(user.0.id).await;
    state.auth.delete_account(user.0.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Account deleted successfully"
    })))
}
