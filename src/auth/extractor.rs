use std::future::Future;
use std::pin::Pin;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};

use crate::db::models::User;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// Pull the opaque token out of `Authorization: Bearer <token>`.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

/// Extractor for endpoints that require an authenticated caller.
/// A missing, invalid or expired token fails the request with 401 before
/// the handler runs.
pub struct AuthUser(pub User);

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, AppError>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .ok_or_else(|| AppError::Internal("application state not configured".into()))?;

            let token = bearer_token(&req).ok_or(AuthError::MissingToken)?;
            let user = state.tokens.validate(&token).await?;
            Ok(AuthUser(user))
        })
    }
}

/// Extractor for endpoints that also accept anonymous callers. No header
/// means anonymous; a header that is present still has to validate.
pub struct MaybeUser(pub Option<User>);

impl FromRequest for MaybeUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, AppError>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let token = match bearer_token(&req) {
                Some(token) => token,
                None => return Ok(MaybeUser(None)),
            };

            let state = req
                .app_data::<web::Data<AppState>>()
                .ok_or_else(|| AppError::Internal("application state not configured".into()))?;

            let user = state.tokens.validate(&token).await?;
            Ok(MaybeUser(Some(user)))
        })
    }
}
