use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use rand::RngCore;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::{AccessToken, RefreshToken, User};
use crate::db::DbOperations;
use crate::error::{AppError, AuthError};

const TOKEN_BYTES: usize = 32;

/// An access/refresh pair as handed to a signing-in client.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: AccessToken,
    pub refresh: RefreshToken,
}

/// Issues, validates and revokes the opaque token pairs that represent an
/// authenticated session. Tokens are random identifiers looked up in the
/// store; expiry is applied lazily at validation time with an explicit,
/// atomic deactivation write.
pub struct TokenManager {
    db: DbOperations,
    ttl_days: i64,
}

impl TokenManager {
    pub fn new(db: DbOperations, ttl_days: i64) -> Self {
        Self { db, ttl_days }
    }

    /// Mint a fresh access/refresh pair. Multiple live pairs per user are
    /// allowed (multi-device).
    pub async fn issue(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        let refresh = RefreshToken::new(user_id, generate_token(), self.ttl_days);
        let refresh = self.db.create_refresh_token(&refresh).await?;

        let access = AccessToken::new(user_id, refresh.id, generate_token(), self.ttl_days);
        let access = self.db.create_access_token(&access).await?;

        debug!(user_id = %user_id, "issued token pair");
        Ok(TokenPair { access, refresh })
    }

    /// Resolve an access token to its owning user.
    ///
    /// A token past its expiry is deactivated here and now; subsequent
    /// validations see it inactive regardless of clock.
    pub async fn validate(&self, token: &str) -> Result<User, AppError> {
        let access = self
            .db
            .get_access_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !access.is_active {
            return Err(AuthError::InvalidToken.into());
        }

        if access.is_expired() {
            self.db.deactivate_access_token(token).await?;
            return Err(AuthError::TokenExpired.into());
        }

        let user = self
            .db
            .get_user_by_id(access.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(user)
    }

    /// Mint a new access token against an active, unexpired refresh token.
    /// The refresh token itself is not rotated.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessToken, AppError> {
        let refresh = self
            .db
            .get_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if !refresh.is_active || refresh.is_expired() {
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let access = AccessToken::new(refresh.user_id, refresh.id, generate_token(), self.ttl_days);
        let access = self.db.create_access_token(&access).await?;

        debug!(user_id = %refresh.user_id, "refreshed access token");
        Ok(access)
    }

    /// Explicitly push a refresh token's expiry another full window out.
    /// This is the only operation that extends one.
    pub async fn refresh_expiry(&self, refresh_token: &str) -> Result<(), AppError> {
        let expires_at = Utc::now() + Duration::days(self.ttl_days);
        let updated = self.db.extend_refresh_token(refresh_token, expires_at).await?;

        if updated == 0 {
            return Err(AuthError::InvalidRefreshToken.into());
        }
        Ok(())
    }

    /// Deactivate an access token. Revoking an already-inactive token
    /// succeeds; a token that was never issued is a client error.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        if self.db.get_access_token(token).await?.is_none() {
            return Err(AppError::NotFound("access token"));
        }

        self.db.deactivate_access_token(token).await?;
        Ok(())
    }
}

/// Cryptographically random, URL-safe opaque identifier.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_tokens_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_token()));
        }
    }

    #[test]
    fn test_generated_token_shape() {
        let token = generate_token();
        // 32 bytes base64url without padding
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
