//! Request identity extractors.
//!
//! Token issuance and policy belong to the platform's auth service; this
//! module only validates what it is handed.

use crate::error::AppError;
use crate::models::{UserId, UserRole};
use crate::state::AppState;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// HS256 access-token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: UserRole,
    pub exp: usize,
}

/// Caller identified by a valid `Authorization: Bearer <jwt>` header
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: UserRole,
}

/// Another platform service, identified by the shared internal token
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

pub fn validate_token(token: &str, secret: &str) -> Result<AuthenticatedUser, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        AppError::Unauthorized
    })?;

    let user_id = UserId::parse(&data.claims.sub).map_err(|_| AppError::Unauthorized)?;
    Ok(AuthenticatedUser {
        user_id,
        role: data.claims.role,
    })
}

/// Sign a token; used by tests and local tooling
pub fn issue_token(
    user_id: &UserId,
    role: UserRole,
    secret: &str,
    ttl: chrono::Duration,
) -> Result<String, AppError> {
    let exp = (chrono::Utc::now() + ttl).timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: usize::try_from(exp).map_err(|_| AppError::Internal)?,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal)
}

fn state(req: &HttpRequest) -> Result<&web::Data<AppState>, AppError> {
    req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        tracing::error!("AppState missing from app data");
        AppError::Internal
    })
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let result = state(req).and_then(|state| {
            let token = bearer_token(req).ok_or(AppError::Unauthorized)?;
            validate_token(token, &state.config.auth.jwt_secret)
        });
        ready(result)
    }
}

impl FromRequest for InternalCaller {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let result = state(req).and_then(|state| {
            let expected = state
                .config
                .auth
                .internal_token
                .as_deref()
                .ok_or(AppError::Unauthorized)?;
            let presented = req
                .headers()
                .get(INTERNAL_TOKEN_HEADER)
                .and_then(|h| h.to_str().ok())
                .ok_or(AppError::Unauthorized)?;

            if presented == expected {
                Ok(InternalCaller)
            } else {
                tracing::warn!(path = req.path(), "rejected internal call with bad token");
                Err(AppError::Unauthorized)
            }
        });
        ready(result)
    }
}
