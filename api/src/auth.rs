use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;

pub const CREATOR_ROLE: &str = "content_creator";

/// Claims carried by the identity provider's bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub role: String,
    pub exp: usize,
}

/// The caller behind a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_creator(&self) -> bool {
        self.role == CREATOR_ROLE
    }

    pub fn require_creator(&self) -> Result<(), ApiError> {
        if self.is_creator() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Content creator access required".to_string()))
        }
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: Arc<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, ApiError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!("token rejected: {}", e);
            ApiError::Forbidden("Invalid token".to_string())
        })?;
        Ok(AuthUser {
            user_id: data.claims.user_id,
            email: data.claims.email,
            role: data.claims.role,
        })
    }
}

/// Pulls the raw token out of an `Authorization` header value.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, ApiError> {
    let value = header_value.ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(ApiError::BadRequest("Malformed authorization header".to_string())),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    TokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header_value = match parts.headers.get(header::AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| ApiError::BadRequest("Malformed authorization header".to_string()))?,
            ),
            None => None,
        };
        let token = bearer_token(header_value)?;
        TokenVerifier::from_ref(state).verify(token)
    }
}
