use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::ApiError,
    models::{ROLE_ADMIN, ROLE_MANAGER, ROLE_USER},
};

/// Session token lifetime: 5 days from issuance.
pub const TOKEN_TTL_SECS: i64 = 60 * 60 * 24 * 5;

/// Claims
///
/// Typed payload of every session token. Deserialization fails when a claim
/// is absent, which the extractor reports as `MissingTokenClaims` instead of
/// coercing values out of an untyped map.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: i64,
    /// The user's numeric role at the time of login.
    pub role: i32,
    /// Expiration time (Unix timestamp).
    pub exp: usize,
    /// Issued-at time (Unix timestamp).
    pub iat: usize,
}

/// Issues a signed session token embedding the user's id and role.
pub fn create_token(user_id: i64, role: i32, secret: &str) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role,
        exp: (now + TOKEN_TTL_SECS) as usize,
        iat: now as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| ApiError::InvalidToken)
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the caller's id and
/// role as carried in the token. Handlers receive this through the extractor
/// and feed it to the permission helpers below.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub role: i32,
}

/// AuthUser extractor
///
/// Implements Axum's `FromRequestParts`, making `AuthUser` usable as a
/// handler argument. Extracts the `Bearer` token from the Authorization
/// header, verifies the signature and expiry against the configured secret,
/// and rejects with a 401-class `ApiError` on any failure. Claims are
/// self-contained; no database round-trip happens here.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::MissingToken)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                return Err(match e.kind() {
                    // A well-formed token whose payload lacks a claim the
                    // typed struct requires.
                    ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                        ApiError::MissingTokenClaims
                    }
                    // Expired, bad signature, malformed, ...
                    _ => ApiError::InvalidToken,
                });
            }
        };

        Ok(AuthUser {
            id: token_data.claims.sub,
            role: token_data.claims.role,
        })
    }
}

// --- Permission evaluation ---

// All role checks live here so the inverted numeric ordering (lower value =
// higher privilege) is spelled out exactly once. The `>=` forms deliberately
// cover any lower tiers added later.

/// Admin only.
pub fn require_admin(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.role != ROLE_ADMIN {
        return Err(ApiError::InsufficientPrivileges);
    }
    Ok(())
}

/// Manager tier or above (admin, manager).
pub fn require_manager_tier(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.role > ROLE_MANAGER {
        return Err(ApiError::InsufficientPrivileges);
    }
    Ok(())
}

/// Admin always passes; every lower tier must be the resource owner.
pub fn require_admin_or_owner(auth: &AuthUser, owner_id: i64) -> Result<(), ApiError> {
    if auth.role >= ROLE_MANAGER && auth.id != owner_id {
        return Err(ApiError::InsufficientPrivileges);
    }
    Ok(())
}

/// Manager tier passes; user tier must be acting on themself.
pub fn require_manager_tier_or_self(auth: &AuthUser, target_id: i64) -> Result<(), ApiError> {
    if auth.role >= ROLE_USER && auth.id != target_id {
        return Err(ApiError::InsufficientPrivileges);
    }
    Ok(())
}
