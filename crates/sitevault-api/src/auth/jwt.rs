//! Session token issuance and validation
//!
//! Session tokens are HS256 JWTs carrying the user's id, email and role.
//! Nothing is stored server-side: a token is valid while its signature and
//! expiry hold and the live user record still matches it (see
//! [`check_live_user`]).

use super::models::User;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sitevault_core::{AuthConfig, UserRole};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Validated session claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// User's email address at issuance
    pub email: String,
    /// User's role at issuance
    pub role: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
}

impl Claims {
    /// Subject parsed as a user id
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::MalformedClaims)
    }
}

/// Wire shape used while decoding; identity claims may be absent
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    iss: String,
    sub: Option<String>,
    email: Option<String>,
    #[serde(default)]
    role: String,
    #[serde(default)]
    iat: u64,
    exp: u64,
}

/// Token errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(String),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token is missing identity claims")]
    MalformedClaims,

    #[error("User role has changed since the token was issued")]
    RoleChanged,

    #[error("Account is inactive")]
    AccountInactive,
}

/// Signing settings derived from the auth configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Token issuer identifier
    pub issuer: String,
    /// Lifetime applied by [`issue_token`]
    pub ttl_secs: u64,
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            issuer: config.issuer.clone(),
            ttl_secs: config.token_ttl_secs,
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Issue a session token for `user` using the configured ttl
pub fn issue_token(config: &JwtConfig, user: &User) -> Result<(String, Claims), TokenError> {
    issue_token_at(config, user, now_secs(), config.ttl_secs)
}

/// Issue a token with an explicit issuance time and ttl
pub fn issue_token_at(
    config: &JwtConfig,
    user: &User,
    issued_at: u64,
    ttl_secs: u64,
) -> Result<(String, Claims), TokenError> {
    let exp = issued_at
        .checked_add(ttl_secs)
        .ok_or_else(|| TokenError::Encoding("token expiry overflows".to_string()))?;
    let claims = Claims {
        iss: config.issuer.clone(),
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.as_str().to_string(),
        iat: issued_at,
        exp,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| TokenError::Encoding(e.to_string()))?;

    Ok((token, claims))
}

/// Validate a token's signature, issuer and expiry, then its identity claims
pub fn validate_token(config: &JwtConfig, token: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    let raw = decode::<RawClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| TokenError::InvalidToken)?
    .claims;

    let sub = raw.sub.filter(|s| !s.trim().is_empty());
    let email = raw.email.filter(|s| !s.trim().is_empty());
    let (Some(sub), Some(email)) = (sub, email) else {
        return Err(TokenError::MalformedClaims);
    };

    Ok(Claims {
        iss: raw.iss,
        sub,
        email,
        role: raw.role,
        iat: raw.iat,
        exp: raw.exp,
    })
}

/// Cross-check validated claims against the live user record
pub fn check_live_user(claims: &Claims, user: &User) -> Result<(), TokenError> {
    let embedded: Option<UserRole> = claims.role.parse().ok();
    if embedded != Some(user.role) {
        return Err(TokenError::RoleChanged);
    }
    if !user.is_active() {
        return Err(TokenError::AccountInactive);
    }
    Ok(())
}
