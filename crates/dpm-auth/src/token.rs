//! Grant token issuance and verification.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// JWT claims embedded in every grant token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantTokenClaims {
    /// Subject: the application id.
    pub sub: String,
    /// Email of the user who issued the token.
    pub email: String,
    pub application_name: String,
    pub group_id: String,
    pub group_name: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

/// What a grant token is issued for.
#[derive(Debug, Clone)]
pub struct GrantTokenRequest {
    pub application_id: Uuid,
    pub application_name: String,
    pub group_id: Uuid,
    pub group_name: String,
    pub issued_by: String,
}

/// A grant token whose signature, issuer and expiry have been checked.
///
/// Only [`validate_grant_token`] constructs one.
#[derive(Debug, Clone)]
pub struct VerifiedGrant {
    application_id: Uuid,
    claims: GrantTokenClaims,
}

impl VerifiedGrant {
    pub fn application_id(&self) -> Uuid {
        self.application_id
    }

    pub fn claims(&self) -> &GrantTokenClaims {
        &self.claims
    }
}

/// Issue a signed EdDSA (Ed25519) grant token.
pub fn issue_grant_token(
    request: &GrantTokenRequest,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = GrantTokenClaims {
        sub: request.application_id.to_string(),
        email: request.issued_by.clone(),
        application_name: request.application_name.clone(),
        group_id: request.group_id.to_string(),
        group_name: request.group_name.clone(),
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp: now + config.grant_token_lifetime_secs as i64,
        jti: Uuid::new_v4().to_string(),
    };

    let key = EncodingKey::from_ed_pem(config.jwt_private_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad private key: {e}")))?;

    jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Verify a grant token (signature, expiry, issuer) and extract the
/// application it speaks for.
pub fn validate_grant_token(token: &str, config: &AuthConfig) -> Result<VerifiedGrant, AuthError> {
    let key = DecodingKey::from_ed_pem(config.jwt_public_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad public key: {e}")))?;

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

    let claims = jsonwebtoken::decode::<GrantTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })?;

    let application_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| AuthError::TokenInvalid(format!("subject is not an application id: {e}")))?;

    Ok(VerifiedGrant {
        application_id,
        claims,
    })
}
