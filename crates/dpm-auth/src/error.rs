//! Grant token error types.

use dpm_core::error::{DpmError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for DpmError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired | AuthError::TokenInvalid(_) => DpmError::Unauthenticated {
                code: ErrorCode::GrantTokenInvalid,
            },
            AuthError::Crypto(msg) => DpmError::Internal(msg),
        }
    }
}
