//! DPM Auth: Application grant token issuance and validation.
//!
//! A grant token is an EdDSA-signed JWT whose subject is an
//! application id. Holding one proves the application's identity when
//! it requests access to a topic.

pub mod config;
pub mod error;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use token::{GrantTokenClaims, GrantTokenRequest, VerifiedGrant};
