//! Grant token configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for signing grant tokens.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for verifying grant tokens.
    pub jwt_public_key_pem: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Grant token lifetime in seconds (default: 172_800 = 48 hours).
    pub grant_token_lifetime_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "dpm".into(),
            grant_token_lifetime_secs: 172_800,
        }
    }
}
