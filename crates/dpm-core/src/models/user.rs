//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DpmError, DpmResult, ErrorCode};

/// A person known to the permissions manager, identified by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Site-wide admin flag.
    pub is_admin: bool,
    /// Bumped whenever the user's admin flag or group capabilities change.
    pub permissions_last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub is_admin: bool,
}

/// Trim an email address and reject blank or malformed values.
pub fn normalize_email(raw: &str) -> DpmResult<String> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(DpmError::invalid(ErrorCode::EmailBlank));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_string()),
        _ => Err(DpmError::invalid(ErrorCode::EmailInvalidFormat)),
    }
}
