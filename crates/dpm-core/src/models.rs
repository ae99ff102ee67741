//! Domain models for the permissions manager.
//!
//! Group is the root scoping entity: topics and applications belong to
//! exactly one group, memberships tie users to groups, and permission
//! grants tie applications to topics.

pub mod application;
pub mod application_permission;
pub mod group;
pub mod membership;
pub mod topic;
pub mod user;

use crate::error::{DpmError, DpmResult, ErrorCode};

/// Minimum length of a trimmed group, topic or application name.
pub const MIN_NAME_LEN: usize = 3;

/// Trim a resource name and check it against the naming rules.
pub fn normalize_name(raw: &str, blank: ErrorCode, too_short: ErrorCode) -> DpmResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DpmError::invalid(blank));
    }
    if name.chars().count() < MIN_NAME_LEN {
        return Err(DpmError::invalid(too_short));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed() {
        let name = normalize_name(
            "  telemetry ",
            ErrorCode::TopicNameBlank,
            ErrorCode::TopicNameTooShort,
        )
        .unwrap();
        assert_eq!(name, "telemetry");
    }

    #[test]
    fn blank_and_short_names_rejected() {
        let blank = normalize_name("   ", ErrorCode::GroupNameBlank, ErrorCode::GroupNameTooShort)
            .unwrap_err();
        assert_eq!(blank.code(), ErrorCode::GroupNameBlank);

        let short = normalize_name(" ab ", ErrorCode::GroupNameBlank, ErrorCode::GroupNameTooShort)
            .unwrap_err();
        assert_eq!(short.code(), ErrorCode::GroupNameTooShort);
    }
}
