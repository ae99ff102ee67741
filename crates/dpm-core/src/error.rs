//! Error types and the machine-readable code vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entity kinds referenced by `NotFound` and `AlreadyExists`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    User,
    Group,
    GroupMembership,
    Topic,
    Application,
    ApplicationPermission,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::User => "user",
            Entity::Group => "group",
            Entity::GroupMembership => "group membership",
            Entity::Topic => "topic",
            Entity::Application => "application",
            Entity::ApplicationPermission => "application permission",
        };
        f.write_str(name)
    }
}

/// Stable error codes shared by server-side logic and clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "forbidden")]
    Forbidden,
    #[serde(rename = "unauthenticated")]
    Unauthenticated,
    #[serde(rename = "internal")]
    Internal,

    #[serde(rename = "user.not-found")]
    UserNotFound,
    #[serde(rename = "user.exists")]
    UserAlreadyExists,
    #[serde(rename = "user.is-not-valid")]
    UserIsNotValid,
    #[serde(rename = "email.cannot-be-blank-or-null")]
    EmailBlank,
    #[serde(rename = "email.is-not-format")]
    EmailInvalidFormat,

    #[serde(rename = "group.not-found")]
    GroupNotFound,
    #[serde(rename = "group.exists")]
    GroupAlreadyExists,
    #[serde(rename = "group.name.cannot-be-blank-or-null")]
    GroupNameBlank,
    #[serde(rename = "group.name.cannot-be-less-than-three-characters")]
    GroupNameTooShort,

    #[serde(rename = "user.group-membership.not-found")]
    GroupMembershipNotFound,
    #[serde(rename = "user.group-membership.exists")]
    GroupMembershipAlreadyExists,

    #[serde(rename = "topic.not-found")]
    TopicNotFound,
    #[serde(rename = "topic.exists")]
    TopicAlreadyExists,
    #[serde(rename = "topic.requires-group-association")]
    TopicRequiresGroup,
    #[serde(rename = "topic.name.cannot-be-blank-or-null")]
    TopicNameBlank,
    #[serde(rename = "topic.name.cannot-be-less-than-three-characters")]
    TopicNameTooShort,
    #[serde(rename = "topic.name.update-not-allowed")]
    TopicNameImmutable,
    #[serde(rename = "topic.kind.update-not-allowed")]
    TopicKindImmutable,
    #[serde(rename = "topic.cannot-update-group-association")]
    TopicGroupImmutable,
    #[serde(rename = "topic.cannot-create-nor-update-under-private-group")]
    TopicPublicUnderPrivateGroup,

    #[serde(rename = "application.not-found")]
    ApplicationNotFound,
    #[serde(rename = "application.exists")]
    ApplicationAlreadyExists,
    #[serde(rename = "application.requires-group-association")]
    ApplicationRequiresGroup,
    #[serde(rename = "application.name.cannot-be-blank-or-null")]
    ApplicationNameBlank,
    #[serde(rename = "application.name.cannot-be-less-than-three-characters")]
    ApplicationNameTooShort,
    #[serde(rename = "application.cannot-create-nor-update-under-private-group")]
    ApplicationPublicUnderPrivateGroup,
    #[serde(rename = "application.grant-token.is-not-valid")]
    GrantTokenInvalid,

    #[serde(rename = "application.permission.not-found")]
    ApplicationPermissionNotFound,
    #[serde(rename = "application.permission.exists")]
    ApplicationPermissionAlreadyExists,
    #[serde(rename = "application.permission.partition.cannot-be-blank")]
    PartitionNameBlank,
    #[serde(rename = "application.permission.partition.requires-matching-access")]
    PartitionWithoutAccess,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::Internal => "internal",
            ErrorCode::UserNotFound => "user.not-found",
            ErrorCode::UserAlreadyExists => "user.exists",
            ErrorCode::UserIsNotValid => "user.is-not-valid",
            ErrorCode::EmailBlank => "email.cannot-be-blank-or-null",
            ErrorCode::EmailInvalidFormat => "email.is-not-format",
            ErrorCode::GroupNotFound => "group.not-found",
            ErrorCode::GroupAlreadyExists => "group.exists",
            ErrorCode::GroupNameBlank => "group.name.cannot-be-blank-or-null",
            ErrorCode::GroupNameTooShort => "group.name.cannot-be-less-than-three-characters",
            ErrorCode::GroupMembershipNotFound => "user.group-membership.not-found",
            ErrorCode::GroupMembershipAlreadyExists => "user.group-membership.exists",
            ErrorCode::TopicNotFound => "topic.not-found",
            ErrorCode::TopicAlreadyExists => "topic.exists",
            ErrorCode::TopicRequiresGroup => "topic.requires-group-association",
            ErrorCode::TopicNameBlank => "topic.name.cannot-be-blank-or-null",
            ErrorCode::TopicNameTooShort => "topic.name.cannot-be-less-than-three-characters",
            ErrorCode::TopicNameImmutable => "topic.name.update-not-allowed",
            ErrorCode::TopicKindImmutable => "topic.kind.update-not-allowed",
            ErrorCode::TopicGroupImmutable => "topic.cannot-update-group-association",
            ErrorCode::TopicPublicUnderPrivateGroup => {
                "topic.cannot-create-nor-update-under-private-group"
            }
            ErrorCode::ApplicationNotFound => "application.not-found",
            ErrorCode::ApplicationAlreadyExists => "application.exists",
            ErrorCode::ApplicationRequiresGroup => "application.requires-group-association",
            ErrorCode::ApplicationNameBlank => "application.name.cannot-be-blank-or-null",
            ErrorCode::ApplicationNameTooShort => {
                "application.name.cannot-be-less-than-three-characters"
            }
            ErrorCode::ApplicationPublicUnderPrivateGroup => {
                "application.cannot-create-nor-update-under-private-group"
            }
            ErrorCode::GrantTokenInvalid => "application.grant-token.is-not-valid",
            ErrorCode::ApplicationPermissionNotFound => "application.permission.not-found",
            ErrorCode::ApplicationPermissionAlreadyExists => "application.permission.exists",
            ErrorCode::PartitionNameBlank => "application.permission.partition.cannot-be-blank",
            ErrorCode::PartitionWithoutAccess => {
                "application.permission.partition.requires-matching-access"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DpmError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: Entity, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: Entity },

    #[error("Authentication failed: {code}")]
    Unauthenticated { code: ErrorCode },

    /// Authenticated principal lacks the capability. Carries no detail
    /// about the target resource.
    #[error("Operation not permitted")]
    Forbidden,

    #[error("Invalid input: {code}")]
    InvalidInput { code: ErrorCode },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DpmError {
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        DpmError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(code: ErrorCode) -> Self {
        DpmError::InvalidInput { code }
    }

    /// The machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DpmError::NotFound { entity, .. } => match entity {
                Entity::User => ErrorCode::UserNotFound,
                Entity::Group => ErrorCode::GroupNotFound,
                Entity::GroupMembership => ErrorCode::GroupMembershipNotFound,
                Entity::Topic => ErrorCode::TopicNotFound,
                Entity::Application => ErrorCode::ApplicationNotFound,
                Entity::ApplicationPermission => ErrorCode::ApplicationPermissionNotFound,
            },
            DpmError::AlreadyExists { entity } => match entity {
                Entity::User => ErrorCode::UserAlreadyExists,
                Entity::Group => ErrorCode::GroupAlreadyExists,
                Entity::GroupMembership => ErrorCode::GroupMembershipAlreadyExists,
                Entity::Topic => ErrorCode::TopicAlreadyExists,
                Entity::Application => ErrorCode::ApplicationAlreadyExists,
                Entity::ApplicationPermission => ErrorCode::ApplicationPermissionAlreadyExists,
            },
            DpmError::Unauthenticated { code } | DpmError::InvalidInput { code } => *code,
            DpmError::Forbidden => ErrorCode::Forbidden,
            DpmError::Database(_) | DpmError::Internal(_) => ErrorCode::Internal,
        }
    }
}

pub type DpmResult<T> = Result<T, DpmError>;
