//! DPM Service: authorization-gated operations over the store.
//!
//! Every service loads the caller's [`AccessContext`](dpm_core::authz::AccessContext),
//! asks the authorization engine for a decision and only then touches
//! the repositories. Resource events go out after the store commits.

pub mod access;
pub mod admin;
pub mod application;
pub mod document;
pub mod events;
pub mod grant;
pub mod group;
pub mod membership;
pub mod search;
pub mod topic;

pub use access::AccessService;
pub use admin::AdminService;
pub use application::ApplicationService;
pub use document::{DocumentResponse, PermissionsDocument, TopicGrant};
pub use events::{BroadcastEventSink, LogEventSink};
pub use grant::GrantService;
pub use group::GroupService;
pub use membership::MembershipService;
pub use search::{SearchHit, SearchQuery, SearchService};
pub use topic::TopicService;
