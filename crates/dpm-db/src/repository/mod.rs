//! SurrealDB repository implementations.

mod application;
mod application_permission;
mod group;
mod membership;
mod topic;
mod user;

pub use application::SurrealApplicationRepository;
pub use application_permission::SurrealApplicationPermissionRepository;
pub use group::SurrealGroupRepository;
pub use membership::SurrealMembershipRepository;
pub use topic::SurrealTopicRepository;
pub use user::SurrealUserRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn total_of(rows: Vec<CountRow>) -> u64 {
    rows.first().map(|r| r.total).unwrap_or(0)
}

/// Row struct for `SELECT meta::id(id) AS record_id` id-only queries.
#[derive(Debug, SurrealValue)]
struct IdRow {
    record_id: String,
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

fn id_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

/// Builds the WHERE clause shared by group-scoped listings. `group_key`
/// is the expression holding the owning group's id.
fn resource_where(filter: &dpm_core::repository::ResourceFilter, group_key: &str) -> String {
    let mut clauses = Vec::new();
    if filter.group_ids.is_some() {
        clauses.push(format!("{group_key} IN $group_ids"));
    }
    if filter.name_contains.is_some() {
        clauses.push("string::contains(string::lowercase(name), $name_contains)".to_string());
    }
    if filter.text_contains.is_some() {
        clauses.push(
            "(string::contains(string::lowercase(name), $text_contains) \
             OR string::contains(string::lowercase(description), $text_contains))"
                .to_string(),
        );
    }
    if filter.visible_in.is_some() {
        clauses.push(format!("(is_public = true OR {group_key} IN $visible_in)"));
    }
    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}
