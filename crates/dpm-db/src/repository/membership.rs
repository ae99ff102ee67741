//! SurrealDB implementation of [`MembershipRepository`].

use chrono::{DateTime, Utc};
use dpm_core::error::{DpmResult, Entity};
use dpm_core::models::membership::{CapabilitySet, CreateMembership, GroupMembership};
use dpm_core::repository::{MembershipRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, id_strings, parse_uuid, total_of};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct MembershipRow {
    record_id: String,
    group_id: String,
    user_id: String,
    capabilities: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MembershipRow {
    fn try_into_membership(self) -> Result<GroupMembership, DbError> {
        let bits = u8::try_from(self.capabilities)
            .map_err(|_| DbError::Decode(format!("capability bits {}", self.capabilities)))?;
        Ok(GroupMembership {
            id: parse_uuid(&self.record_id, "membership")?,
            group_id: parse_uuid(&self.group_id, "group")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            capabilities: CapabilitySet::from_bits(bits),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_BY_ID: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('permissions_group_user', $id)";

/// SurrealDB implementation of the group membership store.
#[derive(Clone)]
pub struct SurrealMembershipRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMembershipRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    fn not_found(id: impl ToString) -> DbError {
        DbError::NotFound {
            entity: Entity::GroupMembership,
            id: id.to_string(),
        }
    }

    fn decode(rows: Vec<MembershipRow>) -> Result<Vec<GroupMembership>, DbError> {
        rows.into_iter()
            .map(MembershipRow::try_into_membership)
            .collect()
    }
}

impl<C: Connection> MembershipRepository for SurrealMembershipRepository<C> {
    async fn create(&self, input: CreateMembership) -> DpmResult<GroupMembership> {
        let id_str = Uuid::new_v4().to_string();

        let mut result = self
            .db
            .query(format!(
                "CREATE type::record('permissions_group_user', $id) SET \
                 group_id = $group_id, user_id = $user_id, \
                 capabilities = $capabilities; {SELECT_BY_ID};"
            ))
            .bind(("id", id_str.clone()))
            .bind(("group_id", input.group_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("capabilities", u32::from(input.capabilities.bits())))
            .await
            .map_err(DbError::from)?;
        DbError::from_statements(result.take_errors(), Entity::GroupMembership)?;

        let rows: Vec<MembershipRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(&id_str))?;
        Ok(row.try_into_membership()?)
    }

    async fn get_by_id(&self, id: Uuid) -> DpmResult<GroupMembership> {
        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| Self::not_found(id))?;
        Ok(row.try_into_membership()?)
    }

    async fn find(&self, group_id: Uuid, user_id: Uuid) -> DpmResult<Option<GroupMembership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permissions_group_user \
                 WHERE group_id = $group_id AND user_id = $user_id LIMIT 1",
            )
            .bind(("group_id", group_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        Ok(Self::decode(rows)?.into_iter().next())
    }

    async fn update_capabilities(
        &self,
        id: Uuid,
        capabilities: CapabilitySet,
    ) -> DpmResult<GroupMembership> {
        let result = self
            .db
            .query(format!(
                "UPDATE type::record('permissions_group_user', $id) SET \
                 capabilities = $capabilities, updated_at = time::now(); \
                 {SELECT_BY_ID};"
            ))
            .bind(("id", id.to_string()))
            .bind(("capabilities", u32::from(capabilities.bits())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<MembershipRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| Self::not_found(id))?;
        Ok(row.try_into_membership()?)
    }

    async fn delete(&self, id: Uuid) -> DpmResult<()> {
        self.get_by_id(id).await?;
        self.db
            .query("DELETE type::record('permissions_group_user', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> DpmResult<Vec<GroupMembership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permissions_group_user \
                 WHERE user_id = $user_id ORDER BY created_at ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        Ok(Self::decode(rows)?)
    }

    async fn list_for_group(&self, group_id: Uuid) -> DpmResult<Vec<GroupMembership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permissions_group_user \
                 WHERE group_id = $group_id ORDER BY created_at ASC",
            )
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        Ok(Self::decode(rows)?)
    }

    async fn count_for_user(&self, user_id: Uuid) -> DpmResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM permissions_group_user \
                 WHERE user_id = $user_id GROUP ALL",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(rows))
    }

    async fn list(
        &self,
        group_ids: Option<Vec<Uuid>>,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<GroupMembership>> {
        let where_clause = if group_ids.is_some() {
            "WHERE group_id IN $group_ids"
        } else {
            ""
        };
        let group_ids = id_strings(group_ids.as_deref().unwrap_or_default());

        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM permissions_group_user {where_clause} GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM permissions_group_user \
                 {where_clause} ORDER BY created_at ASC, id ASC LIMIT $limit START $offset;"
            ))
            .bind(("group_ids", group_ids))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<MembershipRow> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: Self::decode(rows)?,
            total: total_of(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
