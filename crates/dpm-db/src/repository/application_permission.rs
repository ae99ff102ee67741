//! SurrealDB implementation of [`ApplicationPermissionRepository`].
//!
//! A grant is one `permissions_application_permission` row plus any
//! number of `permissions_partition` rows tagged with a direction.
//! Partition rows carry the grant's application and topic ids so topic
//! and application cascades reach them without a join.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use dpm_core::error::{DpmResult, Entity};
use dpm_core::models::application_permission::{
    AccessType, ApplicationPermission, CreateApplicationPermission, Partition,
    PartitionDirection, UpdateAccess,
};
use dpm_core::repository::{
    ApplicationPermissionRepository, PaginatedResult, Pagination, PermissionFilter,
};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, id_strings, parse_uuid, total_of};
use crate::cascade::CascadeCoordinator;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct PermissionRow {
    record_id: String,
    application_id: String,
    topic_id: String,
    permission_read: bool,
    permission_write: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct GranteeRow {
    application_id: String,
}

#[derive(Debug, SurrealValue)]
struct PartitionRow {
    permission_id: String,
    direction: String,
    name: String,
}

impl PermissionRow {
    fn try_into_permission(
        self,
        partitions: &mut HashMap<String, BTreeSet<Partition>>,
    ) -> Result<ApplicationPermission, DbError> {
        let access = AccessType::from_flags(self.permission_read, self.permission_write)
            .ok_or_else(|| {
                DbError::Decode(format!("grant {} has neither read nor write", self.record_id))
            })?;
        let owned = partitions.remove(&self.record_id).unwrap_or_default();
        Ok(ApplicationPermission {
            id: parse_uuid(&self.record_id, "application permission")?,
            application_id: parse_uuid(&self.application_id, "application")?,
            topic_id: parse_uuid(&self.topic_id, "topic")?,
            access,
            partitions: owned,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Statements inserting the partition rows of grant `$id`.
const INSERT_PARTITIONS: &str = "\
FOR $name IN $read_partitions { \
    CREATE permissions_partition SET permission_id = $id, \
    application_id = $application_id, topic_id = $topic_id, \
    direction = 'Read', name = $name; \
};
FOR $name IN $write_partitions { \
    CREATE permissions_partition SET permission_id = $id, \
    application_id = $application_id, topic_id = $topic_id, \
    direction = 'Write', name = $name; \
};
";

fn split_partitions(partitions: &BTreeSet<Partition>) -> (Vec<String>, Vec<String>) {
    let names = |direction: PartitionDirection| {
        partitions
            .iter()
            .filter(|p| p.direction == direction)
            .map(|p| p.name.clone())
            .collect::<Vec<_>>()
    };
    (
        names(PartitionDirection::Read),
        names(PartitionDirection::Write),
    )
}

/// SurrealDB implementation of the permission grant repository.
#[derive(Clone)]
pub struct SurrealApplicationPermissionRepository<C: Connection> {
    db: Surreal<C>,
    cascade: CascadeCoordinator<C>,
}

impl<C: Connection> SurrealApplicationPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            cascade: CascadeCoordinator::new(db.clone()),
            db,
        }
    }

    fn not_found(id: impl ToString) -> DbError {
        DbError::NotFound {
            entity: Entity::ApplicationPermission,
            id: id.to_string(),
        }
    }

    /// Loads the partitions of the given grants, keyed by grant id.
    async fn partitions_of(
        &self,
        permission_ids: Vec<String>,
    ) -> Result<HashMap<String, BTreeSet<Partition>>, DbError> {
        let mut by_permission: HashMap<String, BTreeSet<Partition>> = HashMap::new();
        if permission_ids.is_empty() {
            return Ok(by_permission);
        }

        let mut result = self
            .db
            .query(
                "SELECT permission_id, direction, name FROM permissions_partition \
                 WHERE permission_id IN $permission_ids",
            )
            .bind(("permission_ids", permission_ids))
            .await?;
        let rows: Vec<PartitionRow> = result.take(0)?;

        for row in rows {
            let direction: PartitionDirection = row.direction.parse().map_err(DbError::Decode)?;
            by_permission
                .entry(row.permission_id)
                .or_default()
                .insert(Partition {
                    direction,
                    name: row.name,
                });
        }
        Ok(by_permission)
    }

    /// Attaches partitions to a batch of grant rows.
    async fn assemble(
        &self,
        rows: Vec<PermissionRow>,
    ) -> Result<Vec<ApplicationPermission>, DbError> {
        let ids = rows.iter().map(|r| r.record_id.clone()).collect();
        let mut partitions = self.partitions_of(ids).await?;
        rows.into_iter()
            .map(|row| row.try_into_permission(&mut partitions))
            .collect()
    }
}

impl<C: Connection> ApplicationPermissionRepository
    for SurrealApplicationPermissionRepository<C>
{
    async fn create(&self, input: CreateApplicationPermission) -> DpmResult<ApplicationPermission> {
        if self.find(input.application_id, input.topic_id).await?.is_some() {
            return Err(DbError::Conflict {
                entity: Entity::ApplicationPermission,
            }
            .into());
        }

        let id = Uuid::new_v4();
        let (read, write) = input.access.to_flags();
        let (read_partitions, write_partitions) = split_partitions(&input.partitions);

        let mut result = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 CREATE type::record('permissions_application_permission', $id) SET \
                 application_id = $application_id, topic_id = $topic_id, \
                 permission_read = $read, permission_write = $write; \
                 {INSERT_PARTITIONS} \
                 COMMIT TRANSACTION;"
            ))
            .bind(("id", id.to_string()))
            .bind(("application_id", input.application_id.to_string()))
            .bind(("topic_id", input.topic_id.to_string()))
            .bind(("read", read))
            .bind(("write", write))
            .bind(("read_partitions", read_partitions))
            .bind(("write_partitions", write_partitions))
            .await
            .map_err(DbError::from)?;

        if let Err(err) =
            DbError::from_statements(result.take_errors(), Entity::ApplicationPermission)
        {
            // The loser of a concurrent create may only see a rollback or
            // a write conflict.
            if self.find(input.application_id, input.topic_id).await?.is_some() {
                return Err(DbError::Conflict {
                    entity: Entity::ApplicationPermission,
                }
                .into());
            }
            return Err(err.into());
        }

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> DpmResult<ApplicationPermission> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM \
                 type::record('permissions_application_permission', $id)",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let permission = self
            .assemble(rows)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(id))?;
        Ok(permission)
    }

    async fn find(
        &self,
        application_id: Uuid,
        topic_id: Uuid,
    ) -> DpmResult<Option<ApplicationPermission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permissions_application_permission \
                 WHERE application_id = $application_id AND topic_id = $topic_id LIMIT 1",
            )
            .bind(("application_id", application_id.to_string()))
            .bind(("topic_id", topic_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        Ok(self.assemble(rows).await?.into_iter().next())
    }

    async fn update_access(
        &self,
        id: Uuid,
        input: UpdateAccess,
    ) -> DpmResult<ApplicationPermission> {
        let existing = self.get_by_id(id).await?;
        let (read, write) = input.access.to_flags();
        let (read_partitions, write_partitions) = split_partitions(&input.partitions);

        self.db
            .query(format!(
                "BEGIN TRANSACTION; \
                 UPDATE type::record('permissions_application_permission', $id) SET \
                 permission_read = $read, permission_write = $write, \
                 updated_at = time::now(); \
                 DELETE permissions_partition WHERE permission_id = $id; \
                 {INSERT_PARTITIONS} \
                 COMMIT TRANSACTION;"
            ))
            .bind(("id", id.to_string()))
            .bind(("application_id", existing.application_id.to_string()))
            .bind(("topic_id", existing.topic_id.to_string()))
            .bind(("read", read))
            .bind(("write", write))
            .bind(("read_partitions", read_partitions))
            .bind(("write_partitions", write_partitions))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> DpmResult<()> {
        self.get_by_id(id).await?;
        self.cascade.delete_permission(id).await?;
        Ok(())
    }

    async fn list(
        &self,
        filter: PermissionFilter,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<ApplicationPermission>> {
        let mut clauses = Vec::new();
        if filter.application_id.is_some() {
            clauses.push("application_id = $application_id");
        }
        if filter.topic_id.is_some() {
            clauses.push("topic_id = $topic_id");
        }
        if filter.visible_to.is_some() {
            clauses.push("(application_id IN $scope_applications OR topic_id IN $scope_topics)");
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let scope = filter.visible_to.unwrap_or_default();

        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM permissions_application_permission \
                 {where_clause} GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM permissions_application_permission \
                 {where_clause} ORDER BY created_at ASC, id ASC LIMIT $limit START $offset;"
            ))
            .bind((
                "application_id",
                filter.application_id.map(|id| id.to_string()).unwrap_or_default(),
            ))
            .bind((
                "topic_id",
                filter.topic_id.map(|id| id.to_string()).unwrap_or_default(),
            ))
            .bind(("scope_applications", id_strings(&scope.application_ids)))
            .bind(("scope_topics", id_strings(&scope.topic_ids)))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<PermissionRow> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: self.assemble(rows).await?,
            total: total_of(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_for_application(
        &self,
        application_id: Uuid,
    ) -> DpmResult<Vec<ApplicationPermission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permissions_application_permission \
                 WHERE application_id = $application_id ORDER BY created_at ASC",
            )
            .bind(("application_id", application_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        Ok(self.assemble(rows).await?)
    }

    async fn application_ids_for_topics(&self, topic_ids: &[Uuid]) -> DpmResult<Vec<Uuid>> {
        if topic_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut result = self
            .db
            .query(
                "SELECT application_id FROM permissions_application_permission \
                 WHERE topic_id IN $topic_ids GROUP BY application_id",
            )
            .bind(("topic_ids", id_strings(topic_ids)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GranteeRow> = result.take(0).map_err(DbError::from)?;
        let ids = rows
            .iter()
            .map(|r| parse_uuid(&r.application_id, "application"))
            .collect::<Result<BTreeSet<_>, DbError>>()?;
        Ok(ids.into_iter().collect())
    }
}
