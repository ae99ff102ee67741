//! SurrealDB implementation of [`GroupRepository`].

use chrono::{DateTime, Utc};
use dpm_core::error::{DpmError, DpmResult, Entity};
use dpm_core::models::group::{CreateGroup, Group, UpdateGroup};
use dpm_core::repository::{GroupRepository, PaginatedResult, Pagination, ResourceFilter};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::{CountRow, id_strings, parse_uuid, resource_where, total_of};
use crate::cascade::CascadeCoordinator;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct GroupRow {
    record_id: String,
    name: String,
    description: String,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_uuid(&self.record_id, "group")?,
            name: self.name,
            description: self.description,
            is_public: self.is_public,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_BY_ID: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('permissions_group', $id)";

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
    cascade: CascadeCoordinator<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            cascade: CascadeCoordinator::new(db.clone()),
            db,
        }
    }

    fn not_found(id: impl ToString) -> DbError {
        DbError::NotFound {
            entity: Entity::Group,
            id: id.to_string(),
        }
    }

    async fn name_taken_by_other(&self, name: &str, id: Uuid) -> DpmResult<bool> {
        match self.get_by_name(name).await {
            Ok(group) => Ok(group.id != id),
            Err(DpmError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup) -> DpmResult<Group> {
        let id_str = Uuid::new_v4().to_string();

        let mut result = self
            .db
            .query(format!(
                "CREATE type::record('permissions_group', $id) SET \
                 name = $name, description = $description, \
                 is_public = $is_public; {SELECT_BY_ID};"
            ))
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("is_public", input.is_public))
            .await
            .map_err(DbError::from)?;
        DbError::from_statements(result.take_errors(), Entity::Group)?;

        let rows: Vec<GroupRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(&id_str))?;
        Ok(row.try_into_group()?)
    }

    async fn get_by_id(&self, id: Uuid) -> DpmResult<Group> {
        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| Self::not_found(id))?;
        Ok(row.try_into_group()?)
    }

    async fn get_by_name(&self, name: &str) -> DpmResult<Group> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permissions_group \
                 WHERE name = $name LIMIT 1",
            )
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(name))?;
        Ok(row.try_into_group()?)
    }

    async fn update(&self, id: Uuid, input: UpdateGroup) -> DpmResult<Group> {
        self.get_by_id(id).await?;
        let new_name = input.name.clone();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.is_public.is_some() {
            sets.push("is_public = $is_public");
        }
        sets.push("updated_at = time::now()");

        let made_private = input.is_public == Some(false);
        let cascade_private = if made_private {
            "UPDATE permissions_topic SET is_public = false, updated_at = time::now() \
             WHERE group_id = $id AND is_public = true; \
             UPDATE permissions_application SET is_public = false, \
             updated_at = time::now() WHERE group_id = $id AND is_public = true;"
        } else {
            ""
        };

        let query = format!(
            "BEGIN TRANSACTION; \
             UPDATE type::record('permissions_group', $id) SET {}; \
             {cascade_private} \
             COMMIT TRANSACTION;",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(is_public) = input.is_public {
            builder = builder.bind(("is_public", is_public));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        if let Err(err) = DbError::from_statements(result.take_errors(), Entity::Group) {
            // A rename that lost a race may only surface as a rollback or
            // a write conflict.
            if let Some(name) = new_name {
                if !matches!(err, DbError::Conflict { .. })
                    && self.name_taken_by_other(&name, id).await?
                {
                    return Err(DbError::Conflict {
                        entity: Entity::Group,
                    }
                    .into());
                }
            }
            return Err(err.into());
        }

        if made_private {
            info!(group_id = %id, "Group made private, topics and applications follow");
        }

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> DpmResult<()> {
        self.get_by_id(id).await?;
        self.cascade.delete_group(id).await?;
        Ok(())
    }

    async fn list(
        &self,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<Group>> {
        let where_clause = resource_where(&filter, "meta::id(id)");
        let group_ids = id_strings(filter.group_ids.as_deref().unwrap_or_default());
        let name_contains = filter.name_contains.unwrap_or_default().to_lowercase();
        let text_contains = filter.text_contains.unwrap_or_default().to_lowercase();
        let visible_in = id_strings(filter.visible_in.as_deref().unwrap_or_default());

        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM permissions_group {where_clause} GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM permissions_group {where_clause} \
                 ORDER BY name ASC LIMIT $limit START $offset;"
            ))
            .bind(("group_ids", group_ids))
            .bind(("name_contains", name_contains))
            .bind(("text_contains", text_contains))
            .bind(("visible_in", visible_in))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<GroupRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(GroupRow::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
