//! SurrealDB implementation of [`ApplicationRepository`].

use chrono::{DateTime, Utc};
use dpm_core::error::{DpmResult, Entity};
use dpm_core::models::application::{Application, CreateApplication, UpdateApplication};
use dpm_core::repository::{ApplicationRepository, PaginatedResult, Pagination, ResourceFilter};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, IdRow, id_strings, parse_uuid, resource_where, total_of};
use crate::cascade::CascadeCoordinator;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ApplicationRow {
    record_id: String,
    name: String,
    description: String,
    is_public: bool,
    group_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn try_into_application(self) -> Result<Application, DbError> {
        Ok(Application {
            id: parse_uuid(&self.record_id, "application")?,
            name: self.name,
            description: self.description,
            is_public: self.is_public,
            group_id: parse_uuid(&self.group_id, "group")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_BY_ID: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('permissions_application', $id)";

/// SurrealDB implementation of the Application repository.
#[derive(Clone)]
pub struct SurrealApplicationRepository<C: Connection> {
    db: Surreal<C>,
    cascade: CascadeCoordinator<C>,
}

impl<C: Connection> SurrealApplicationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            cascade: CascadeCoordinator::new(db.clone()),
            db,
        }
    }

    fn not_found(id: impl ToString) -> DbError {
        DbError::NotFound {
            entity: Entity::Application,
            id: id.to_string(),
        }
    }
}

impl<C: Connection> ApplicationRepository for SurrealApplicationRepository<C> {
    async fn create(&self, input: CreateApplication) -> DpmResult<Application> {
        let id_str = Uuid::new_v4().to_string();

        let mut result = self
            .db
            .query(format!(
                "CREATE type::record('permissions_application', $id) SET \
                 name = $name, description = $description, \
                 is_public = $is_public, group_id = $group_id; {SELECT_BY_ID};"
            ))
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("is_public", input.is_public))
            .bind(("group_id", input.group_id.to_string()))
            .await
            .map_err(DbError::from)?;
        DbError::from_statements(result.take_errors(), Entity::Application)?;

        let rows: Vec<ApplicationRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(&id_str))?;
        Ok(row.try_into_application()?)
    }

    async fn get_by_id(&self, id: Uuid) -> DpmResult<Application> {
        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApplicationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| Self::not_found(id))?;
        Ok(row.try_into_application()?)
    }

    async fn find_by_name(&self, group_id: Uuid, name: &str) -> DpmResult<Option<Application>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permissions_application \
                 WHERE group_id = $group_id AND name = $name LIMIT 1",
            )
            .bind(("group_id", group_id.to_string()))
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApplicationRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_application()?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: Uuid, input: UpdateApplication) -> DpmResult<Application> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.group_id.is_some() {
            sets.push("group_id = $group_id");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.is_public.is_some() {
            sets.push("is_public = $is_public");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('permissions_application', $id) SET {}; {SELECT_BY_ID};",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(group_id) = input.group_id {
            builder = builder.bind(("group_id", group_id.to_string()));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(is_public) = input.is_public {
            builder = builder.bind(("is_public", is_public));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        DbError::from_statements(result.take_errors(), Entity::Application)?;

        let rows: Vec<ApplicationRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| Self::not_found(id))?;
        Ok(row.try_into_application()?)
    }

    async fn delete(&self, id: Uuid) -> DpmResult<()> {
        self.get_by_id(id).await?;
        self.cascade.delete_application(id).await?;
        Ok(())
    }

    async fn list(
        &self,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<Application>> {
        let where_clause = resource_where(&filter, "group_id");
        let group_ids = id_strings(filter.group_ids.as_deref().unwrap_or_default());
        let name_contains = filter.name_contains.unwrap_or_default().to_lowercase();
        let text_contains = filter.text_contains.unwrap_or_default().to_lowercase();
        let visible_in = id_strings(filter.visible_in.as_deref().unwrap_or_default());

        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM permissions_application {where_clause} GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM permissions_application {where_clause} \
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
        let rows: Vec<ApplicationRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(ApplicationRow::try_into_application)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn ids_in_groups(&self, group_ids: &[Uuid]) -> DpmResult<Vec<Uuid>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM permissions_application \
                 WHERE group_id IN $group_ids",
            )
            .bind(("group_ids", id_strings(group_ids)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        let ids = rows
            .iter()
            .map(|r| parse_uuid(&r.record_id, "application"))
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(ids)
    }
}
