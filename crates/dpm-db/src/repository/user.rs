//! SurrealDB implementation of [`UserRepository`].

use chrono::{DateTime, Utc};
use dpm_core::error::{DpmResult, Entity};
use dpm_core::models::user::{CreateUser, User};
use dpm_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid, total_of};
use crate::cascade::CascadeCoordinator;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    email: String,
    is_admin: bool,
    permissions_last_updated: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid(&self.record_id, "user")?,
            email: self.email,
            is_admin: self.is_admin,
            permissions_last_updated: self.permissions_last_updated,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_BY_ID: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('permissions_user', $id)";

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    cascade: CascadeCoordinator<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            cascade: CascadeCoordinator::new(db.clone()),
            db,
        }
    }

    fn not_found(id: impl ToString) -> DbError {
        DbError::NotFound {
            entity: Entity::User,
            id: id.to_string(),
        }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> DpmResult<User> {
        let id_str = Uuid::new_v4().to_string();

        let mut result = self
            .db
            .query(format!(
                "CREATE type::record('permissions_user', $id) SET \
                 email = $email, is_admin = $is_admin; {SELECT_BY_ID};"
            ))
            .bind(("id", id_str.clone()))
            .bind(("email", input.email))
            .bind(("is_admin", input.is_admin))
            .await
            .map_err(DbError::from)?;
        DbError::from_statements(result.take_errors(), Entity::User)?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(&id_str))?;
        Ok(row.try_into_user()?)
    }

    async fn get_by_id(&self, id: Uuid) -> DpmResult<User> {
        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| Self::not_found(id))?;
        Ok(row.try_into_user()?)
    }

    async fn get_by_email(&self, email: &str) -> DpmResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permissions_user \
                 WHERE email = $email LIMIT 1",
            )
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(email))?;
        Ok(row.try_into_user()?)
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> DpmResult<User> {
        let result = self
            .db
            .query(format!(
                "UPDATE type::record('permissions_user', $id) SET \
                 is_admin = $is_admin, \
                 permissions_last_updated = time::now(), \
                 updated_at = time::now(); {SELECT_BY_ID};"
            ))
            .bind(("id", id.to_string()))
            .bind(("is_admin", is_admin))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| Self::not_found(id))?;
        Ok(row.try_into_user()?)
    }

    async fn touch_permissions(&self, id: Uuid) -> DpmResult<()> {
        self.db
            .query(
                "UPDATE type::record('permissions_user', $id) SET \
                 permissions_last_updated = time::now()",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DpmResult<()> {
        self.get_by_id(id).await?;
        self.cascade.delete_user(id).await?;
        Ok(())
    }

    async fn list_admins(
        &self,
        email_contains: Option<String>,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<User>> {
        let where_clause = if email_contains.is_some() {
            "WHERE is_admin = true \
             AND string::contains(string::lowercase(email), $email_contains)"
        } else {
            "WHERE is_admin = true"
        };
        let filter = email_contains.unwrap_or_default().to_lowercase();

        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM permissions_user {where_clause} GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM permissions_user {where_clause} \
                 ORDER BY email ASC LIMIT $limit START $offset;"
            ))
            .bind(("email_contains", filter))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
