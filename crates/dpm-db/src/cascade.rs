//! Cascade/consistency coordinator.
//!
//! Every delete of a parent entity removes its dependents and the
//! parent inside one SurrealDB transaction, so either all rows go or
//! none do. Callers check that the parent exists first.

use surrealdb::{Connection, Surreal};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

const DELETE_USER: &str = "\
BEGIN TRANSACTION;
DELETE permissions_group_user WHERE user_id = $id;
DELETE type::record('permissions_user', $id);
COMMIT TRANSACTION;
";

const DELETE_GROUP: &str = "\
BEGIN TRANSACTION;
LET $topics = (SELECT VALUE meta::id(id) FROM permissions_topic \
    WHERE group_id = $id);
LET $applications = (SELECT VALUE meta::id(id) FROM permissions_application \
    WHERE group_id = $id);
DELETE permissions_partition \
    WHERE topic_id IN $topics OR application_id IN $applications;
DELETE permissions_application_permission \
    WHERE topic_id IN $topics OR application_id IN $applications;
DELETE permissions_topic WHERE group_id = $id;
DELETE permissions_application WHERE group_id = $id;
DELETE permissions_group_user WHERE group_id = $id;
DELETE type::record('permissions_group', $id);
COMMIT TRANSACTION;
";

const DELETE_TOPIC: &str = "\
BEGIN TRANSACTION;
DELETE permissions_partition WHERE topic_id = $id;
DELETE permissions_application_permission WHERE topic_id = $id;
DELETE type::record('permissions_topic', $id);
COMMIT TRANSACTION;
";

const DELETE_APPLICATION: &str = "\
BEGIN TRANSACTION;
DELETE permissions_partition WHERE application_id = $id;
DELETE permissions_application_permission WHERE application_id = $id;
DELETE type::record('permissions_application', $id);
COMMIT TRANSACTION;
";

const DELETE_PERMISSION: &str = "\
BEGIN TRANSACTION;
DELETE permissions_partition WHERE permission_id = $id;
DELETE type::record('permissions_application_permission', $id);
COMMIT TRANSACTION;
";

/// Runs the transactional cascade deletes.
#[derive(Clone)]
pub struct CascadeCoordinator<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> CascadeCoordinator<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Memberships in every group, then the user.
    pub async fn delete_user(&self, id: Uuid) -> Result<(), DbError> {
        self.run("user", DELETE_USER, id).await
    }

    /// Partitions and grants touching the group's topics or
    /// applications, the topics and applications themselves, the
    /// group's memberships, then the group.
    pub async fn delete_group(&self, id: Uuid) -> Result<(), DbError> {
        self.run("group", DELETE_GROUP, id).await
    }

    /// Partitions and grants on the topic, then the topic.
    pub async fn delete_topic(&self, id: Uuid) -> Result<(), DbError> {
        self.run("topic", DELETE_TOPIC, id).await
    }

    /// Partitions and grants of the application, then the application.
    pub async fn delete_application(&self, id: Uuid) -> Result<(), DbError> {
        self.run("application", DELETE_APPLICATION, id).await
    }

    /// Partitions of the grant, then the grant.
    pub async fn delete_permission(&self, id: Uuid) -> Result<(), DbError> {
        self.run("application_permission", DELETE_PERMISSION, id).await
    }

    async fn run(&self, entity: &'static str, sql: &'static str, id: Uuid) -> Result<(), DbError> {
        debug!(entity, %id, "Cascading delete");
        self.db
            .query(sql)
            .bind(("id", id.to_string()))
            .await?
            .check()
            .map_err(|e| DbError::Query(format!("cascade delete of {entity} {id}: {e}")))?;
        Ok(())
    }
}
