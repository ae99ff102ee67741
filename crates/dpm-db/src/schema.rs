//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings and double as record keys. Uniqueness invariants are unique
//! indexes so concurrent inserts cannot both succeed.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE permissions_user SCHEMAFULL;
DEFINE FIELD email ON TABLE permissions_user TYPE string;
DEFINE FIELD is_admin ON TABLE permissions_user TYPE bool DEFAULT false;
DEFINE FIELD permissions_last_updated ON TABLE permissions_user \
    TYPE datetime DEFAULT time::now();
DEFINE FIELD created_at ON TABLE permissions_user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE permissions_user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE permissions_user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_admin ON TABLE permissions_user COLUMNS is_admin;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE permissions_group SCHEMAFULL;
DEFINE FIELD name ON TABLE permissions_group TYPE string;
DEFINE FIELD description ON TABLE permissions_group TYPE string DEFAULT '';
DEFINE FIELD is_public ON TABLE permissions_group TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE permissions_group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE permissions_group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_name ON TABLE permissions_group COLUMNS name UNIQUE;

-- =======================================================================
-- Group memberships (capabilities is a bitmask)
-- =======================================================================
DEFINE TABLE permissions_group_user SCHEMAFULL;
DEFINE FIELD group_id ON TABLE permissions_group_user TYPE string;
DEFINE FIELD user_id ON TABLE permissions_group_user TYPE string;
DEFINE FIELD capabilities ON TABLE permissions_group_user TYPE int \
    DEFAULT 0 ASSERT $value >= 0 AND $value <= 7;
DEFINE FIELD created_at ON TABLE permissions_group_user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE permissions_group_user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_user_pair ON TABLE permissions_group_user \
    COLUMNS group_id, user_id UNIQUE;
DEFINE INDEX idx_group_user_user ON TABLE permissions_group_user \
    COLUMNS user_id;

-- =======================================================================
-- Topics
-- =======================================================================
DEFINE TABLE permissions_topic SCHEMAFULL;
DEFINE FIELD name ON TABLE permissions_topic TYPE string;
DEFINE FIELD kind ON TABLE permissions_topic TYPE string \
    ASSERT $value IN ['B', 'C'];
DEFINE FIELD description ON TABLE permissions_topic TYPE string DEFAULT '';
DEFINE FIELD is_public ON TABLE permissions_topic TYPE bool DEFAULT false;
DEFINE FIELD group_id ON TABLE permissions_topic TYPE string;
DEFINE FIELD created_at ON TABLE permissions_topic TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE permissions_topic TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_topic_group_name ON TABLE permissions_topic \
    COLUMNS group_id, name UNIQUE;

-- =======================================================================
-- Applications
-- =======================================================================
DEFINE TABLE permissions_application SCHEMAFULL;
DEFINE FIELD name ON TABLE permissions_application TYPE string;
DEFINE FIELD description ON TABLE permissions_application TYPE string \
    DEFAULT '';
DEFINE FIELD is_public ON TABLE permissions_application TYPE bool \
    DEFAULT false;
DEFINE FIELD group_id ON TABLE permissions_application TYPE string;
DEFINE FIELD created_at ON TABLE permissions_application TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE permissions_application TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_application_group_name ON TABLE permissions_application \
    COLUMNS group_id, name UNIQUE;

-- =======================================================================
-- Application permission grants
-- =======================================================================
DEFINE TABLE permissions_application_permission SCHEMAFULL;
DEFINE FIELD application_id ON TABLE permissions_application_permission \
    TYPE string;
DEFINE FIELD topic_id ON TABLE permissions_application_permission \
    TYPE string;
DEFINE FIELD permission_read ON TABLE permissions_application_permission \
    TYPE bool DEFAULT false;
DEFINE FIELD permission_write ON TABLE permissions_application_permission \
    TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE permissions_application_permission \
    TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE permissions_application_permission \
    TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_permission_pair ON TABLE permissions_application_permission \
    COLUMNS application_id, topic_id UNIQUE;
DEFINE INDEX idx_permission_topic ON TABLE permissions_application_permission \
    COLUMNS topic_id;

-- =======================================================================
-- Partitions (one table, tagged with direction)
-- =======================================================================
DEFINE TABLE permissions_partition SCHEMAFULL;
DEFINE FIELD permission_id ON TABLE permissions_partition TYPE string;
DEFINE FIELD application_id ON TABLE permissions_partition TYPE string;
DEFINE FIELD topic_id ON TABLE permissions_partition TYPE string;
DEFINE FIELD direction ON TABLE permissions_partition TYPE string \
    ASSERT $value IN ['Read', 'Write'];
DEFINE FIELD name ON TABLE permissions_partition TYPE string;
DEFINE INDEX idx_partition_unique ON TABLE permissions_partition \
    COLUMNS permission_id, direction, name UNIQUE;
DEFINE INDEX idx_partition_application ON TABLE permissions_partition \
    COLUMNS application_id;
DEFINE INDEX idx_partition_topic ON TABLE permissions_partition \
    COLUMNS topic_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
