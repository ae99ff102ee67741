//! Opening the permissions database.
//!
//! The endpoint scheme picks the engine: `ws://host:port` for a
//! SurrealDB server, `mem://` for an in-process store that lives as long
//! as the manager.

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::{info, warn};

/// Root credentials for a remote endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DbCredentials {
    pub username: String,
    pub password: String,
}

/// Where the permissions data lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Omitted for `mem://`, which has no users.
    pub credentials: Option<DbCredentials>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000".into(),
            namespace: "dpm".into(),
            database: "permissions".into(),
            credentials: None,
        }
    }
}

impl DbConfig {
    fn is_embedded(&self) -> bool {
        self.endpoint.starts_with("mem://")
    }
}

/// An open, namespace-selected database handle.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            endpoint = %config.endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Opening permissions database"
        );

        let db = any::connect(config.endpoint.as_str()).await?;

        match &config.credentials {
            Some(credentials) => {
                db.signin(Root {
                    username: credentials.username.clone(),
                    password: credentials.password.clone(),
                })
                .await?;
            }
            None if !config.is_embedded() => {
                warn!(endpoint = %config.endpoint, "No database credentials configured");
            }
            None => {}
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}
