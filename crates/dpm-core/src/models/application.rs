//! Application domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A DDS participant application owned by one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplication {
    pub group_id: Uuid,
    pub name: String,
    pub description: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateApplication {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    /// Moves the application to another group.
    pub group_id: Option<Uuid>,
}
