//! Topic domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// DDS topic kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicKind {
    /// Restricted writers, unrestricted readers.
    B,
    /// Restricted writers, restricted readers.
    C,
}

impl TopicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::B => "B",
            TopicKind::C => "C",
        }
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(TopicKind::B),
            "C" => Ok(TopicKind::C),
            other => Err(format!("unknown topic kind: {other}")),
        }
    }
}

/// A DDS topic owned by one group. Name, kind and group never change
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub name: String,
    pub kind: TopicKind,
    pub description: String,
    pub is_public: bool,
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    /// Name used for the topic in application permission documents:
    /// `<kind>.<group id>.<name>`.
    pub fn canonical_name(&self) -> String {
        format!("{}.{}.{}", self.kind, self.group_id, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTopic {
    pub group_id: Uuid,
    pub name: String,
    pub kind: TopicKind,
    pub description: String,
    pub is_public: bool,
}

/// The mutable part of a topic.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTopic {
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_layout() {
        let group_id = Uuid::new_v4();
        let topic = Topic {
            id: Uuid::new_v4(),
            name: "sensor_data".into(),
            kind: TopicKind::C,
            description: String::new(),
            is_public: false,
            group_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(topic.canonical_name(), format!("C.{group_id}.sensor_data"));
    }

    #[test]
    fn kind_parses_only_known_values() {
        assert_eq!("B".parse::<TopicKind>().unwrap(), TopicKind::B);
        assert!("A".parse::<TopicKind>().is_err());
    }
}
