//! The permissions document handed to a DDS application.
//!
//! Write access becomes a `publishes` entry carrying the write
//! partitions, read access a `subscribes` entry carrying the read
//! partitions. Topics are named canonically (`kind.group.name`).

use dpm_core::error::{DpmError, DpmResult};
use dpm_core::models::application_permission::{ApplicationPermission, PartitionDirection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicGrant {
    pub topic: String,
    pub partitions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsDocument {
    pub publishes: Vec<TopicGrant>,
    pub subscribes: Vec<TopicGrant>,
}

/// Result of a conditional document fetch.
#[derive(Debug, Clone)]
pub enum DocumentResponse {
    Modified {
        document: PermissionsDocument,
        etag: String,
    },
    /// The caller's ETag still matches.
    NotModified,
}

impl PermissionsDocument {
    /// Build a document from grants paired with their topic's canonical
    /// name.
    pub fn build<'a, I>(grants: I) -> Self
    where
        I: IntoIterator<Item = (String, &'a ApplicationPermission)>,
    {
        let mut document = Self::default();
        for (topic, grant) in grants {
            let entry = |direction| TopicGrant {
                topic: topic.clone(),
                partitions: grant
                    .partition_names(direction)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            if grant.access.allows(PartitionDirection::Write) {
                document.publishes.push(entry(PartitionDirection::Write));
            }
            if grant.access.allows(PartitionDirection::Read) {
                document.subscribes.push(entry(PartitionDirection::Read));
            }
        }
        document.publishes.sort_by(|a, b| a.topic.cmp(&b.topic));
        document.subscribes.sort_by(|a, b| a.topic.cmp(&b.topic));
        document
    }

    /// Hex SHA-256 of the document's JSON form.
    pub fn etag(&self) -> DpmResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| DpmError::Internal(format!("document encode: {e}")))?;
        Ok(hex::encode(Sha256::digest(&json)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use dpm_core::models::application_permission::{AccessType, Partition};
    use uuid::Uuid;

    use super::*;

    fn grant(access: AccessType, partitions: &[Partition]) -> ApplicationPermission {
        ApplicationPermission {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            topic_id: Uuid::new_v4(),
            access,
            partitions: partitions.iter().cloned().collect::<BTreeSet<_>>(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn read_write_grant_lands_in_both_lists() {
        let g = grant(
            AccessType::ReadWrite,
            &[Partition::read("r1"), Partition::write("w1"), Partition::write("w0")],
        );
        let doc = PermissionsDocument::build([("B.g.pose".to_string(), &g)]);

        assert_eq!(doc.publishes.len(), 1);
        assert_eq!(doc.publishes[0].partitions, vec!["w0", "w1"]);
        assert_eq!(doc.subscribes.len(), 1);
        assert_eq!(doc.subscribes[0].partitions, vec!["r1"]);
    }

    #[test]
    fn entries_are_sorted_by_topic() {
        let a = grant(AccessType::Write, &[]);
        let b = grant(AccessType::Write, &[]);
        let doc = PermissionsDocument::build([
            ("C.g.zeta".to_string(), &a),
            ("B.g.alpha".to_string(), &b),
        ]);
        let topics: Vec<_> = doc.publishes.iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, vec!["B.g.alpha", "C.g.zeta"]);
        assert!(doc.subscribes.is_empty());
    }

    #[test]
    fn etag_tracks_content() {
        let g = grant(AccessType::Read, &[Partition::read("p")]);
        let one = PermissionsDocument::build([("B.g.pose".to_string(), &g)]);
        let same = PermissionsDocument::build([("B.g.pose".to_string(), &g)]);
        let empty = PermissionsDocument::default();

        let etag = one.etag().unwrap();
        assert_eq!(etag.len(), 64);
        assert_eq!(etag, same.etag().unwrap());
        assert_ne!(etag, empty.etag().unwrap());
    }
}
