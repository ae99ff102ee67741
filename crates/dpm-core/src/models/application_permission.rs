//! Application permission grants and their partitions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DpmError, DpmResult, ErrorCode};

/// External view of a grant's read/write flags.
///
/// Persisted as two booleans. `(false, false)` has no representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    Read,
    Write,
    ReadWrite,
}

impl AccessType {
    /// `(permission_read, permission_write)`.
    pub fn to_flags(self) -> (bool, bool) {
        match self {
            AccessType::Read => (true, false),
            AccessType::Write => (false, true),
            AccessType::ReadWrite => (true, true),
        }
    }

    pub fn from_flags(read: bool, write: bool) -> Option<Self> {
        match (read, write) {
            (true, false) => Some(AccessType::Read),
            (false, true) => Some(AccessType::Write),
            (true, true) => Some(AccessType::ReadWrite),
            (false, false) => None,
        }
    }

    pub fn allows(self, direction: PartitionDirection) -> bool {
        let (read, write) = self.to_flags();
        match direction {
            PartitionDirection::Read => read,
            PartitionDirection::Write => write,
        }
    }
}

/// Which side of a grant a partition narrows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum PartitionDirection {
    Read,
    Write,
}

impl PartitionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionDirection::Read => "Read",
            PartitionDirection::Write => "Write",
        }
    }
}

impl fmt::Display for PartitionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Read" => Ok(PartitionDirection::Read),
            "Write" => Ok(PartitionDirection::Write),
            other => Err(format!("unknown partition direction: {other}")),
        }
    }
}

/// A DDS partition a grant is restricted to, in one direction.
/// Identified by (permission, direction, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Partition {
    pub direction: PartitionDirection,
    pub name: String,
}

impl Partition {
    pub fn read(name: impl Into<String>) -> Self {
        Partition {
            direction: PartitionDirection::Read,
            name: name.into(),
        }
    }

    pub fn write(name: impl Into<String>) -> Self {
        Partition {
            direction: PartitionDirection::Write,
            name: name.into(),
        }
    }
}

/// Grant of read and/or write access on one topic to one application.
/// At most one exists per (application, topic) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationPermission {
    pub id: Uuid,
    pub application_id: Uuid,
    pub topic_id: Uuid,
    pub access: AccessType,
    pub partitions: BTreeSet<Partition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationPermission {
    pub fn partition_names(&self, direction: PartitionDirection) -> Vec<&str> {
        self.partitions
            .iter()
            .filter(|p| p.direction == direction)
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplicationPermission {
    pub application_id: Uuid,
    pub topic_id: Uuid,
    pub access: AccessType,
    pub partitions: BTreeSet<Partition>,
}

/// Full replacement of a grant's access type and partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAccess {
    pub access: AccessType,
    pub partitions: BTreeSet<Partition>,
}

/// Trim partition names and check each against the access type.
///
/// A read partition needs read access and a write partition needs
/// write access.
pub fn normalize_partitions<I>(access: AccessType, partitions: I) -> DpmResult<BTreeSet<Partition>>
where
    I: IntoIterator<Item = Partition>,
{
    let mut normalized = BTreeSet::new();
    for partition in partitions {
        let name = partition.name.trim();
        if name.is_empty() {
            return Err(DpmError::invalid(ErrorCode::PartitionNameBlank));
        }
        if !access.allows(partition.direction) {
            return Err(DpmError::invalid(ErrorCode::PartitionWithoutAccess));
        }
        normalized.insert(Partition {
            direction: partition.direction,
            name: name.to_string(),
        });
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_type_round_trips_through_flags() {
        for access in [AccessType::Read, AccessType::Write, AccessType::ReadWrite] {
            let (read, write) = access.to_flags();
            assert_eq!(AccessType::from_flags(read, write), Some(access));
        }
    }

    #[test]
    fn no_access_is_not_representable() {
        assert_eq!(AccessType::from_flags(false, false), None);
    }

    #[test]
    fn access_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&AccessType::ReadWrite).unwrap(),
            "\"READ_WRITE\""
        );
    }

    #[test]
    fn partitions_are_trimmed_and_deduplicated() {
        let set = normalize_partitions(
            AccessType::ReadWrite,
            [
                Partition::read(" p1 "),
                Partition::read("p1"),
                Partition::write("p1"),
            ],
        )
        .unwrap();
        assert_eq!(
            set,
            BTreeSet::from([Partition::read("p1"), Partition::write("p1")])
        );
    }

    #[test]
    fn partition_direction_must_match_access() {
        let err = normalize_partitions(AccessType::Read, [Partition::write("p1")]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PartitionWithoutAccess);

        let err = normalize_partitions(AccessType::Write, [Partition::write("  ")]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PartitionNameBlank);
    }
}
