//! Group membership and group-scoped capabilities.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An elevated right a member can hold inside one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    GroupAdmin,
    TopicAdmin,
    ApplicationAdmin,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::GroupAdmin,
        Capability::TopicAdmin,
        Capability::ApplicationAdmin,
    ];

    const fn bit(self) -> u8 {
        match self {
            Capability::GroupAdmin => 0b001,
            Capability::TopicAdmin => 0b010,
            Capability::ApplicationAdmin => 0b100,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::GroupAdmin => "group-admin",
            Capability::TopicAdmin => "topic-admin",
            Capability::ApplicationAdmin => "application-admin",
        };
        f.write_str(name)
    }
}

/// A set of [`Capability`] values stored as a bitmask.
///
/// Serializes as a list of capability names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<Capability>", from = "Vec<Capability>")]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);
    const MASK: u8 = 0b111;

    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    /// Rebuild a set from its persisted bits. Unknown bits are dropped.
    pub fn from_bits(bits: u8) -> Self {
        CapabilitySet(bits & Self::MASK)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_flags(group_admin: bool, topic_admin: bool, application_admin: bool) -> Self {
        let mut set = Self::EMPTY;
        if group_admin {
            set.insert(Capability::GroupAdmin);
        }
        if topic_admin {
            set.insert(Capability::TopicAdmin);
        }
        if application_admin {
            set.insert(Capability::ApplicationAdmin);
        }
        set
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn remove(&mut self, capability: Capability) {
        self.0 &= !capability.bit();
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// True when the set holds at least one capability.
    pub fn is_elevated(self) -> bool {
        self.0 != 0
    }

    /// True when the set holds `capability` and nothing else.
    pub fn is_exactly(self, capability: Capability) -> bool {
        self.0 == capability.bit()
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(value: Vec<Capability>) -> Self {
        value.into_iter().collect()
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(value: CapabilitySet) -> Self {
        value.iter().collect()
    }
}

/// Ties one user to one group. At most one row exists per
/// (group, user) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembership {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub capabilities: CapabilitySet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub capabilities: CapabilitySet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_capabilities() {
        let set = CapabilitySet::from_flags(false, true, false);
        assert!(set.contains(Capability::TopicAdmin));
        assert!(!set.contains(Capability::GroupAdmin));
        assert!(set.is_exactly(Capability::TopicAdmin));
        assert!(set.is_elevated());
        assert!(!CapabilitySet::EMPTY.is_elevated());
    }

    #[test]
    fn bits_survive_persistence() {
        let set = CapabilitySet::EMPTY
            .with(Capability::GroupAdmin)
            .with(Capability::ApplicationAdmin);
        assert_eq!(CapabilitySet::from_bits(set.bits()), set);
        assert_eq!(CapabilitySet::from_bits(0xff), CapabilitySet::all());
    }

    #[test]
    fn remove_clears_single_capability() {
        let mut set = CapabilitySet::all();
        set.remove(Capability::TopicAdmin);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Capability::GroupAdmin, Capability::ApplicationAdmin]
        );
    }

    #[test]
    fn serializes_as_list() {
        let set = CapabilitySet::EMPTY.with(Capability::TopicAdmin);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[\"TopicAdmin\"]");
        let back: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
