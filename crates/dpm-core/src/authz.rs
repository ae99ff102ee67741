//! Role model and authorization engine.
//!
//! Decisions are pure functions of an [`AccessContext`] (the principal
//! plus its memberships) and an [`Operation`]. Nothing here touches
//! storage; callers load the context, ask for a decision, and only then
//! mutate.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DpmError, DpmResult};
use crate::models::membership::{Capability, CapabilitySet};

/// The authenticated identity making a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    /// Site-wide admin flag.
    pub is_admin: bool,
}

/// Capabilities a principal holds in one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupCapabilities {
    pub is_site_admin: bool,
    pub is_group_admin: bool,
    pub is_topic_admin: bool,
    pub is_application_admin: bool,
    pub is_member: bool,
}

impl GroupCapabilities {
    /// Site admin implies everything. Otherwise the membership row for
    /// the group, if any, decides.
    pub fn resolve(is_site_admin: bool, membership: Option<CapabilitySet>) -> Self {
        if is_site_admin {
            return Self {
                is_site_admin: true,
                is_group_admin: true,
                is_topic_admin: true,
                is_application_admin: true,
                is_member: true,
            };
        }
        match membership {
            Some(set) => Self {
                is_site_admin: false,
                is_group_admin: set.contains(Capability::GroupAdmin),
                is_topic_admin: set.contains(Capability::TopicAdmin),
                is_application_admin: set.contains(Capability::ApplicationAdmin),
                is_member: true,
            },
            None => Self::default(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::GroupAdmin => self.is_group_admin,
            Capability::TopicAdmin => self.is_topic_admin,
            Capability::ApplicationAdmin => self.is_application_admin,
        }
    }
}

/// The two groups and the application a grant operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantTarget {
    pub application_id: Uuid,
    pub application_group_id: Uuid,
    pub topic_group_id: Uuid,
    /// Application id carried by a grant token the caller has already
    /// verified.
    pub token_application_id: Option<Uuid>,
}

impl GrantTarget {
    fn proven_by_token(&self) -> bool {
        self.token_application_id == Some(self.application_id)
    }
}

/// Every gated operation, with the group ids needed to decide it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateGroup,
    ListAllGroups,
    DeleteGroup { group_id: Uuid },
    UpdateGroup { group_id: Uuid },
    ViewGroup { group_id: Uuid },
    ManageMembership { group_id: Uuid },
    ManageTopic { group_id: Uuid },
    ViewTopic { group_id: Uuid, is_public: bool },
    ManageApplication { group_id: Uuid },
    MoveApplication { from: Uuid, to: Uuid },
    ViewApplication { group_id: Uuid, is_public: bool },
    IssueGrantToken { group_id: Uuid },
    CreatePermission(GrantTarget),
    UpdatePermission(GrantTarget),
    DeletePermission(GrantTarget),
    ViewPermission(GrantTarget),
    ManageAdmins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    SiteAdminRequired,
    NotAMember,
    MissingCapability(Capability),
    /// The capability is held in the source group but not the target.
    MissingCapabilityInTarget(Capability),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::SiteAdminRequired => f.write_str("site admin required"),
            DenyReason::NotAMember => f.write_str("not a member of the group"),
            DenyReason::MissingCapability(c) => write!(f, "{c} required"),
            DenyReason::MissingCapabilityInTarget(c) => {
                write!(f, "{c} required in the target group")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// A principal together with its group memberships.
#[derive(Debug, Clone)]
pub struct AccessContext {
    principal: Principal,
    memberships: HashMap<Uuid, CapabilitySet>,
}

impl AccessContext {
    pub fn new(
        principal: Principal,
        memberships: impl IntoIterator<Item = (Uuid, CapabilitySet)>,
    ) -> Self {
        Self {
            principal,
            memberships: memberships.into_iter().collect(),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn is_site_admin(&self) -> bool {
        self.principal.is_admin
    }

    pub fn capabilities_in(&self, group_id: Uuid) -> GroupCapabilities {
        GroupCapabilities::resolve(
            self.principal.is_admin,
            self.memberships.get(&group_id).copied(),
        )
    }

    /// Groups the principal belongs to, in a stable order.
    pub fn member_group_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.memberships.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Groups where the principal holds `capability`, in a stable order.
    pub fn group_ids_with(&self, capability: Capability) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .memberships
            .iter()
            .filter(|(_, caps)| caps.contains(capability))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn authorize(&self, operation: &Operation) -> Decision {
        authorize(self, operation)
    }

    /// Like [`authorize`](Self::authorize) but maps a denial to
    /// [`DpmError::Forbidden`].
    pub fn require(&self, operation: &Operation) -> DpmResult<()> {
        match self.authorize(operation) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                debug!(
                    user_id = %self.principal.user_id,
                    ?operation,
                    %reason,
                    "Authorization denied"
                );
                Err(DpmError::Forbidden)
            }
        }
    }

    fn require_member(&self, group_id: Uuid) -> Decision {
        if self.capabilities_in(group_id).is_member {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotAMember)
        }
    }

    fn require_capability(&self, group_id: Uuid, capability: Capability) -> Decision {
        if self.capabilities_in(group_id).has(capability) {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::MissingCapability(capability))
        }
    }
}

/// Decide whether the principal in `ctx` may perform `operation`.
pub fn authorize(ctx: &AccessContext, operation: &Operation) -> Decision {
    if ctx.is_site_admin() {
        return Decision::Allow;
    }

    match *operation {
        Operation::CreateGroup
        | Operation::ListAllGroups
        | Operation::DeleteGroup { .. }
        | Operation::ManageAdmins => Decision::Deny(DenyReason::SiteAdminRequired),

        Operation::UpdateGroup { group_id } | Operation::ManageMembership { group_id } => {
            ctx.require_capability(group_id, Capability::GroupAdmin)
        }

        Operation::ViewGroup { group_id } => ctx.require_member(group_id),

        Operation::ManageTopic { group_id } => {
            ctx.require_capability(group_id, Capability::TopicAdmin)
        }

        Operation::ViewTopic {
            group_id,
            is_public,
        }
        | Operation::ViewApplication {
            group_id,
            is_public,
        } => {
            if is_public {
                Decision::Allow
            } else {
                ctx.require_member(group_id)
            }
        }

        Operation::ManageApplication { group_id } | Operation::IssueGrantToken { group_id } => {
            ctx.require_capability(group_id, Capability::ApplicationAdmin)
        }

        Operation::MoveApplication { from, to } => {
            match ctx.require_capability(from, Capability::ApplicationAdmin) {
                Decision::Allow => {}
                deny => return deny,
            }
            if ctx.capabilities_in(to).is_application_admin {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::MissingCapabilityInTarget(
                    Capability::ApplicationAdmin,
                ))
            }
        }

        Operation::CreatePermission(target) => {
            if target.proven_by_token() {
                Decision::Allow
            } else {
                ctx.require_capability(target.topic_group_id, Capability::TopicAdmin)
            }
        }

        Operation::UpdatePermission(target) => {
            ctx.require_capability(target.topic_group_id, Capability::TopicAdmin)
        }

        Operation::DeletePermission(target) => {
            if target.proven_by_token()
                || ctx
                    .capabilities_in(target.application_group_id)
                    .is_application_admin
            {
                Decision::Allow
            } else {
                ctx.require_capability(target.topic_group_id, Capability::TopicAdmin)
            }
        }

        Operation::ViewPermission(target) => {
            if ctx.capabilities_in(target.application_group_id).is_member {
                Decision::Allow
            } else {
                ctx.require_member(target.topic_group_id)
            }
        }
    }
}
