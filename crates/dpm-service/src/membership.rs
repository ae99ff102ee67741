//! Group membership management and the per-user permissions summary.

use dpm_core::authz::{GroupCapabilities, Operation, Principal};
use dpm_core::error::{DpmError, DpmResult, Entity, ErrorCode};
use dpm_core::models::membership::{CapabilitySet, CreateMembership, GroupMembership};
use dpm_core::models::user::{CreateUser, normalize_email};
use dpm_core::repository::{
    GroupRepository, MembershipRepository, PaginatedResult, Pagination, Store, UserRepository,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::access::load_context;

/// Input for adding a user to a group.
#[derive(Debug)]
pub struct NewMember {
    pub group_id: Uuid,
    pub email: String,
    pub capabilities: CapabilitySet,
}

/// One line of a user's permissions summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPermissions {
    pub group_id: Uuid,
    pub group_name: String,
    pub capabilities: GroupCapabilities,
}

/// Delete a non-admin user that no longer belongs to any group.
pub(crate) async fn prune_if_orphaned<S: Store>(store: &S, user_id: Uuid) -> DpmResult<bool> {
    let user = match store.users().get_by_id(user_id).await {
        Ok(user) => user,
        Err(DpmError::NotFound { .. }) => return Ok(false),
        Err(e) => return Err(e),
    };
    if user.is_admin || store.memberships().count_for_user(user_id).await? > 0 {
        return Ok(false);
    }
    store.users().delete(user_id).await?;
    info!(%user_id, "Pruned user without memberships");
    Ok(true)
}

#[derive(Clone)]
pub struct MembershipService<S: Store> {
    store: S,
}

impl<S: Store> MembershipService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Add a user, looked up by email and created if missing, to a group.
    pub async fn add_member(
        &self,
        principal: &Principal,
        input: NewMember,
    ) -> DpmResult<GroupMembership> {
        let email = normalize_email(&input.email)?;
        let group = self.store.groups().get_by_id(input.group_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::ManageMembership { group_id: group.id })?;

        let user = match self.store.users().get_by_email(&email).await {
            Ok(user) => user,
            Err(DpmError::NotFound { .. }) => {
                self.store
                    .users()
                    .create(CreateUser {
                        email,
                        is_admin: false,
                    })
                    .await?
            }
            Err(e) => return Err(e),
        };

        if self
            .store
            .memberships()
            .find(group.id, user.id)
            .await?
            .is_some()
        {
            return Err(DpmError::AlreadyExists {
                entity: Entity::GroupMembership,
            });
        }

        let membership = self
            .store
            .memberships()
            .create(CreateMembership {
                group_id: group.id,
                user_id: user.id,
                capabilities: input.capabilities,
            })
            .await?;
        self.store.users().touch_permissions(user.id).await?;

        info!(
            by = %principal.user_id,
            group_id = %group.id,
            user_id = %user.id,
            "Member added"
        );
        Ok(membership)
    }

    /// Replace the capability set of a membership.
    pub async fn update_member(
        &self,
        principal: &Principal,
        membership_id: Uuid,
        capabilities: CapabilitySet,
    ) -> DpmResult<GroupMembership> {
        let existing = self.store.memberships().get_by_id(membership_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::ManageMembership {
            group_id: existing.group_id,
        })?;

        let membership = self
            .store
            .memberships()
            .update_capabilities(membership_id, capabilities)
            .await?;
        self.store.users().touch_permissions(existing.user_id).await?;

        info!(by = %principal.user_id, %membership_id, "Member updated");
        Ok(membership)
    }

    /// Remove a membership. A non-admin user left without groups is
    /// deleted as well.
    pub async fn remove_member(&self, principal: &Principal, membership_id: Uuid) -> DpmResult<()> {
        let existing = self.store.memberships().get_by_id(membership_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::ManageMembership {
            group_id: existing.group_id,
        })?;

        self.store.memberships().delete(membership_id).await?;
        info!(by = %principal.user_id, %membership_id, "Member removed");

        if !prune_if_orphaned(&self.store, existing.user_id).await? {
            self.store
                .users()
                .touch_permissions(existing.user_id)
                .await?;
        }
        Ok(())
    }

    /// Memberships visible to the principal, optionally of one group.
    pub async fn list_members(
        &self,
        principal: &Principal,
        group_id: Option<Uuid>,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<GroupMembership>> {
        let ctx = load_context(&self.store, principal).await?;

        let group_ids = match group_id {
            Some(group_id) => {
                ctx.require(&Operation::ViewGroup { group_id })?;
                Some(vec![group_id])
            }
            None if ctx.is_site_admin() => None,
            None => Some(ctx.member_group_ids()),
        };

        if group_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(PaginatedResult::empty(&pagination));
        }
        self.store.memberships().list(group_ids, pagination).await
    }

    /// The capabilities `user_id` holds in `group_id`.
    pub async fn capabilities_of(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> DpmResult<GroupCapabilities> {
        let user = self.store.users().get_by_id(user_id).await?;
        let membership = self.store.memberships().find(group_id, user_id).await?;
        Ok(GroupCapabilities::resolve(
            user.is_admin,
            membership.map(|m| m.capabilities),
        ))
    }

    /// Capabilities of the principal in every group it belongs to.
    ///
    /// A non-admin without any membership is not a valid user of the
    /// system.
    pub async fn permissions_summary(
        &self,
        principal: &Principal,
    ) -> DpmResult<Vec<GroupPermissions>> {
        let memberships = self
            .store
            .memberships()
            .list_for_user(principal.user_id)
            .await?;

        if memberships.is_empty() && !principal.is_admin {
            return Err(DpmError::Unauthenticated {
                code: ErrorCode::UserIsNotValid,
            });
        }

        let mut summary = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let group = self.store.groups().get_by_id(membership.group_id).await?;
            summary.push(GroupPermissions {
                group_id: group.id,
                group_name: group.name,
                capabilities: GroupCapabilities::resolve(
                    principal.is_admin,
                    Some(membership.capabilities),
                ),
            });
        }
        Ok(summary)
    }
}
