//! Loading a principal's capabilities from the membership store.

use dpm_core::authz::{AccessContext, Decision, GroupCapabilities, Operation, Principal};
use dpm_core::error::{DpmError, DpmResult, Entity};
use dpm_core::repository::{MembershipRepository, ResourceFilter, Store, UserRepository};
use uuid::Uuid;

/// Build the access context for a principal from its memberships.
pub(crate) async fn load_context<S: Store>(
    store: &S,
    principal: &Principal,
) -> DpmResult<AccessContext> {
    let memberships = store.memberships().list_for_user(principal.user_id).await?;
    Ok(AccessContext::new(
        principal.clone(),
        memberships.into_iter().map(|m| (m.group_id, m.capabilities)),
    ))
}

/// Authorize a read of `entity` `id`.
///
/// A denied read reports the resource as missing, the same answer an
/// unknown id gets.
pub(crate) fn require_view(
    ctx: &AccessContext,
    operation: &Operation,
    entity: Entity,
    id: Uuid,
) -> DpmResult<()> {
    ctx.require(operation).map_err(|err| match err {
        DpmError::Forbidden => DpmError::not_found(entity, id),
        other => other,
    })
}

/// Restrict a resource filter to the groups the principal belongs to.
///
/// Site admins keep the filter as given.
pub(crate) fn scope_to_membership(ctx: &AccessContext, mut filter: ResourceFilter) -> ResourceFilter {
    if ctx.is_site_admin() {
        return filter;
    }
    let member_of = ctx.member_group_ids();
    filter.group_ids = Some(match filter.group_ids {
        Some(requested) => requested
            .into_iter()
            .filter(|id| member_of.contains(id))
            .collect(),
        None => member_of,
    });
    filter
}

/// Role Model queries keyed by user id rather than an authenticated
/// principal.
#[derive(Clone)]
pub struct AccessService<S: Store> {
    store: S,
}

impl<S: Store> AccessService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn context(&self, principal: &Principal) -> DpmResult<AccessContext> {
        load_context(&self.store, principal).await
    }

    /// Resolve the stored user into a principal and load its context.
    pub async fn context_for_user(&self, user_id: Uuid) -> DpmResult<AccessContext> {
        let user = self.store.users().get_by_id(user_id).await?;
        let principal = Principal {
            user_id: user.id,
            email: user.email,
            is_admin: user.is_admin,
        };
        self.context(&principal).await
    }

    pub async fn capabilities_of(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> DpmResult<GroupCapabilities> {
        Ok(self
            .context_for_user(user_id)
            .await?
            .capabilities_in(group_id))
    }

    pub async fn authorize(&self, user_id: Uuid, operation: &Operation) -> DpmResult<Decision> {
        Ok(self.context_for_user(user_id).await?.authorize(operation))
    }
}

#[cfg(test)]
mod tests {
    use dpm_core::models::membership::CapabilitySet;

    use super::*;

    fn ctx(is_admin: bool, groups: &[Uuid]) -> AccessContext {
        AccessContext::new(
            Principal {
                user_id: Uuid::new_v4(),
                email: "someone@example.com".into(),
                is_admin,
            },
            groups.iter().map(|g| (*g, CapabilitySet::EMPTY)),
        )
    }

    #[test]
    fn admin_filter_is_untouched() {
        let filter = scope_to_membership(&ctx(true, &[]), ResourceFilter::default());
        assert!(filter.group_ids.is_none());
    }

    #[test]
    fn member_filter_defaults_to_own_groups() {
        let g = Uuid::new_v4();
        let filter = scope_to_membership(&ctx(false, &[g]), ResourceFilter::default());
        assert_eq!(filter.group_ids, Some(vec![g]));
    }

    #[test]
    fn requested_groups_are_intersected() {
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();
        let filter = scope_to_membership(
            &ctx(false, &[mine]),
            ResourceFilter::in_groups(vec![mine, other]),
        );
        assert_eq!(filter.group_ids, Some(vec![mine]));
    }
}
