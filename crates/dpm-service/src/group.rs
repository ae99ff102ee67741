//! Group lifecycle: create, rename, privacy changes, cascading delete.

use dpm_core::authz::{Operation, Principal};
use dpm_core::error::{DpmError, DpmResult, Entity, ErrorCode};
use dpm_core::events::{EventSink, ResourceEvent};
use dpm_core::models::group::{CreateGroup, Group, UpdateGroup};
use dpm_core::models::membership::Capability;
use dpm_core::models::normalize_name;
use dpm_core::repository::{
    ApplicationPermissionRepository, ApplicationRepository, GroupRepository,
    MembershipRepository, PaginatedResult, Pagination, ResourceFilter, Store, TopicRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::access::{load_context, require_view, scope_to_membership};
use crate::membership::prune_if_orphaned;

/// Input for creating a group.
#[derive(Debug)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub is_public: bool,
}

#[derive(Clone)]
pub struct GroupService<S: Store, E: EventSink> {
    store: S,
    events: E,
}

impl<S: Store, E: EventSink> GroupService<S, E> {
    pub fn new(store: S, events: E) -> Self {
        Self { store, events }
    }

    fn normalize(name: &str) -> DpmResult<String> {
        normalize_name(name, ErrorCode::GroupNameBlank, ErrorCode::GroupNameTooShort)
    }

    /// Fails with `AlreadyExists` when another group has this name.
    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> DpmResult<()> {
        match self.store.groups().get_by_name(name).await {
            Ok(existing) if Some(existing.id) == except => Ok(()),
            Ok(_) => Err(DpmError::AlreadyExists {
                entity: Entity::Group,
            }),
            Err(DpmError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Applications of other groups holding grants on this group's topics.
    async fn foreign_grantees(&self, group_id: Uuid) -> DpmResult<Vec<Uuid>> {
        let topics = self.store.topics().ids_in_groups(&[group_id]).await?;
        let owned = self.store.applications().ids_in_groups(&[group_id]).await?;
        let grantees = self
            .store
            .permissions()
            .application_ids_for_topics(&topics)
            .await?;
        Ok(grantees
            .into_iter()
            .filter(|id| !owned.contains(id))
            .collect())
    }

    pub async fn create(&self, principal: &Principal, input: NewGroup) -> DpmResult<Group> {
        let name = Self::normalize(&input.name)?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::CreateGroup)?;

        self.ensure_name_free(&name, None).await?;
        let group = self
            .store
            .groups()
            .create(CreateGroup {
                name,
                description: input.description,
                is_public: input.is_public,
            })
            .await?;

        info!(by = %principal.user_id, group_id = %group.id, name = %group.name, "Group created");
        Ok(group)
    }

    /// Turning a group private also turns its topics and applications
    /// private.
    pub async fn update(
        &self,
        principal: &Principal,
        group_id: Uuid,
        mut changes: UpdateGroup,
    ) -> DpmResult<Group> {
        changes.name = changes.name.as_deref().map(Self::normalize).transpose()?;
        let existing = self.store.groups().get_by_id(group_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::UpdateGroup { group_id })?;

        if let Some(name) = changes.name.as_deref().filter(|n| *n != existing.name) {
            self.ensure_name_free(name, Some(group_id)).await?;
        }

        let group = self.store.groups().update(group_id, changes).await?;
        info!(by = %principal.user_id, %group_id, "Group updated");
        Ok(group)
    }

    /// Delete the group and everything it owns. Non-admin users left
    /// without any membership are removed afterwards.
    pub async fn delete(&self, principal: &Principal, group_id: Uuid) -> DpmResult<()> {
        self.store.groups().get_by_id(group_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::DeleteGroup { group_id })?;

        let members = self.store.memberships().list_for_group(group_id).await?;
        let foreign_grantees = self.foreign_grantees(group_id).await?;

        self.store.groups().delete(group_id).await?;
        info!(by = %principal.user_id, %group_id, "Group deleted");

        for member in members {
            prune_if_orphaned(&self.store, member.user_id).await?;
        }

        self.events.publish(ResourceEvent::GroupDeleted { group_id });
        for application_id in foreign_grantees {
            self.events
                .publish(ResourceEvent::ApplicationUpdated { application_id });
        }
        Ok(())
    }

    pub async fn get(&self, principal: &Principal, group_id: Uuid) -> DpmResult<Group> {
        let group = self.store.groups().get_by_id(group_id).await?;
        let ctx = load_context(&self.store, principal).await?;
        require_view(&ctx, &Operation::ViewGroup { group_id }, Entity::Group, group_id)?;
        Ok(group)
    }

    /// Site admins see every group, others only their own.
    pub async fn list(
        &self,
        principal: &Principal,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<Group>> {
        let ctx = load_context(&self.store, principal).await?;
        let filter = scope_to_membership(&ctx, filter);
        if filter.group_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(PaginatedResult::empty(&pagination));
        }
        self.store.groups().list(filter, pagination).await
    }

    /// Groups whose name or description contains `text`.
    ///
    /// Site admins search every group. Others search the groups where
    /// they hold `role`, or all of their groups when no role is given;
    /// this is how a caller finds where it may create topics or
    /// applications.
    pub async fn search(
        &self,
        principal: &Principal,
        text: &str,
        role: Option<Capability>,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<Group>> {
        let ctx = load_context(&self.store, principal).await?;
        let text = text.trim();
        let mut filter = ResourceFilter {
            text_contains: (!text.is_empty()).then(|| text.to_string()),
            ..ResourceFilter::default()
        };

        if !ctx.is_site_admin() {
            let group_ids = match role {
                Some(capability) => ctx.group_ids_with(capability),
                None => ctx.member_group_ids(),
            };
            if group_ids.is_empty() {
                return Ok(PaginatedResult::empty(&pagination));
            }
            filter.group_ids = Some(group_ids);
        }
        self.store.groups().list(filter, pagination).await
    }
}
