//! Application lifecycle, moves between groups, and grant token issuance.

use dpm_auth::{AuthConfig, GrantTokenRequest};
use dpm_core::authz::{Operation, Principal};
use dpm_core::error::{DpmError, DpmResult, Entity, ErrorCode};
use dpm_core::events::{EventSink, ResourceEvent};
use dpm_core::models::application::{Application, CreateApplication, UpdateApplication};
use dpm_core::models::normalize_name;
use dpm_core::repository::{
    ApplicationRepository, GroupRepository, PaginatedResult, Pagination, ResourceFilter, Store,
};
use tracing::info;
use uuid::Uuid;

use crate::access::{load_context, require_view, scope_to_membership};

/// Input for creating an application.
#[derive(Debug)]
pub struct NewApplication {
    pub group_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub is_public: bool,
}

#[derive(Clone)]
pub struct ApplicationService<S: Store, E: EventSink> {
    store: S,
    events: E,
    auth: AuthConfig,
}

impl<S: Store, E: EventSink> ApplicationService<S, E> {
    pub fn new(store: S, events: E, auth: AuthConfig) -> Self {
        Self {
            store,
            events,
            auth,
        }
    }

    fn normalize(name: &str) -> DpmResult<String> {
        normalize_name(
            name,
            ErrorCode::ApplicationNameBlank,
            ErrorCode::ApplicationNameTooShort,
        )
    }

    /// Fails with `AlreadyExists` when the group already holds another
    /// application of this name.
    async fn ensure_name_free(
        &self,
        group_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> DpmResult<()> {
        match self.store.applications().find_by_name(group_id, name).await? {
            Some(existing) if Some(existing.id) != except => Err(DpmError::AlreadyExists {
                entity: Entity::Application,
            }),
            _ => Ok(()),
        }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        input: NewApplication,
    ) -> DpmResult<Application> {
        let group_id = input
            .group_id
            .ok_or_else(|| DpmError::invalid(ErrorCode::ApplicationRequiresGroup))?;
        let name = Self::normalize(&input.name)?;
        let group = self.store.groups().get_by_id(group_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::ManageApplication { group_id })?;

        if input.is_public && !group.is_public {
            return Err(DpmError::invalid(
                ErrorCode::ApplicationPublicUnderPrivateGroup,
            ));
        }
        self.ensure_name_free(group_id, &name, None).await?;

        let application = self
            .store
            .applications()
            .create(CreateApplication {
                group_id,
                name,
                description: input.description,
                is_public: input.is_public,
            })
            .await?;

        info!(
            by = %principal.user_id,
            application_id = %application.id,
            %group_id,
            "Application created"
        );
        Ok(application)
    }

    /// Update an application, moving it to another group when
    /// `changes.group_id` names one.
    pub async fn update(
        &self,
        principal: &Principal,
        application_id: Uuid,
        mut changes: UpdateApplication,
    ) -> DpmResult<Application> {
        changes.name = changes.name.as_deref().map(Self::normalize).transpose()?;
        let existing = self.store.applications().get_by_id(application_id).await?;

        // 1. Resolve the destination group.
        let destination = changes.group_id.filter(|g| *g != existing.group_id);
        let group = self
            .store
            .groups()
            .get_by_id(destination.unwrap_or(existing.group_id))
            .await?;

        // 2. Authorize: a move needs application admin on both sides.
        let ctx = load_context(&self.store, principal).await?;
        let operation = match destination {
            Some(to) => Operation::MoveApplication {
                from: existing.group_id,
                to,
            },
            None => Operation::ManageApplication {
                group_id: existing.group_id,
            },
        };
        ctx.require(&operation)?;

        // 3. Validate against the destination group.
        let is_public = changes.is_public.unwrap_or(existing.is_public);
        if is_public && !group.is_public {
            return Err(DpmError::invalid(
                ErrorCode::ApplicationPublicUnderPrivateGroup,
            ));
        }
        let name = changes.name.as_deref().unwrap_or(&existing.name);
        if destination.is_some() || name != existing.name {
            self.ensure_name_free(group.id, name, Some(application_id))
                .await?;
        }

        changes.group_id = destination;
        let application = self
            .store
            .applications()
            .update(application_id, changes)
            .await?;

        info!(by = %principal.user_id, %application_id, "Application updated");
        self.events
            .publish(ResourceEvent::ApplicationUpdated { application_id });
        Ok(application)
    }

    /// Delete the application and every grant it holds.
    pub async fn delete(&self, principal: &Principal, application_id: Uuid) -> DpmResult<()> {
        let existing = self.store.applications().get_by_id(application_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::ManageApplication {
            group_id: existing.group_id,
        })?;

        self.store.applications().delete(application_id).await?;
        info!(by = %principal.user_id, %application_id, "Application deleted");
        self.events
            .publish(ResourceEvent::ApplicationDeleted { application_id });
        Ok(())
    }

    pub async fn get(&self, principal: &Principal, application_id: Uuid) -> DpmResult<Application> {
        let application = self.store.applications().get_by_id(application_id).await?;
        let ctx = load_context(&self.store, principal).await?;
        require_view(
            &ctx,
            &Operation::ViewApplication {
                group_id: application.group_id,
                is_public: application.is_public,
            },
            Entity::Application,
            application_id,
        )?;
        Ok(application)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<Application>> {
        let ctx = load_context(&self.store, principal).await?;
        let filter = scope_to_membership(&ctx, filter);
        if filter.group_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(PaginatedResult::empty(&pagination));
        }
        self.store.applications().list(filter, pagination).await
    }

    /// Issue a signed token that lets its bearer create and delete
    /// grants for this application.
    pub async fn issue_grant_token(
        &self,
        principal: &Principal,
        application_id: Uuid,
    ) -> DpmResult<String> {
        let application = self.store.applications().get_by_id(application_id).await?;
        let group = self.store.groups().get_by_id(application.group_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::IssueGrantToken { group_id: group.id })?;

        let token = dpm_auth::token::issue_grant_token(
            &GrantTokenRequest {
                application_id,
                application_name: application.name,
                group_id: group.id,
                group_name: group.name,
                issued_by: principal.email.clone(),
            },
            &self.auth,
        )?;

        info!(by = %principal.user_id, %application_id, "Grant token issued");
        Ok(token)
    }
}
