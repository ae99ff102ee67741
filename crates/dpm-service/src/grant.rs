//! Permission Grant Engine.
//!
//! A grant gives one application read and/or write access to one topic,
//! optionally narrowed to named partitions. The application is named
//! either by id, in which case the caller's capabilities decide, or by
//! a grant token issued for it.

use dpm_auth::AuthConfig;
use dpm_auth::token::validate_grant_token;
use dpm_core::authz::{GrantTarget, Operation, Principal};
use dpm_core::error::{DpmError, DpmResult, Entity};
use dpm_core::events::{EventSink, ResourceEvent};
use dpm_core::models::application_permission::{
    AccessType, ApplicationPermission, CreateApplicationPermission, Partition, UpdateAccess,
    normalize_partitions,
};
use dpm_core::repository::{
    ApplicationPermissionRepository, ApplicationRepository, GrantScope, PaginatedResult,
    Pagination, PermissionFilter, Store, TopicRepository,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::access::{load_context, require_view};
use crate::document::{DocumentResponse, PermissionsDocument};

/// How a grant request names its application.
#[derive(Debug, Clone)]
pub enum ApplicationRef {
    Id(Uuid),
    /// A grant token issued for the application.
    GrantToken(String),
}

/// Input for creating a grant.
#[derive(Debug)]
pub struct GrantRequest {
    pub application: ApplicationRef,
    pub topic_id: Uuid,
    pub access: AccessType,
    pub partitions: Vec<Partition>,
}

#[derive(Clone)]
pub struct GrantService<S: Store, E: EventSink> {
    store: S,
    events: E,
    auth: AuthConfig,
}

impl<S: Store, E: EventSink> GrantService<S, E> {
    pub fn new(store: S, events: E, auth: AuthConfig) -> Self {
        Self {
            store,
            events,
            auth,
        }
    }

    /// Verify a grant token and return the application it speaks for.
    fn application_from_token(&self, token: &str) -> DpmResult<Uuid> {
        let grant = validate_grant_token(token, &self.auth)?;
        debug!(
            application_id = %grant.application_id(),
            issued_by = %grant.claims().email,
            "Grant token accepted"
        );
        Ok(grant.application_id())
    }

    /// Load both sides of a grant and describe them for the
    /// authorization engine.
    async fn target(
        &self,
        application_id: Uuid,
        topic_id: Uuid,
        token_application_id: Option<Uuid>,
    ) -> DpmResult<GrantTarget> {
        let application = self.store.applications().get_by_id(application_id).await?;
        let topic = self.store.topics().get_by_id(topic_id).await?;
        Ok(GrantTarget {
            application_id: application.id,
            application_group_id: application.group_id,
            topic_group_id: topic.group_id,
            token_application_id,
        })
    }

    pub async fn add_access(
        &self,
        principal: &Principal,
        request: GrantRequest,
    ) -> DpmResult<ApplicationPermission> {
        // 1. Validate the request itself.
        let partitions = normalize_partitions(request.access, request.partitions)?;
        let (application_id, token_application_id) = match &request.application {
            ApplicationRef::Id(id) => (*id, None),
            ApplicationRef::GrantToken(token) => {
                let id = self.application_from_token(token)?;
                (id, Some(id))
            }
        };

        // 2. Resolve both sides and authorize.
        let target = self
            .target(application_id, request.topic_id, token_application_id)
            .await?;
        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::CreatePermission(target))?;

        // 3. One grant per (application, topic).
        if self
            .store
            .permissions()
            .find(application_id, request.topic_id)
            .await?
            .is_some()
        {
            return Err(DpmError::AlreadyExists {
                entity: Entity::ApplicationPermission,
            });
        }

        let permission = self
            .store
            .permissions()
            .create(CreateApplicationPermission {
                application_id,
                topic_id: request.topic_id,
                access: request.access,
                partitions,
            })
            .await?;

        info!(
            by = %principal.user_id,
            permission_id = %permission.id,
            %application_id,
            topic_id = %request.topic_id,
            access = ?request.access,
            "Grant created"
        );
        self.events
            .publish(ResourceEvent::ApplicationUpdated { application_id });
        Ok(permission)
    }

    /// Replace the access type and the whole partition set of a grant.
    pub async fn update_access(
        &self,
        principal: &Principal,
        permission_id: Uuid,
        access: AccessType,
        partitions: Vec<Partition>,
    ) -> DpmResult<ApplicationPermission> {
        let partitions = normalize_partitions(access, partitions)?;
        let existing = self.store.permissions().get_by_id(permission_id).await?;

        let target = self
            .target(existing.application_id, existing.topic_id, None)
            .await?;
        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::UpdatePermission(target))?;

        let permission = self
            .store
            .permissions()
            .update_access(permission_id, UpdateAccess { access, partitions })
            .await?;

        info!(by = %principal.user_id, %permission_id, access = ?access, "Grant updated");
        self.events.publish(ResourceEvent::ApplicationUpdated {
            application_id: existing.application_id,
        });
        Ok(permission)
    }

    /// Delete a grant. A grant token for the grant's application
    /// authorizes the delete on its own.
    pub async fn delete_by_id(
        &self,
        principal: &Principal,
        permission_id: Uuid,
        grant_token: Option<&str>,
    ) -> DpmResult<()> {
        let token_application_id = grant_token
            .map(|token| self.application_from_token(token))
            .transpose()?;
        let existing = self.store.permissions().get_by_id(permission_id).await?;

        let target = self
            .target(
                existing.application_id,
                existing.topic_id,
                token_application_id,
            )
            .await?;
        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::DeletePermission(target))?;

        self.store.permissions().delete(permission_id).await?;

        info!(by = %principal.user_id, %permission_id, "Grant deleted");
        self.events.publish(ResourceEvent::ApplicationUpdated {
            application_id: existing.application_id,
        });
        Ok(())
    }

    pub async fn get(
        &self,
        principal: &Principal,
        permission_id: Uuid,
    ) -> DpmResult<ApplicationPermission> {
        let permission = self.store.permissions().get_by_id(permission_id).await?;
        let target = self
            .target(permission.application_id, permission.topic_id, None)
            .await?;
        let ctx = load_context(&self.store, principal).await?;
        require_view(
            &ctx,
            &Operation::ViewPermission(target),
            Entity::ApplicationPermission,
            permission_id,
        )?;
        Ok(permission)
    }

    /// Grants visible to the principal. Non-admins see grants whose
    /// application or topic belongs to one of their groups.
    pub async fn list(
        &self,
        principal: &Principal,
        application_id: Option<Uuid>,
        topic_id: Option<Uuid>,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<ApplicationPermission>> {
        let ctx = load_context(&self.store, principal).await?;

        let visible_to = if ctx.is_site_admin() {
            None
        } else {
            let groups = ctx.member_group_ids();
            if groups.is_empty() {
                return Ok(PaginatedResult::empty(&pagination));
            }
            Some(GrantScope {
                application_ids: self.store.applications().ids_in_groups(&groups).await?,
                topic_ids: self.store.topics().ids_in_groups(&groups).await?,
            })
        };

        self.store
            .permissions()
            .list(
                PermissionFilter {
                    application_id,
                    topic_id,
                    visible_to,
                },
                pagination,
            )
            .await
    }

    /// Grants of one application. An application the principal can
    /// neither view nor see any grant of is reported as missing.
    pub async fn list_by_application(
        &self,
        principal: &Principal,
        application_id: Uuid,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<ApplicationPermission>> {
        let ctx = load_context(&self.store, principal).await?;
        let visible = match self.store.applications().get_by_id(application_id).await {
            Ok(application) => ctx
                .authorize(&Operation::ViewApplication {
                    group_id: application.group_id,
                    is_public: application.is_public,
                })
                .is_allowed(),
            Err(DpmError::NotFound { .. }) => false,
            Err(err) => return Err(err),
        };

        let page = self
            .list(principal, Some(application_id), None, pagination)
            .await?;
        if !visible && page.total == 0 {
            return Err(DpmError::not_found(Entity::Application, application_id));
        }
        Ok(page)
    }

    /// Grants on one topic, with the same rule for unseen topics.
    pub async fn list_by_topic(
        &self,
        principal: &Principal,
        topic_id: Uuid,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<ApplicationPermission>> {
        let ctx = load_context(&self.store, principal).await?;
        let visible = match self.store.topics().get_by_id(topic_id).await {
            Ok(topic) => ctx
                .authorize(&Operation::ViewTopic {
                    group_id: topic.group_id,
                    is_public: topic.is_public,
                })
                .is_allowed(),
            Err(DpmError::NotFound { .. }) => false,
            Err(err) => return Err(err),
        };

        let page = self.list(principal, None, Some(topic_id), pagination).await?;
        if !visible && page.total == 0 {
            return Err(DpmError::not_found(Entity::Topic, topic_id));
        }
        Ok(page)
    }

    /// The publish/subscribe document for one application.
    ///
    /// When `if_none_match` equals the current ETag the document is not
    /// sent again.
    pub async fn permissions_document(
        &self,
        principal: &Principal,
        application_id: Uuid,
        if_none_match: Option<&str>,
    ) -> DpmResult<DocumentResponse> {
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

        let grants = self
            .store
            .permissions()
            .list_for_application(application_id)
            .await?;
        let mut named = Vec::with_capacity(grants.len());
        for grant in &grants {
            let topic = self.store.topics().get_by_id(grant.topic_id).await?;
            named.push((topic.canonical_name(), grant));
        }

        let document = PermissionsDocument::build(named);
        let etag = document.etag()?;
        if if_none_match == Some(etag.as_str()) {
            return Ok(DocumentResponse::NotModified);
        }
        Ok(DocumentResponse::Modified { document, etag })
    }
}
