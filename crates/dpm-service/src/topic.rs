//! Topic lifecycle.
//!
//! A topic's name, kind and owning group are fixed at creation. Only
//! the description and the public flag can change afterwards.

use dpm_core::authz::{Operation, Principal};
use dpm_core::error::{DpmError, DpmResult, Entity, ErrorCode};
use dpm_core::events::{EventSink, ResourceEvent};
use dpm_core::models::normalize_name;
use dpm_core::models::topic::{CreateTopic, Topic, TopicKind, UpdateTopic};
use dpm_core::repository::{
    ApplicationPermissionRepository, GroupRepository, PaginatedResult, Pagination,
    ResourceFilter, Store, TopicRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::access::{load_context, require_view, scope_to_membership};

/// Input for creating a topic.
#[derive(Debug)]
pub struct NewTopic {
    pub group_id: Option<Uuid>,
    pub name: String,
    pub kind: TopicKind,
    pub description: String,
    pub is_public: bool,
}

/// Requested topic changes. Name, kind and group may be echoed back
/// unchanged but never altered.
#[derive(Debug, Default)]
pub struct TopicChanges {
    pub name: Option<String>,
    pub kind: Option<TopicKind>,
    pub group_id: Option<Uuid>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Clone)]
pub struct TopicService<S: Store, E: EventSink> {
    store: S,
    events: E,
}

impl<S: Store, E: EventSink> TopicService<S, E> {
    pub fn new(store: S, events: E) -> Self {
        Self { store, events }
    }

    pub async fn create(&self, principal: &Principal, input: NewTopic) -> DpmResult<Topic> {
        let group_id = input
            .group_id
            .ok_or_else(|| DpmError::invalid(ErrorCode::TopicRequiresGroup))?;
        let name = normalize_name(
            &input.name,
            ErrorCode::TopicNameBlank,
            ErrorCode::TopicNameTooShort,
        )?;
        let group = self.store.groups().get_by_id(group_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::ManageTopic { group_id })?;

        if input.is_public && !group.is_public {
            return Err(DpmError::invalid(ErrorCode::TopicPublicUnderPrivateGroup));
        }
        if self
            .store
            .topics()
            .find_by_name(group_id, &name)
            .await?
            .is_some()
        {
            return Err(DpmError::AlreadyExists {
                entity: Entity::Topic,
            });
        }

        let topic = self
            .store
            .topics()
            .create(CreateTopic {
                group_id,
                name,
                kind: input.kind,
                description: input.description,
                is_public: input.is_public,
            })
            .await?;

        info!(by = %principal.user_id, topic_id = %topic.id, %group_id, "Topic created");
        Ok(topic)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        topic_id: Uuid,
        changes: TopicChanges,
    ) -> DpmResult<Topic> {
        let existing = self.store.topics().get_by_id(topic_id).await?;

        if changes
            .name
            .as_deref()
            .is_some_and(|name| name.trim() != existing.name)
        {
            return Err(DpmError::invalid(ErrorCode::TopicNameImmutable));
        }
        if changes.kind.is_some_and(|kind| kind != existing.kind) {
            return Err(DpmError::invalid(ErrorCode::TopicKindImmutable));
        }
        if changes.group_id.is_some_and(|g| g != existing.group_id) {
            return Err(DpmError::invalid(ErrorCode::TopicGroupImmutable));
        }

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::ManageTopic {
            group_id: existing.group_id,
        })?;

        if changes.is_public == Some(true) {
            let group = self.store.groups().get_by_id(existing.group_id).await?;
            if !group.is_public {
                return Err(DpmError::invalid(ErrorCode::TopicPublicUnderPrivateGroup));
            }
        }

        let topic = self
            .store
            .topics()
            .update(
                topic_id,
                UpdateTopic {
                    description: changes.description,
                    is_public: changes.is_public,
                },
            )
            .await?;

        info!(by = %principal.user_id, %topic_id, "Topic updated");
        self.events.publish(ResourceEvent::TopicUpdated { topic_id });
        Ok(topic)
    }

    /// Delete the topic and every grant on it.
    pub async fn delete(&self, principal: &Principal, topic_id: Uuid) -> DpmResult<()> {
        let existing = self.store.topics().get_by_id(topic_id).await?;

        let ctx = load_context(&self.store, principal).await?;
        ctx.require(&Operation::ManageTopic {
            group_id: existing.group_id,
        })?;

        let grantees = self
            .store
            .permissions()
            .application_ids_for_topics(&[topic_id])
            .await?;

        self.store.topics().delete(topic_id).await?;
        info!(by = %principal.user_id, %topic_id, grants = grantees.len(), "Topic deleted");
        self.events.publish(ResourceEvent::TopicDeleted { topic_id });
        for application_id in grantees {
            self.events
                .publish(ResourceEvent::ApplicationUpdated { application_id });
        }
        Ok(())
    }

    pub async fn get(&self, principal: &Principal, topic_id: Uuid) -> DpmResult<Topic> {
        let topic = self.store.topics().get_by_id(topic_id).await?;
        let ctx = load_context(&self.store, principal).await?;
        require_view(
            &ctx,
            &Operation::ViewTopic {
                group_id: topic.group_id,
                is_public: topic.is_public,
            },
            Entity::Topic,
            topic_id,
        )?;
        Ok(topic)
    }

    /// Site admins see every topic, others the topics of their groups.
    pub async fn list(
        &self,
        principal: &Principal,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<Topic>> {
        let ctx = load_context(&self.store, principal).await?;
        let filter = scope_to_membership(&ctx, filter);
        if filter.group_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(PaginatedResult::empty(&pagination));
        }
        self.store.topics().list(filter, pagination).await
    }
}
