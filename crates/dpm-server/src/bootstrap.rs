//! Seeding users, groups, topics and applications on start.
//!
//! Everything goes through the regular services acting as a system
//! admin, so the usual validation applies. Anything that already exists
//! is skipped.

use dpm_auth::AuthConfig;
use dpm_core::authz::Principal;
use dpm_core::error::{DpmError, DpmResult};
use dpm_core::events::EventSink;
use dpm_core::models::membership::CapabilitySet;
use dpm_core::models::user::{CreateUser, normalize_email};
use dpm_core::repository::{
    ApplicationRepository, GroupRepository, Store, TopicRepository, UserRepository,
};
use dpm_service::application::NewApplication;
use dpm_service::group::NewGroup;
use dpm_service::membership::NewMember;
use dpm_service::topic::NewTopic;
use dpm_service::{AdminService, ApplicationService, GroupService, MembershipService, TopicService};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{BootstrapConfig, BootstrapGroup};

/// What a seeding run created.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub groups: usize,
    pub memberships: usize,
    pub topics: usize,
    pub applications: usize,
}

fn system_principal() -> Principal {
    Principal {
        user_id: Uuid::nil(),
        email: "bootstrap@localhost".into(),
        is_admin: true,
    }
}

/// Treat `AlreadyExists` as "nothing to do".
fn created<T>(result: DpmResult<T>) -> DpmResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(DpmError::AlreadyExists { entity }) => {
            debug!(%entity, "Already present, skipping");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

pub struct Bootstrapper<S: Store, E: EventSink + Clone> {
    store: S,
    events: E,
    auth: AuthConfig,
    principal: Principal,
}

impl<S: Store, E: EventSink + Clone> Bootstrapper<S, E> {
    pub fn new(store: S, events: E, auth: AuthConfig) -> Self {
        Self {
            store,
            events,
            auth,
            principal: system_principal(),
        }
    }

    pub async fn seed(&self, config: &BootstrapConfig) -> DpmResult<SeedReport> {
        let mut report = SeedReport::default();

        let admins = AdminService::new(self.store.clone());
        for email in &config.admin_users {
            let exists = self.user_exists(email).await?;
            admins.save_admin(&self.principal, email).await?;
            if !exists {
                report.users += 1;
            }
        }

        for email in &config.non_admin_users {
            let email = normalize_email(email)?;
            if !self.user_exists(&email).await? {
                self.store
                    .users()
                    .create(CreateUser {
                        email,
                        is_admin: false,
                    })
                    .await?;
                report.users += 1;
            }
        }

        for group in &config.groups {
            self.seed_group(group, &mut report).await?;
        }

        info!(
            users = report.users,
            groups = report.groups,
            memberships = report.memberships,
            topics = report.topics,
            applications = report.applications,
            "Bootstrap complete"
        );
        Ok(report)
    }

    async fn user_exists(&self, email: &str) -> DpmResult<bool> {
        match self.store.users().get_by_email(email.trim()).await {
            Ok(_) => Ok(true),
            Err(DpmError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn seed_group(&self, seed: &BootstrapGroup, report: &mut SeedReport) -> DpmResult<()> {
        // 1. The group itself, reusing an existing one of the same name.
        let group_id = match self.store.groups().get_by_name(seed.name.trim()).await {
            Ok(existing) => existing.id,
            Err(DpmError::NotFound { .. }) => {
                report.groups += 1;
                GroupService::new(self.store.clone(), self.events.clone())
                    .create(
                        &self.principal,
                        NewGroup {
                            name: seed.name.clone(),
                            description: seed.description.clone(),
                            is_public: seed.is_public,
                        },
                    )
                    .await?
                    .id
            }
            Err(e) => return Err(e),
        };

        // 2. Members.
        let memberships = MembershipService::new(self.store.clone());
        for member in &seed.users {
            let added = created(
                memberships
                    .add_member(
                        &self.principal,
                        NewMember {
                            group_id,
                            email: member.email.clone(),
                            capabilities: CapabilitySet::from_flags(
                                member.group_admin,
                                member.topic_admin,
                                member.application_admin,
                            ),
                        },
                    )
                    .await,
            )?;
            if added {
                report.memberships += 1;
            }
        }

        // 3. Topics.
        let topics = TopicService::new(self.store.clone(), self.events.clone());
        for topic in &seed.topics {
            if self
                .store
                .topics()
                .find_by_name(group_id, topic.name.trim())
                .await?
                .is_some()
            {
                continue;
            }
            topics
                .create(
                    &self.principal,
                    NewTopic {
                        group_id: Some(group_id),
                        name: topic.name.clone(),
                        kind: topic.kind,
                        description: topic.description.clone(),
                        is_public: topic.is_public,
                    },
                )
                .await?;
            report.topics += 1;
        }

        // 4. Applications.
        let applications =
            ApplicationService::new(self.store.clone(), self.events.clone(), self.auth.clone());
        for application in &seed.applications {
            if self
                .store
                .applications()
                .find_by_name(group_id, application.name.trim())
                .await?
                .is_some()
            {
                continue;
            }
            applications
                .create(
                    &self.principal,
                    NewApplication {
                        group_id: Some(group_id),
                        name: application.name.clone(),
                        description: application.description.clone(),
                        is_public: application.is_public,
                    },
                )
                .await?;
            report.applications += 1;
        }

        Ok(())
    }
}
