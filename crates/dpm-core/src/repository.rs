//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Deletes of parent entities
//! cascade to their dependents atomically; see each trait's `delete`.

use uuid::Uuid;

use crate::error::DpmResult;
use crate::models::{
    application::{Application, CreateApplication, UpdateApplication},
    application_permission::{ApplicationPermission, CreateApplicationPermission, UpdateAccess},
    group::{CreateGroup, Group, UpdateGroup},
    membership::{CapabilitySet, CreateMembership, GroupMembership},
    topic::{CreateTopic, Topic, UpdateTopic},
    user::{CreateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    pub fn empty(pagination: &Pagination) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            offset: pagination.offset,
            limit: pagination.limit,
        }
    }
}

/// Narrows list queries over group-owned resources.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    /// Only resources owned by one of these groups. `None` means any group.
    pub group_ids: Option<Vec<Uuid>>,
    /// Case-insensitive substring match on the name.
    pub name_contains: Option<String>,
    /// Case-insensitive substring match on the name or the description.
    pub text_contains: Option<String>,
    /// Only public resources, or resources owned by one of these groups.
    pub visible_in: Option<Vec<Uuid>>,
}

impl ResourceFilter {
    pub fn in_groups(group_ids: Vec<Uuid>) -> Self {
        Self {
            group_ids: Some(group_ids),
            ..Self::default()
        }
    }
}

/// Narrows permission grant listings.
#[derive(Debug, Clone, Default)]
pub struct PermissionFilter {
    pub application_id: Option<Uuid>,
    pub topic_id: Option<Uuid>,
    /// Only grants whose application or topic is in this scope.
    pub visible_to: Option<GrantScope>,
}

/// Applications and topics a non-admin principal can see.
#[derive(Debug, Clone, Default)]
pub struct GrantScope {
    pub application_ids: Vec<Uuid>,
    pub topic_ids: Vec<Uuid>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = DpmResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = DpmResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = DpmResult<User>> + Send;
    /// Sets the site-wide admin flag and bumps `permissions_last_updated`.
    fn set_admin(&self, id: Uuid, is_admin: bool) -> impl Future<Output = DpmResult<User>> + Send;
    fn touch_permissions(&self, id: Uuid) -> impl Future<Output = DpmResult<()>> + Send;
    /// Removes every membership of the user, then the user, in one
    /// transaction.
    fn delete(&self, id: Uuid) -> impl Future<Output = DpmResult<()>> + Send;
    fn list_admins(
        &self,
        email_contains: Option<String>,
        pagination: Pagination,
    ) -> impl Future<Output = DpmResult<PaginatedResult<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

pub trait GroupRepository: Send + Sync {
    fn create(&self, input: CreateGroup) -> impl Future<Output = DpmResult<Group>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = DpmResult<Group>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = DpmResult<Group>> + Send;
    /// Turning a group private also turns its topics and applications
    /// private, in the same transaction.
    fn update(&self, id: Uuid, input: UpdateGroup)
    -> impl Future<Output = DpmResult<Group>> + Send;
    /// Removes memberships, topics, applications and their grants and
    /// partitions, then the group, in one transaction.
    fn delete(&self, id: Uuid) -> impl Future<Output = DpmResult<()>> + Send;
    fn list(
        &self,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> impl Future<Output = DpmResult<PaginatedResult<Group>>> + Send;
}

// ---------------------------------------------------------------------------
// Group membership store
// ---------------------------------------------------------------------------

pub trait MembershipRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the (group, user) pair is taken.
    fn create(
        &self,
        input: CreateMembership,
    ) -> impl Future<Output = DpmResult<GroupMembership>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = DpmResult<GroupMembership>> + Send;
    fn find(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = DpmResult<Option<GroupMembership>>> + Send;
    fn update_capabilities(
        &self,
        id: Uuid,
        capabilities: CapabilitySet,
    ) -> impl Future<Output = DpmResult<GroupMembership>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = DpmResult<()>> + Send;
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = DpmResult<Vec<GroupMembership>>> + Send;
    fn list_for_group(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = DpmResult<Vec<GroupMembership>>> + Send;
    fn count_for_user(&self, user_id: Uuid) -> impl Future<Output = DpmResult<u64>> + Send;
    /// Lists memberships, restricted to `group_ids` when given.
    fn list(
        &self,
        group_ids: Option<Vec<Uuid>>,
        pagination: Pagination,
    ) -> impl Future<Output = DpmResult<PaginatedResult<GroupMembership>>> + Send;
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

pub trait TopicRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the group already has a topic of
    /// that name.
    fn create(&self, input: CreateTopic) -> impl Future<Output = DpmResult<Topic>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = DpmResult<Topic>> + Send;
    fn find_by_name(
        &self,
        group_id: Uuid,
        name: &str,
    ) -> impl Future<Output = DpmResult<Option<Topic>>> + Send;
    fn update(&self, id: Uuid, input: UpdateTopic)
    -> impl Future<Output = DpmResult<Topic>> + Send;
    /// Removes the topic's grants and their partitions, then the topic,
    /// in one transaction.
    fn delete(&self, id: Uuid) -> impl Future<Output = DpmResult<()>> + Send;
    fn list(
        &self,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> impl Future<Output = DpmResult<PaginatedResult<Topic>>> + Send;
    fn ids_in_groups(
        &self,
        group_ids: &[Uuid],
    ) -> impl Future<Output = DpmResult<Vec<Uuid>>> + Send;
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

pub trait ApplicationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateApplication,
    ) -> impl Future<Output = DpmResult<Application>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = DpmResult<Application>> + Send;
    fn find_by_name(
        &self,
        group_id: Uuid,
        name: &str,
    ) -> impl Future<Output = DpmResult<Option<Application>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateApplication,
    ) -> impl Future<Output = DpmResult<Application>> + Send;
    /// Removes the application's grants and their partitions, then the
    /// application, in one transaction.
    fn delete(&self, id: Uuid) -> impl Future<Output = DpmResult<()>> + Send;
    fn list(
        &self,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> impl Future<Output = DpmResult<PaginatedResult<Application>>> + Send;
    fn ids_in_groups(
        &self,
        group_ids: &[Uuid],
    ) -> impl Future<Output = DpmResult<Vec<Uuid>>> + Send;
}

// ---------------------------------------------------------------------------
// Permission grants
// ---------------------------------------------------------------------------

pub trait ApplicationPermissionRepository: Send + Sync {
    /// Creates the grant and its partitions in one transaction. Fails
    /// with `AlreadyExists` when the (application, topic) pair is taken.
    fn create(
        &self,
        input: CreateApplicationPermission,
    ) -> impl Future<Output = DpmResult<ApplicationPermission>> + Send;
    fn get_by_id(&self, id: Uuid)
    -> impl Future<Output = DpmResult<ApplicationPermission>> + Send;
    fn find(
        &self,
        application_id: Uuid,
        topic_id: Uuid,
    ) -> impl Future<Output = DpmResult<Option<ApplicationPermission>>> + Send;
    /// Replaces the access flags and the whole partition set in one
    /// transaction.
    fn update_access(
        &self,
        id: Uuid,
        input: UpdateAccess,
    ) -> impl Future<Output = DpmResult<ApplicationPermission>> + Send;
    /// Removes the grant and its partitions in one transaction.
    fn delete(&self, id: Uuid) -> impl Future<Output = DpmResult<()>> + Send;
    fn list(
        &self,
        filter: PermissionFilter,
        pagination: Pagination,
    ) -> impl Future<Output = DpmResult<PaginatedResult<ApplicationPermission>>> + Send;
    /// Every grant of one application, unpaginated.
    fn list_for_application(
        &self,
        application_id: Uuid,
    ) -> impl Future<Output = DpmResult<Vec<ApplicationPermission>>> + Send;
    /// Distinct applications holding a grant on any of these topics.
    fn application_ids_for_topics(
        &self,
        topic_ids: &[Uuid],
    ) -> impl Future<Output = DpmResult<Vec<Uuid>>> + Send;
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Bundles one implementation of every repository so services can be
/// generic over a single backend type.
pub trait Store: Clone + Send + Sync + 'static {
    type Users: UserRepository;
    type Groups: GroupRepository;
    type Memberships: MembershipRepository;
    type Topics: TopicRepository;
    type Applications: ApplicationRepository;
    type Permissions: ApplicationPermissionRepository;

    fn users(&self) -> &Self::Users;
    fn groups(&self) -> &Self::Groups;
    fn memberships(&self) -> &Self::Memberships;
    fn topics(&self) -> &Self::Topics;
    fn applications(&self) -> &Self::Applications;
    fn permissions(&self) -> &Self::Permissions;
}
