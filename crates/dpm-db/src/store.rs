//! All SurrealDB repositories bundled behind the core [`Store`] trait.

use dpm_core::repository::Store;
use surrealdb::{Connection, Surreal};

use crate::repository::{
    SurrealApplicationPermissionRepository, SurrealApplicationRepository,
    SurrealGroupRepository, SurrealMembershipRepository, SurrealTopicRepository,
    SurrealUserRepository,
};

/// One SurrealDB connection shared by every repository.
#[derive(Clone)]
pub struct SurrealStore<C: Connection> {
    users: SurrealUserRepository<C>,
    groups: SurrealGroupRepository<C>,
    memberships: SurrealMembershipRepository<C>,
    topics: SurrealTopicRepository<C>,
    applications: SurrealApplicationRepository<C>,
    permissions: SurrealApplicationPermissionRepository<C>,
}

impl<C: Connection> SurrealStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            users: SurrealUserRepository::new(db.clone()),
            groups: SurrealGroupRepository::new(db.clone()),
            memberships: SurrealMembershipRepository::new(db.clone()),
            topics: SurrealTopicRepository::new(db.clone()),
            applications: SurrealApplicationRepository::new(db.clone()),
            permissions: SurrealApplicationPermissionRepository::new(db),
        }
    }
}

impl<C: Connection + Clone> Store for SurrealStore<C> {
    type Users = SurrealUserRepository<C>;
    type Groups = SurrealGroupRepository<C>;
    type Memberships = SurrealMembershipRepository<C>;
    type Topics = SurrealTopicRepository<C>;
    type Applications = SurrealApplicationRepository<C>;
    type Permissions = SurrealApplicationPermissionRepository<C>;

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn groups(&self) -> &Self::Groups {
        &self.groups
    }

    fn memberships(&self) -> &Self::Memberships {
        &self.memberships
    }

    fn topics(&self) -> &Self::Topics {
        &self.topics
    }

    fn applications(&self) -> &Self::Applications {
        &self.applications
    }

    fn permissions(&self) -> &Self::Permissions {
        &self.permissions
    }
}
