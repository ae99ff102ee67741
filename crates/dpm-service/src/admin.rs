//! Site admin roster and user removal.

use dpm_core::authz::{AccessContext, Operation, Principal};
use dpm_core::error::{DpmError, DpmResult};
use dpm_core::models::user::{CreateUser, User, normalize_email};
use dpm_core::repository::{
    MembershipRepository, PaginatedResult, Pagination, Store, UserRepository,
};
use tracing::info;
use uuid::Uuid;

/// What `remove_admin` did to the user.
#[derive(Debug, Clone)]
pub enum AdminRemoval {
    /// The user had no memberships left and was deleted.
    Deleted,
    /// The user keeps its memberships and lost the admin flag.
    Demoted(User),
}

/// Manages the site admin roster. Every operation requires a site admin.
#[derive(Clone)]
pub struct AdminService<S: Store> {
    store: S,
}

impl<S: Store> AdminService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn require_admin(principal: &Principal) -> DpmResult<()> {
        AccessContext::new(principal.clone(), std::iter::empty()).require(&Operation::ManageAdmins)
    }

    pub async fn list_admins(
        &self,
        principal: &Principal,
        email_contains: Option<String>,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<User>> {
        Self::require_admin(principal)?;
        self.store
            .users()
            .list_admins(email_contains, pagination)
            .await
    }

    /// Grant site admin to the user with this email, creating the user
    /// when it does not exist yet.
    pub async fn save_admin(&self, principal: &Principal, email: &str) -> DpmResult<User> {
        let email = normalize_email(email)?;
        Self::require_admin(principal)?;

        let user = match self.store.users().get_by_email(&email).await {
            Ok(user) if user.is_admin => return Ok(user),
            Ok(user) => self.store.users().set_admin(user.id, true).await?,
            Err(DpmError::NotFound { .. }) => {
                self.store
                    .users()
                    .create(CreateUser {
                        email,
                        is_admin: true,
                    })
                    .await?
            }
            Err(e) => return Err(e),
        };

        info!(by = %principal.user_id, user_id = %user.id, "Site admin granted");
        Ok(user)
    }

    /// Revoke site admin. A user without memberships has nothing left
    /// and is deleted instead.
    pub async fn remove_admin(
        &self,
        principal: &Principal,
        user_id: Uuid,
    ) -> DpmResult<AdminRemoval> {
        Self::require_admin(principal)?;
        self.store.users().get_by_id(user_id).await?;

        if self.store.memberships().count_for_user(user_id).await? == 0 {
            self.store.users().delete(user_id).await?;
            info!(by = %principal.user_id, %user_id, "Admin removed and deleted");
            return Ok(AdminRemoval::Deleted);
        }

        let user = self.store.users().set_admin(user_id, false).await?;
        info!(by = %principal.user_id, %user_id, "Site admin revoked");
        Ok(AdminRemoval::Demoted(user))
    }

    /// Delete a user together with all of its memberships.
    pub async fn delete_user(&self, principal: &Principal, user_id: Uuid) -> DpmResult<()> {
        Self::require_admin(principal)?;
        self.store.users().delete(user_id).await?;
        info!(by = %principal.user_id, %user_id, "User deleted");
        Ok(())
    }
}
