use concierge_auth::{ManagerProfile, User};

use super::error::ServiceError;

/// The authenticated dashboard user a request acts as.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub manager: ManagerProfile,
    pub is_super_admin: bool,
}

impl Actor {
    pub fn new(user: User, manager: ManagerProfile, is_super_admin: bool) -> Self {
        Self {
            user,
            manager,
            is_super_admin,
        }
    }

    pub fn manager_id(&self) -> i64 {
        self.manager.id
    }

    pub fn is_admin(&self) -> bool {
        self.is_super_admin || self.manager.is_admin()
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::forbidden("administrator access required"))
        }
    }

    /// Admins may act on anything; other managers only on rows they own.
    pub fn can_manage(&self, owner_manager_id: Option<i64>) -> bool {
        self.is_admin() || owner_manager_id == Some(self.manager.id)
    }
}
