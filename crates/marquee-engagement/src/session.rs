use uuid::Uuid;

use crate::error::{EngagementError, Result};

/// Identity of the acting user, if any. Issued by the authentication layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    user_id: Option<Uuid>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn require_user(&self) -> Result<Uuid> {
        self.user_id.ok_or(EngagementError::Unauthenticated)
    }
}
