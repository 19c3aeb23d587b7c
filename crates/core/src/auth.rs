use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::OrgId;

/// Identity of the member performing a management operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    user_id: Uuid,
    display_name: String,
    org_id: OrgId,
}

impl UserIdentity {
    /// Creates a user identity from authentication and membership data.
    #[must_use]
    pub fn new(user_id: Uuid, display_name: impl Into<String>, org_id: OrgId) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            org_id,
        }
    }

    /// Returns the stable member identifier.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the organization linked to the identity.
    #[must_use]
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }
}
