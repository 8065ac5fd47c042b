//! Identity types.
//!
//! The trust layer never authenticates anyone itself. An `Actor` is whatever
//! the identity collaborator reports as the caller, and is used only to fill
//! the actor fields of audit records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a user, as issued by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
    /// Background work such as the expiry sweep.
    System,
}

/// The caller of an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub user_name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId::new(user_id),
            user_name: user_name.into(),
            role,
        }
    }

    /// The actor recorded for unattended maintenance tasks.
    pub fn system() -> Self {
        Self::new("system", "system", Role::System)
    }
}
