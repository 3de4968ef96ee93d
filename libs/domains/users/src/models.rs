use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::UserError;
use crate::identity::EntityId;

/// User roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UserError;

    /// Exact match only: `"Admin"` or `" user"` are not roles
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(UserError::InvalidArgument(format!("Unknown role: '{}'", s))),
        }
    }
}

/// User record, the aggregate root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: EntityId,
    /// Login name, unique among users that are not deleted
    pub login_id: String,
    pub role: Role,
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the user is soft-deleted
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserInfo {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Derived credential belonging to the user with the same id
///
/// Only the hash is ever stored. The type is not serializable.
#[derive(Clone, PartialEq, Eq)]
pub struct UserSecret {
    pub id: EntityId,
    pub passwd_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserSecret {
    pub fn new(id: EntityId, passwd_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            passwd_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

impl std::fmt::Debug for UserSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSecret")
            .field("id", &self.id)
            .field("passwd_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("deleted_at", &self.deleted_at)
            .finish()
    }
}

/// Domain event envelope persisted in the same transaction as the mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: EntityId,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    /// JSON snapshot of the aggregate after the mutation
    pub payload: String,
    /// Serialized trace-context carrier
    pub span_context: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateUser {
    /// Caller-chosen identity; generated when absent or nil
    #[serde(default)]
    pub id: Option<EntityId>,

    #[validate(length(min = 1, max = 20))]
    pub login_id: String,

    /// Role text, validated against [`Role`]
    #[validate(length(min = 1, max = 20))]
    pub role: String,

    #[validate(length(max = 13))]
    #[serde(default)]
    pub phone: String,

    #[validate(length(max = 40))]
    #[serde(default)]
    pub email: String,
}

/// Full replacement of a user's mutable fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUser {
    pub id: EntityId,

    #[validate(length(min = 1, max = 20))]
    pub login_id: String,

    #[validate(length(min = 1, max = 20))]
    pub role: String,

    #[validate(length(max = 13))]
    #[serde(default)]
    pub phone: String,

    #[validate(length(max = 40))]
    #[serde(default)]
    pub email: String,
}
