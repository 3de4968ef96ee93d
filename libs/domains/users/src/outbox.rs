use chrono::Utc;
use serde::Serialize;

use crate::error::{RepoError, RepoResult};
use crate::identity::EntityId;
use crate::models::{OutboxRecord, UserInfo};

/// Aggregate type recorded for user events
pub const USER_AGGREGATE: &str = "user";

/// Mutations of the user aggregate that are published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    Created,
    Updated,
    Deleted,
}

impl UserEvent {
    pub const fn as_str(&self) -> &'static str {
        match self {
            UserEvent::Created => "created",
            UserEvent::Updated => "updated",
            UserEvent::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for UserEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assembles an [`OutboxRecord`]
///
/// # Example
/// ```
/// use domain_users::outbox::OutboxRecordBuilder;
///
/// let record = OutboxRecordBuilder::new("user", "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa")
///     .event_type("created")
///     .payload(&serde_json::json!({ "login_id": "alice" }))
///     .unwrap()
///     .span_context("{}")
///     .build()
///     .unwrap();
///
/// assert_eq!(record.aggregate_type, "user");
/// ```
#[derive(Debug, Clone)]
pub struct OutboxRecordBuilder {
    id: Option<EntityId>,
    aggregate_type: String,
    aggregate_id: String,
    event_type: Option<String>,
    payload: Option<String>,
    span_context: String,
}

impl OutboxRecordBuilder {
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: impl Into<String>) -> Self {
        Self {
            id: None,
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            event_type: None,
            payload: None,
            span_context: "{}".to_string(),
        }
    }

    /// Use a fixed record id instead of a generated one
    pub fn id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Serialize `payload` as JSON
    pub fn payload<T: Serialize + ?Sized>(mut self, payload: &T) -> RepoResult<Self> {
        let json = serde_json::to_string(payload)
            .map_err(|e| {
                RepoError::ServerError(format!("Failed to serialize outbox payload: {}", e))
            })?;
        self.payload = Some(json);
        Ok(self)
    }

    pub fn span_context(mut self, span_context: impl Into<String>) -> Self {
        self.span_context = span_context.into();
        self
    }

    pub fn build(self) -> RepoResult<OutboxRecord> {
        let event_type = self
            .event_type
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                RepoError::ServerError("Outbox record requires an event type".to_string())
            })?;

        if self.aggregate_type.is_empty() || self.aggregate_id.is_empty() {
            return Err(RepoError::ServerError(
                "Outbox record requires an aggregate type and id".to_string(),
            ));
        }

        Ok(OutboxRecord {
            id: self.id.filter(|id| !id.is_nil()).unwrap_or_else(EntityId::new),
            aggregate_type: self.aggregate_type,
            aggregate_id: self.aggregate_id,
            event_type,
            payload: self.payload.unwrap_or_else(|| "{}".to_string()),
            span_context: self.span_context,
            created_at: Utc::now(),
        })
    }
}

/// Record for a mutation of `user`, carrying its snapshot as payload
pub fn user_event(
    event: UserEvent,
    user: &UserInfo,
    span_context: impl Into<String>,
) -> RepoResult<OutboxRecord> {
    OutboxRecordBuilder::new(USER_AGGREGATE, user.id.to_string())
        .event_type(event.as_str())
        .payload(user)?
        .span_context(span_context)
        .build()
}
