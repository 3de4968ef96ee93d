//! Storage ports
//!
//! Each repository can be re-scoped to a transaction with `with_tx`; every
//! write a service operation performs goes through such a scoped instance so
//! that all of them commit or roll back together.

use async_trait::async_trait;

use crate::error::RepoResult;
use crate::identity::EntityId;
use crate::models::{OutboxRecord, UserInfo, UserSecret};
use crate::tx::TxHandle;

/// Persistence of [`UserInfo`]
///
/// Soft-deleted rows are invisible to every read and write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserInfoRepo: Send + Sync {
    /// Repository bound to `tx`
    fn with_tx(&self, tx: TxHandle) -> Box<dyn UserInfoRepo>;

    /// Users in creation order
    async fn list(&self, offset: u64, limit: u64) -> RepoResult<Vec<UserInfo>>;

    async fn get(&self, id: EntityId) -> RepoResult<UserInfo>;

    async fn get_by_login_id(&self, login_id: &str) -> RepoResult<UserInfo>;

    /// Insert a user; a taken login id is a `Conflict`
    async fn create(&self, user: UserInfo) -> RepoResult<UserInfo>;

    async fn update(&self, user: UserInfo) -> RepoResult<UserInfo>;

    /// Soft delete
    async fn delete(&self, id: EntityId) -> RepoResult<()>;
}

/// Persistence of [`UserSecret`]
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserSecretRepo: Send + Sync {
    fn with_tx(&self, tx: TxHandle) -> Box<dyn UserSecretRepo>;

    async fn get(&self, id: EntityId) -> RepoResult<UserSecret>;

    async fn create(&self, secret: UserSecret) -> RepoResult<()>;

    async fn update(&self, secret: UserSecret) -> RepoResult<()>;

    /// Soft delete
    async fn delete(&self, id: EntityId) -> RepoResult<()>;
}

/// Append-only outbox
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboxRepo: Send + Sync {
    fn with_tx(&self, tx: TxHandle) -> Box<dyn OutboxRepo>;

    async fn create(&self, record: OutboxRecord) -> RepoResult<()>;
}
