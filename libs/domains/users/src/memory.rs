//! In-memory storage with snapshot transactions (for development/testing)
//!
//! Transactions are serialized: `begin` waits for the store's writer lock,
//! holds it until commit or rollback, and works on a copy of the committed
//! state that `commit` publishes. Repositories used without a transaction
//! read the committed state and take the writer lock for each write.

use async_trait::async_trait;
use chrono::Utc;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::error::{RepoError, RepoResult};
use crate::identity::EntityId;
use crate::models::{OutboxRecord, UserInfo, UserSecret};
use crate::repository::{OutboxRepo, UserInfoRepo, UserSecretRepo};
use crate::tx::{Transaction, Transactor, TxHandle};

#[derive(Debug, Default, Clone)]
struct State {
    /// Insertion ordered
    users: Vec<UserInfo>,
    secrets: HashMap<EntityId, UserSecret>,
    outbox: Vec<OutboxRecord>,
}

impl State {
    fn live_user(&self, id: EntityId) -> Option<&UserInfo> {
        self.users.iter().find(|u| u.id == id && u.deleted_at.is_none())
    }

    fn login_taken(&self, login_id: &str, except: EntityId) -> bool {
        self.users
            .iter()
            .any(|u| u.deleted_at.is_none() && u.login_id == login_id && u.id != except)
    }
}

/// Transaction counters, for asserting that every unit of work ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxCounts {
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

#[derive(Debug, Default)]
struct TxStats {
    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
}

/// Shared store; repositories created from it see the same data
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    writer: Arc<Mutex<()>>,
    stats: Arc<TxStats>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_info_repo(&self) -> InMemoryUserInfoRepo {
        InMemoryUserInfoRepo {
            scope: Scope::new(self.clone()),
        }
    }

    pub fn user_secret_repo(&self) -> InMemoryUserSecretRepo {
        InMemoryUserSecretRepo {
            scope: Scope::new(self.clone()),
        }
    }

    pub fn outbox_repo(&self) -> InMemoryOutboxRepo {
        InMemoryOutboxRepo {
            scope: Scope::new(self.clone()),
        }
    }

    /// Committed outbox records in write order
    pub async fn outbox_records(&self) -> Vec<OutboxRecord> {
        self.state.read().await.outbox.clone()
    }

    /// Committed secret regardless of soft deletion
    pub async fn stored_secret(&self, id: EntityId) -> Option<UserSecret> {
        self.state.read().await.secrets.get(&id).cloned()
    }

    /// Committed user regardless of soft deletion
    pub async fn stored_user(&self, id: EntityId) -> Option<UserInfo> {
        self.state.read().await.users.iter().find(|u| u.id == id).cloned()
    }

    pub fn tx_counts(&self) -> TxCounts {
        TxCounts {
            begun: self.stats.begun.load(Ordering::SeqCst),
            committed: self.stats.committed.load(Ordering::SeqCst),
            rolled_back: self.stats.rolled_back.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl Transactor for InMemoryStore {
    async fn begin(&self) -> RepoResult<TxHandle> {
        let writer = self.writer.clone().lock_owned().await;
        let state = self.state.read().await.clone();
        self.stats.begun.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(InMemoryTx {
            id: Uuid::now_v7(),
            store: self.clone(),
            working: Mutex::new(Some(Working {
                state,
                _writer: writer,
            })),
        }))
    }
}

/// Working copy plus the writer lock it was taken under
#[derive(Debug)]
struct Working {
    state: State,
    _writer: OwnedMutexGuard<()>,
}

/// Snapshot transaction of an [`InMemoryStore`]
///
/// Dropping it without commit releases the writer lock and discards the copy.
#[derive(Debug)]
pub struct InMemoryTx {
    id: Uuid,
    store: InMemoryStore,
    working: Mutex<Option<Working>>,
}

#[async_trait]
impl Transaction for InMemoryTx {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn commit(&self) -> RepoResult<()> {
        let working = self.working.lock().await.take().ok_or_else(finished)?;
        *self.store.state.write().await = working.state;
        self.store.stats.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> RepoResult<()> {
        self.working.lock().await.take().ok_or_else(finished)?;
        self.store.stats.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn finished() -> RepoError {
    RepoError::ServerError("Transaction already finished".to_string())
}

/// Either the committed state or a transaction's working copy
#[derive(Debug, Clone)]
struct Scope {
    store: InMemoryStore,
    tx: Option<TxHandle>,
}

impl Scope {
    fn new(store: InMemoryStore) -> Self {
        Self { store, tx: None }
    }

    fn scoped(&self, tx: TxHandle) -> Self {
        Self {
            store: self.store.clone(),
            tx: Some(tx),
        }
    }

    fn transaction(handle: &TxHandle) -> RepoResult<&InMemoryTx> {
        handle
            .as_any()
            .downcast_ref::<InMemoryTx>()
            .ok_or_else(|| RepoError::ServerError("Foreign transaction handle".to_string()))
    }

    async fn read<R>(&self, f: impl FnOnce(&State) -> RepoResult<R>) -> RepoResult<R> {
        match &self.tx {
            Some(handle) => {
                let working = Self::transaction(handle)?.working.lock().await;
                f(&working.as_ref().ok_or_else(finished)?.state)
            }
            None => f(&*self.store.state.read().await),
        }
    }

    async fn write<R>(&self, f: impl FnOnce(&mut State) -> RepoResult<R>) -> RepoResult<R> {
        match &self.tx {
            Some(handle) => {
                let mut working = Self::transaction(handle)?.working.lock().await;
                f(&mut working.as_mut().ok_or_else(finished)?.state)
            }
            None => {
                let _writer = self.store.writer.lock().await;
                let mut state = self.store.state.write().await;
                f(&mut state)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryUserInfoRepo {
    scope: Scope,
}

#[async_trait]
impl UserInfoRepo for InMemoryUserInfoRepo {
    fn with_tx(&self, tx: TxHandle) -> Box<dyn UserInfoRepo> {
        Box::new(Self {
            scope: self.scope.scoped(tx),
        })
    }

    async fn list(&self, offset: u64, limit: u64) -> RepoResult<Vec<UserInfo>> {
        self.scope
            .read(|state| {
                Ok(state
                    .users
                    .iter()
                    .filter(|u| u.deleted_at.is_none())
                    .skip(offset as usize)
                    .take(limit as usize)
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn get(&self, id: EntityId) -> RepoResult<UserInfo> {
        self.scope
            .read(|state| state.live_user(id).cloned().ok_or(RepoError::NotFound))
            .await
    }

    async fn get_by_login_id(&self, login_id: &str) -> RepoResult<UserInfo> {
        self.scope
            .read(|state| {
                state
                    .users
                    .iter()
                    .find(|u| u.deleted_at.is_none() && u.login_id == login_id)
                    .cloned()
                    .ok_or(RepoError::NotFound)
            })
            .await
    }

    async fn create(&self, user: UserInfo) -> RepoResult<UserInfo> {
        self.scope
            .write(|state| {
                if state.users.iter().any(|u| u.id == user.id) {
                    return Err(RepoError::Conflict(format!("id '{}' already exists", user.id)));
                }
                if state.login_taken(&user.login_id, user.id) {
                    return Err(RepoError::Conflict(format!(
                        "login_id '{}' already exists",
                        user.login_id
                    )));
                }

                state.users.push(user.clone());
                Ok(user)
            })
            .await
    }

    async fn update(&self, user: UserInfo) -> RepoResult<UserInfo> {
        self.scope
            .write(|state| {
                if state.login_taken(&user.login_id, user.id) {
                    return Err(RepoError::Conflict(format!(
                        "login_id '{}' already exists",
                        user.login_id
                    )));
                }

                let stored = state
                    .users
                    .iter_mut()
                    .find(|u| u.id == user.id && u.deleted_at.is_none())
                    .ok_or(RepoError::NotFound)?;

                stored.login_id = user.login_id;
                stored.role = user.role;
                stored.phone = user.phone;
                stored.email = user.email;
                stored.updated_at = user.updated_at;
                Ok(stored.clone())
            })
            .await
    }

    async fn delete(&self, id: EntityId) -> RepoResult<()> {
        self.scope
            .write(|state| {
                let stored = state
                    .users
                    .iter_mut()
                    .find(|u| u.id == id && u.deleted_at.is_none())
                    .ok_or(RepoError::NotFound)?;
                stored.deleted_at = Some(Utc::now());
                Ok(())
            })
            .await
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryUserSecretRepo {
    scope: Scope,
}

#[async_trait]
impl UserSecretRepo for InMemoryUserSecretRepo {
    fn with_tx(&self, tx: TxHandle) -> Box<dyn UserSecretRepo> {
        Box::new(Self {
            scope: self.scope.scoped(tx),
        })
    }

    async fn get(&self, id: EntityId) -> RepoResult<UserSecret> {
        self.scope
            .read(|state| {
                state
                    .secrets
                    .get(&id)
                    .filter(|s| s.deleted_at.is_none())
                    .cloned()
                    .ok_or(RepoError::NotFound)
            })
            .await
    }

    async fn create(&self, secret: UserSecret) -> RepoResult<()> {
        self.scope
            .write(|state| {
                if state.secrets.contains_key(&secret.id) {
                    return Err(RepoError::Conflict(format!(
                        "secret '{}' already exists",
                        secret.id
                    )));
                }
                state.secrets.insert(secret.id, secret);
                Ok(())
            })
            .await
    }

    async fn update(&self, secret: UserSecret) -> RepoResult<()> {
        self.scope
            .write(|state| {
                let stored = state
                    .secrets
                    .get_mut(&secret.id)
                    .filter(|s| s.deleted_at.is_none())
                    .ok_or(RepoError::NotFound)?;
                stored.passwd_hash = secret.passwd_hash;
                stored.updated_at = secret.updated_at;
                Ok(())
            })
            .await
    }

    async fn delete(&self, id: EntityId) -> RepoResult<()> {
        self.scope
            .write(|state| {
                let stored = state
                    .secrets
                    .get_mut(&id)
                    .filter(|s| s.deleted_at.is_none())
                    .ok_or(RepoError::NotFound)?;
                stored.deleted_at = Some(Utc::now());
                Ok(())
            })
            .await
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryOutboxRepo {
    scope: Scope,
}

#[async_trait]
impl OutboxRepo for InMemoryOutboxRepo {
    fn with_tx(&self, tx: TxHandle) -> Box<dyn OutboxRepo> {
        Box::new(Self {
            scope: self.scope.scoped(tx),
        })
    }

    async fn create(&self, record: OutboxRecord) -> RepoResult<()> {
        self.scope
            .write(|state| {
                if state.outbox.iter().any(|r| r.id == record.id) {
                    return Err(RepoError::Conflict(format!(
                        "outbox record '{}' already exists",
                        record.id
                    )));
                }
                state.outbox.push(record);
                Ok(())
            })
            .await
    }
}
