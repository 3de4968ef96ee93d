//! Transaction port and the unit-of-work guard

use async_trait::async_trait;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RepoResult;

/// A transaction opened by a [`Transactor`]
///
/// `commit` and `rollback` are terminal. Calling either on a finished
/// transaction is an adapter error.
#[async_trait]
pub trait Transaction: Send + Sync + Debug {
    /// Stable identity, used to check that scoped repositories share a handle
    fn id(&self) -> Uuid;

    async fn commit(&self) -> RepoResult<()>;

    async fn rollback(&self) -> RepoResult<()>;

    /// Adapters downcast the handle back to their own type
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle passed to `with_tx` on every repository of a unit of work
pub type TxHandle = Arc<dyn Transaction>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transactor: Send + Sync {
    async fn begin(&self) -> RepoResult<TxHandle>;
}

/// Guard that ends a transaction exactly once
///
/// `commit` and `rollback` consume the guard. If it is dropped without either
/// (a panic, or the owning future being dropped) a rollback is spawned on the
/// current tokio runtime. A failed commit is not followed by a rollback.
#[derive(Debug)]
pub struct UnitOfWork {
    tx: TxHandle,
    done: bool,
}

impl UnitOfWork {
    pub async fn begin<T: Transactor + ?Sized>(transactor: &T) -> RepoResult<Self> {
        let tx = transactor.begin().await?;
        debug!(tx_id = %tx.id(), "Transaction begun");
        Ok(Self { tx, done: false })
    }

    /// Handle to pass to `with_tx`
    pub fn handle(&self) -> TxHandle {
        self.tx.clone()
    }

    pub async fn commit(mut self) -> RepoResult<()> {
        self.done = true;
        self.tx.commit().await?;
        debug!(tx_id = %self.tx.id(), "Transaction committed");
        Ok(())
    }

    pub async fn rollback(mut self) -> RepoResult<()> {
        self.done = true;
        warn!(tx_id = %self.tx.id(), "Rolling back transaction");
        self.tx.rollback().await
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        let tx = self.tx.clone();
        warn!(tx_id = %tx.id(), "Unit of work dropped without commit, rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = tx.rollback().await {
                        warn!(tx_id = %tx.id(), error = %e, "Deferred rollback failed");
                    }
                });
            }
            Err(_) => {
                warn!(tx_id = %tx.id(), "No runtime available for deferred rollback");
            }
        }
    }
}
