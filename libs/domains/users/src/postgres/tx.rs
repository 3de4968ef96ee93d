use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{RepoError, RepoResult};
use crate::tx::{Transaction, Transactor, TxHandle};

#[derive(Debug, Clone)]
pub struct PgTransactor {
    db: DatabaseConnection,
}

impl PgTransactor {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Transactor for PgTransactor {
    async fn begin(&self) -> RepoResult<TxHandle> {
        let txn = self.db.begin().await?;
        Ok(Arc::new(PgTransaction {
            id: Uuid::now_v7(),
            inner: Mutex::new(Some(txn)),
        }))
    }
}

/// Open database transaction; `None` once committed or rolled back
#[derive(Debug)]
pub struct PgTransaction {
    id: Uuid,
    pub(crate) inner: Mutex<Option<DatabaseTransaction>>,
}

impl PgTransaction {
    pub(crate) fn from_handle(handle: &TxHandle) -> RepoResult<&PgTransaction> {
        handle
            .as_any()
            .downcast_ref::<PgTransaction>()
            .ok_or_else(|| {
                RepoError::ServerError(
                    "Transaction handle is not a PostgreSQL transaction".to_string(),
                )
            })
    }
}

pub(crate) fn finished() -> RepoError {
    RepoError::ServerError("Transaction already finished".to_string())
}

#[async_trait]
impl Transaction for PgTransaction {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn commit(&self) -> RepoResult<()> {
        let txn = self.inner.lock().await.take().ok_or_else(finished)?;
        txn.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> RepoResult<()> {
        let txn = self.inner.lock().await.take().ok_or_else(finished)?;
        txn.rollback().await?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
