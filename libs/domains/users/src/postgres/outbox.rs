use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection};

use crate::entity::outbox::ActiveModel;
use crate::error::RepoResult;
use crate::models::OutboxRecord;
use crate::repository::OutboxRepo;
use crate::tx::TxHandle;

#[derive(Debug, Clone)]
pub struct PgOutboxRepo {
    db: DatabaseConnection,
    tx: Option<TxHandle>,
}

impl PgOutboxRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, tx: None }
    }
}

#[async_trait]
impl OutboxRepo for PgOutboxRepo {
    fn with_tx(&self, tx: TxHandle) -> Box<dyn OutboxRepo> {
        Box::new(Self {
            db: self.db.clone(),
            tx: Some(tx),
        })
    }

    async fn create(&self, record: OutboxRecord) -> RepoResult<()> {
        let active: ActiveModel = record.into();
        let model = on_conn!(self, |conn| active.insert(conn).await?);

        tracing::debug!(
            outbox_id = %model.id,
            aggregate_id = %model.aggregate_id,
            event_type = %model.event_type,
            "Appended outbox record"
        );
        Ok(())
    }
}
