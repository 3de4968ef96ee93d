//! PostgreSQL adapter on Sea-ORM
//!
//! Repositories run on the pool until re-scoped with `with_tx`, after which
//! every statement goes through the shared [`PgTransaction`].

/// Run `$body` with `$conn` bound to the pool or to the scoped transaction
macro_rules! on_conn {
    ($self:ident, |$conn:ident| $body:expr) => {
        match &$self.tx {
            Some(handle) => {
                let pg = $crate::postgres::PgTransaction::from_handle(handle)?;
                let guard = pg.inner.lock().await;
                let $conn = guard.as_ref().ok_or_else($crate::postgres::tx::finished)?;
                $body
            }
            None => {
                let $conn = &$self.db;
                $body
            }
        }
    };
}

mod outbox;
mod tx;
mod user_info;
mod user_secret;

pub use outbox::PgOutboxRepo;
pub use tx::{PgTransaction, PgTransactor};
pub use user_info::PgUserInfoRepo;
pub use user_secret::PgUserSecretRepo;

use database::common::RetryConfig;
use database::postgres::{check_health, connect_from_config_with_retry, PostgresConfig};
use database::DatabaseError;
use sea_orm::DatabaseConnection;

/// All adapters over one connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open the pool, retrying while the database comes up
    ///
    /// ```ignore
    /// use core_config::FromEnv;
    /// use database::postgres::PostgresConfig;
    /// use domain_users::postgres::PgStore;
    ///
    /// let store = PgStore::connect(PostgresConfig::from_env()?, None).await?;
    /// ```
    pub async fn connect(
        config: PostgresConfig,
        retry: Option<RetryConfig>,
    ) -> Result<Self, DatabaseError> {
        let db = connect_from_config_with_retry(config, retry).await?;
        tracing::info!("Connected users store to PostgreSQL");
        Ok(Self { db })
    }

    pub async fn check_health(&self) -> Result<(), DatabaseError> {
        check_health(&self.db).await
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn transactor(&self) -> PgTransactor {
        PgTransactor::new(self.db.clone())
    }

    pub fn user_info_repo(&self) -> PgUserInfoRepo {
        PgUserInfoRepo::new(self.db.clone())
    }

    pub fn user_secret_repo(&self) -> PgUserSecretRepo {
        PgUserSecretRepo::new(self.db.clone())
    }

    pub fn outbox_repo(&self) -> PgOutboxRepo {
        PgOutboxRepo::new(self.db.clone())
    }
}
