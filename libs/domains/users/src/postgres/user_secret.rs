use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entity::user_secret::{ActiveModel, Column, Entity};
use crate::error::{RepoError, RepoResult};
use crate::identity::EntityId;
use crate::models::UserSecret;
use crate::repository::UserSecretRepo;
use crate::tx::TxHandle;

#[derive(Debug, Clone)]
pub struct PgUserSecretRepo {
    db: DatabaseConnection,
    tx: Option<TxHandle>,
}

impl PgUserSecretRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, tx: None }
    }
}

#[async_trait]
impl UserSecretRepo for PgUserSecretRepo {
    fn with_tx(&self, tx: TxHandle) -> Box<dyn UserSecretRepo> {
        Box::new(Self {
            db: self.db.clone(),
            tx: Some(tx),
        })
    }

    async fn get(&self, id: EntityId) -> RepoResult<UserSecret> {
        let model = on_conn!(self, |conn| {
            Entity::find_by_id(*id.as_uuid())
                .filter(Column::DeletedAt.is_null())
                .one(conn)
                .await?
        });

        model.map(Into::into).ok_or(RepoError::NotFound)
    }

    async fn create(&self, secret: UserSecret) -> RepoResult<()> {
        let active: ActiveModel = secret.into();
        on_conn!(self, |conn| active.insert(conn).await?);
        Ok(())
    }

    async fn update(&self, secret: UserSecret) -> RepoResult<()> {
        let result = on_conn!(self, |conn| {
            Entity::update_many()
                .col_expr(Column::PasswdHash, Expr::value(secret.passwd_hash))
                .col_expr(
                    Column::UpdatedAt,
                    Expr::value(DateTimeWithTimeZone::from(secret.updated_at)),
                )
                .filter(Column::Id.eq(*secret.id.as_uuid()))
                .filter(Column::DeletedAt.is_null())
                .exec(conn)
                .await?
        });

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: EntityId) -> RepoResult<()> {
        let now = DateTimeWithTimeZone::from(Utc::now());
        let result = on_conn!(self, |conn| {
            Entity::update_many()
                .col_expr(Column::DeletedAt, Expr::value(now))
                .filter(Column::Id.eq(*id.as_uuid()))
                .filter(Column::DeletedAt.is_null())
                .exec(conn)
                .await?
        });

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
