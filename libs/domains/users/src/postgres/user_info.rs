use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::entity::user_info::{ActiveModel, Column, Entity};
use crate::error::{RepoError, RepoResult};
use crate::identity::EntityId;
use crate::models::UserInfo;
use crate::repository::UserInfoRepo;
use crate::tx::TxHandle;

#[derive(Debug, Clone)]
pub struct PgUserInfoRepo {
    db: DatabaseConnection,
    tx: Option<TxHandle>,
}

impl PgUserInfoRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, tx: None }
    }
}

#[async_trait]
impl UserInfoRepo for PgUserInfoRepo {
    fn with_tx(&self, tx: TxHandle) -> Box<dyn UserInfoRepo> {
        Box::new(Self {
            db: self.db.clone(),
            tx: Some(tx),
        })
    }

    async fn list(&self, offset: u64, limit: u64) -> RepoResult<Vec<UserInfo>> {
        let models = on_conn!(self, |conn| {
            Entity::find()
                .filter(Column::DeletedAt.is_null())
                .order_by_asc(Column::CreatedAt)
                .order_by_asc(Column::Id)
                .offset(offset)
                .limit(limit)
                .all(conn)
                .await?
        });

        models.into_iter().map(UserInfo::try_from).collect()
    }

    async fn get(&self, id: EntityId) -> RepoResult<UserInfo> {
        let model = on_conn!(self, |conn| {
            Entity::find_by_id(*id.as_uuid())
                .filter(Column::DeletedAt.is_null())
                .one(conn)
                .await?
        });

        model.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn get_by_login_id(&self, login_id: &str) -> RepoResult<UserInfo> {
        let model = on_conn!(self, |conn| {
            Entity::find()
                .filter(Column::LoginId.eq(login_id))
                .filter(Column::DeletedAt.is_null())
                .one(conn)
                .await?
        });

        model.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn create(&self, user: UserInfo) -> RepoResult<UserInfo> {
        let active: ActiveModel = user.into();
        let model = on_conn!(self, |conn| active.insert(conn).await?);

        tracing::debug!(user_id = %model.id, "Inserted user_infos row");
        model.try_into()
    }

    async fn update(&self, user: UserInfo) -> RepoResult<UserInfo> {
        let id = *user.id.as_uuid();
        let model = on_conn!(self, |conn| {
            let result = Entity::update_many()
                .col_expr(Column::LoginId, Expr::value(user.login_id))
                .col_expr(Column::Role, Expr::value(user.role.to_string()))
                .col_expr(Column::Phone, Expr::value(user.phone))
                .col_expr(Column::Email, Expr::value(user.email))
                .col_expr(
                    Column::UpdatedAt,
                    Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(user.updated_at)),
                )
                .filter(Column::Id.eq(id))
                .filter(Column::DeletedAt.is_null())
                .exec(conn)
                .await?;

            if result.rows_affected == 0 {
                return Err(RepoError::NotFound);
            }

            Entity::find_by_id(id).one(conn).await?
        });

        model.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn delete(&self, id: EntityId) -> RepoResult<()> {
        let now = sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now());
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

        tracing::debug!(user_id = %id, "Soft-deleted user_infos row");
        Ok(())
    }
}
