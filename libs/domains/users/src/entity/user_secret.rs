use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use crate::identity::EntityId;
use crate::models::UserSecret;

/// Sea-ORM Entity for the user_secrets table
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_secrets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub passwd_hash: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for UserSecret {
    fn from(model: Model) -> Self {
        Self {
            id: EntityId::from_uuid(model.id),
            passwd_hash: model.passwd_hash,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
            deleted_at: model.deleted_at.map(Into::into),
        }
    }
}

impl From<UserSecret> for ActiveModel {
    fn from(secret: UserSecret) -> Self {
        ActiveModel {
            id: Set(secret.id.into()),
            passwd_hash: Set(secret.passwd_hash),
            created_at: Set(secret.created_at.into()),
            updated_at: Set(secret.updated_at.into()),
            deleted_at: Set(secret.deleted_at.map(Into::into)),
        }
    }
}
