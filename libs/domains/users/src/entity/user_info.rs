use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use crate::error::RepoError;
use crate::identity::EntityId;
use crate::models::UserInfo;

/// Sea-ORM Entity for the user_infos table
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_infos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub login_id: String,
    pub role: String,
    pub phone: String,
    pub email: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for UserInfo {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        // A role outside the enum means the row was written by something else
        let role = model
            .role
            .parse()
            .map_err(|_| {
                RepoError::ServerError(format!("Stored role '{}' is not recognized", model.role))
            })?;

        Ok(Self {
            id: EntityId::from_uuid(model.id),
            login_id: model.login_id,
            role,
            phone: model.phone,
            email: model.email,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
            deleted_at: model.deleted_at.map(Into::into),
        })
    }
}

impl From<UserInfo> for ActiveModel {
    fn from(user: UserInfo) -> Self {
        ActiveModel {
            id: Set(user.id.into()),
            login_id: Set(user.login_id),
            role: Set(user.role.to_string()),
            phone: Set(user.phone),
            email: Set(user.email),
            created_at: Set(user.created_at.into()),
            updated_at: Set(user.updated_at.into()),
            deleted_at: Set(user.deleted_at.map(Into::into)),
        }
    }
}
