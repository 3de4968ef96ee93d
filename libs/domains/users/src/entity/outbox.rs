use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use crate::identity::EntityId;
use crate::models::OutboxRecord;

/// Sea-ORM Entity for the outboxes table
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "outboxes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    #[sea_orm(column_type = "Text")]
    pub span_context: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for OutboxRecord {
    fn from(model: Model) -> Self {
        Self {
            id: EntityId::from_uuid(model.id),
            aggregate_type: model.aggregate_type,
            aggregate_id: model.aggregate_id,
            event_type: model.event_type,
            payload: model.payload,
            span_context: model.span_context,
            created_at: model.created_at.into(),
        }
    }
}

impl From<OutboxRecord> for ActiveModel {
    fn from(record: OutboxRecord) -> Self {
        ActiveModel {
            id: Set(record.id.into()),
            aggregate_type: Set(record.aggregate_type),
            aggregate_id: Set(record.aggregate_id),
            event_type: Set(record.event_type),
            payload: Set(record.payload),
            span_context: Set(record.span_context),
            created_at: Set(record.created_at.into()),
        }
    }
}
