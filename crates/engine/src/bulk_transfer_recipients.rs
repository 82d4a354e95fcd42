//! One recipient leg of a bulk transfer.
//!
//! Rows are inserted `pending` before the leg runs and receive exactly one
//! terminal status afterwards.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Completed,
    Failed,
}

impl RecipientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for RecipientStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::Validation(format!(
                "invalid recipient status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BulkTransferRecipient {
    pub id: i32,
    pub bulk_transfer_id: i32,
    pub recipient_id: i32,
    pub amount: Money,
    pub status: RecipientStatus,
    pub failure_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "bulk_transfer_recipients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub bulk_transfer_id: i32,
    pub recipient_id: i32,
    pub amount: i64,
    pub status: String,
    pub failure_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bulk_transfers::Entity",
        from = "Column::BulkTransferId",
        to = "super::bulk_transfers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    BulkTransfers,
}

impl Related<super::bulk_transfers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BulkTransfers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for BulkTransferRecipient {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            bulk_transfer_id: model.bulk_transfer_id,
            recipient_id: model.recipient_id,
            amount: Money::new(model.amount),
            status: RecipientStatus::try_from(model.status.as_str())?,
            failure_reason: model.failure_reason,
        })
    }
}
