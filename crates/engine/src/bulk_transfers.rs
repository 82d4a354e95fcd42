//! Bulk transfer batches.
//!
//! A batch is created in `processing` and finalized exactly once, after every
//! recipient leg has been attempted, to `completed`, `partial` or `failed`.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkTransferStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Partial,
}

impl BulkTransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }

    /// Final status of a batch once every leg has been attempted.
    #[must_use]
    pub fn finalize(successful: u32, failed: u32) -> Self {
        match (successful, failed) {
            (_, 0) => Self::Completed,
            (0, _) => Self::Failed,
            _ => Self::Partial,
        }
    }
}

impl TryFrom<&str> for BulkTransferStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "partial" => Ok(Self::Partial),
            other => Err(EngineError::Validation(format!(
                "invalid bulk transfer status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BulkTransfer {
    pub id: i32,
    pub user_id: i32,
    pub reference: String,
    pub total_amount: Money,
    pub recipient_count: u32,
    pub status: BulkTransferStatus,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bulk_transfers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    #[sea_orm(unique)]
    pub reference: String,
    pub total_amount: i64,
    pub recipient_count: i32,
    pub status: String,
    pub description: Option<String>,
    pub metadata: Json,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::bulk_transfer_recipients::Entity")]
    Recipients,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::bulk_transfer_recipients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for BulkTransfer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            reference: model.reference,
            total_amount: Money::new(model.total_amount),
            recipient_count: u32::try_from(model.recipient_count).map_err(|_| {
                EngineError::Validation(format!(
                    "invalid recipient count: {}",
                    model.recipient_count
                ))
            })?,
            status: BulkTransferStatus::try_from(model.status.as_str())?,
            description: model.description,
            metadata: model.metadata,
            created_at: model.created_at,
        })
    }
}
