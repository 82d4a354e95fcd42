//! Bulk transfer batches and their per-recipient legs.

use sea_orm_migration::prelude::*;

use super::m20260101_000001_ledger::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum BulkTransfers {
    Table,
    Id,
    UserId,
    Reference,
    TotalAmount,
    RecipientCount,
    Status,
    Description,
    Metadata,
    CreatedAt,
}

#[derive(Iden)]
enum BulkTransferRecipients {
    Table,
    Id,
    BulkTransferId,
    RecipientId,
    Amount,
    Status,
    FailureReason,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BulkTransfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BulkTransfers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BulkTransfers::UserId).integer().not_null())
                    .col(ColumnDef::new(BulkTransfers::Reference).string().not_null())
                    .col(
                        ColumnDef::new(BulkTransfers::TotalAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BulkTransfers::RecipientCount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BulkTransfers::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(BulkTransfers::Description).text())
                    .col(ColumnDef::new(BulkTransfers::Metadata).json().not_null())
                    .col(
                        ColumnDef::new(BulkTransfers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bulk_transfers-user_id")
                            .from(BulkTransfers::Table, BulkTransfers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bulk_transfers-reference-unique")
                    .table(BulkTransfers::Table)
                    .col(BulkTransfers::Reference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bulk_transfers-user_id-status")
                    .table(BulkTransfers::Table)
                    .col(BulkTransfers::UserId)
                    .col(BulkTransfers::Status)
                    .to_owned(),
            )
            .await?;

        // `recipient_id` has no FK: an unknown recipient is still recorded as a
        // failed leg.
        manager
            .create_table(
                Table::create()
                    .table(BulkTransferRecipients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BulkTransferRecipients::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BulkTransferRecipients::BulkTransferId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BulkTransferRecipients::RecipientId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BulkTransferRecipients::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BulkTransferRecipients::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(BulkTransferRecipients::FailureReason).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bulk_transfer_recipients-bulk_transfer_id")
                            .from(
                                BulkTransferRecipients::Table,
                                BulkTransferRecipients::BulkTransferId,
                            )
                            .to(BulkTransfers::Table, BulkTransfers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bulk_transfer_recipients-bulk_transfer_id-status")
                    .table(BulkTransferRecipients::Table)
                    .col(BulkTransferRecipients::BulkTransferId)
                    .col(BulkTransferRecipients::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bulk_transfer_recipients-recipient_id")
                    .table(BulkTransferRecipients::Table)
                    .col(BulkTransferRecipients::RecipientId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BulkTransferRecipients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BulkTransfers::Table).to_owned())
            .await?;
        Ok(())
    }
}
