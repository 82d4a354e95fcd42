//! Bulk transfers: one sender, many recipients, one independent leg each.
//!
//! Each leg is its own unit of work. A failing leg is recorded on its
//! recipient row and the batch moves on, so one bad recipient degrades the
//! batch to `partial` instead of undoing legs that already settled. There is
//! no compensation step.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};
use serde::Serialize;
use serde_json::{Map, json};

use crate::{
    BulkTransfer, BulkTransferCmd, BulkTransferRecipient, BulkTransferStatus, EngineError, Money,
    RecipientSpec, RecipientStatus, ResultEngine, User, bulk_transfer_recipients,
    bulk_transfers, ledger,
    pagination::{Page, PageRequest},
    reference::ReferencePrefix,
    util::{ensure_positive, merge_metadata, normalize_optional_text, to_u32},
};

use super::{Engine, transfer::TransferLeg, with_tx};

/// Preview of a batch before it is submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BulkQuote {
    pub total_amount: Money,
    pub recipient_count: u32,
}

/// A batch with its recipient legs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BulkTransferDetails {
    pub transfer: BulkTransfer,
    pub recipients: Vec<BulkTransferRecipient>,
}

/// A batch with its leg outcome counts, as listed in the history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BulkTransferSummary {
    pub transfer: BulkTransfer,
    pub successful_count: u64,
    pub failed_count: u64,
}

#[derive(Debug, Default)]
struct LegTally {
    successful: u32,
    failed: u32,
}

impl Engine {
    /// Validate a recipient list and compute its total. Writes nothing.
    pub fn quote_bulk_transfer(&self, recipients: &[RecipientSpec]) -> ResultEngine<BulkQuote> {
        if recipients.is_empty() {
            return Err(EngineError::Validation(
                "bulk transfer needs at least one recipient".to_string(),
            ));
        }
        for spec in recipients {
            ensure_positive(spec.amount, "recipient amount")?;
        }
        let total_amount = Money::checked_sum(recipients.iter().map(|spec| spec.amount))
            .ok_or_else(|| EngineError::Validation("bulk total is too large".to_string()))?;
        let recipient_count = to_u32(recipients.len() as u64, "recipient count")?;
        Ok(BulkQuote {
            total_amount,
            recipient_count,
        })
    }

    /// Pay every recipient in order and return the finalized batch.
    ///
    /// Only the pre-flight check (sender balance against the batch total)
    /// fails the whole call with `InsufficientFunds`; after the batch row
    /// exists, leg failures are reported through the recipient rows and the
    /// batch status.
    pub async fn process_bulk_transfer(&self, cmd: BulkTransferCmd) -> ResultEngine<BulkTransfer> {
        let BulkTransferCmd {
            sender_id,
            recipients,
            description,
        } = cmd;
        let quote = self.quote_bulk_transfer(&recipients)?;
        let description = normalize_optional_text(description.as_deref());
        let recipient_count = i32::try_from(quote.recipient_count)
            .map_err(|_| EngineError::Validation("recipient count out of range".to_string()))?;

        let _sender_guard = self.lock_sender(sender_id).await;

        let sender = self.require_user(&self.database, sender_id).await?;
        if sender.balance < quote.total_amount {
            return Err(EngineError::InsufficientFunds(format!(
                "balance {}, bulk total {}",
                sender.balance, quote.total_amount
            )));
        }

        let batch = with_tx!(self, |db_tx| {
            let created_at = Utc::now();
            let model = self
                .recorder
                .insert_unique(&db_tx, ReferencePrefix::BulkBatch, |reference| {
                    bulk_transfers::ActiveModel {
                        id: ActiveValue::NotSet,
                        user_id: ActiveValue::Set(sender_id),
                        reference: ActiveValue::Set(reference),
                        total_amount: ActiveValue::Set(quote.total_amount.cents()),
                        recipient_count: ActiveValue::Set(recipient_count),
                        status: ActiveValue::Set(BulkTransferStatus::Processing.as_str().to_string()),
                        description: ActiveValue::Set(description.clone()),
                        metadata: ActiveValue::Set(json!({
                            "recipients_count": quote.recipient_count,
                            "total_amount": quote.total_amount.to_string(),
                        })),
                        created_at: ActiveValue::Set(created_at),
                    }
                })
                .await?;
            BulkTransfer::try_from(model)
        })?;
        tracing::info!(
            sender_id,
            reference = %batch.reference,
            recipients = quote.recipient_count,
            total = %quote.total_amount,
            "bulk transfer started"
        );

        let mut tally = LegTally::default();
        if let Err(err) = self.pay_recipients(&sender, &batch, &recipients, &mut tally).await {
            // Legs already committed stay paid; close the batch over what ran.
            let unpaid = quote
                .recipient_count
                .saturating_sub(tally.successful + tally.failed);
            tracing::error!(
                reference = %batch.reference,
                successful = tally.successful,
                unpaid,
                "bulk transfer interrupted: {err}"
            );
            let interrupted = Some(err.to_string());
            if let Err(finalize_err) = self
                .finalize_bulk_transfer(batch, tally.successful, tally.failed + unpaid, interrupted)
                .await
            {
                tracing::error!("failed to finalize interrupted bulk transfer: {finalize_err}");
            }
            return Err(err);
        }

        let LegTally { successful, failed } = tally;
        let batch = self
            .finalize_bulk_transfer(batch, successful, failed, None)
            .await?;
        tracing::info!(
            reference = %batch.reference,
            status = batch.status.as_str(),
            successful,
            failed,
            "bulk transfer finalized"
        );
        Ok(batch)
    }

    /// Runs the legs in order. A failed leg is recorded on its row and the
    /// loop goes on; only a failed bookkeeping write stops it.
    async fn pay_recipients(
        &self,
        sender: &User,
        batch: &BulkTransfer,
        recipients: &[RecipientSpec],
        tally: &mut LegTally,
    ) -> ResultEngine<()> {
        for spec in recipients {
            let row = bulk_transfer_recipients::ActiveModel {
                id: ActiveValue::NotSet,
                bulk_transfer_id: ActiveValue::Set(batch.id),
                recipient_id: ActiveValue::Set(spec.recipient_id),
                amount: ActiveValue::Set(spec.amount.cents()),
                status: ActiveValue::Set(RecipientStatus::Pending.as_str().to_string()),
                failure_reason: ActiveValue::Set(None),
            }
            .insert(&self.database)
            .await?;

            match self.run_bulk_leg(sender, batch, row.id, *spec).await {
                Ok(()) => tally.successful += 1,
                Err(err) => {
                    tally.failed += 1;
                    tracing::warn!(
                        reference = %batch.reference,
                        recipient_id = spec.recipient_id,
                        "bulk leg failed: {err}"
                    );
                    mark_recipient(
                        &self.database,
                        row.id,
                        RecipientStatus::Failed,
                        Some(err.to_string()),
                    )
                    .await?;
                }
            }
        }
        Ok(())
    }

    /// One leg: the transfer and its recipient row's `completed` status
    /// commit together.
    async fn run_bulk_leg(
        &self,
        sender: &User,
        batch: &BulkTransfer,
        row_id: i32,
        spec: RecipientSpec,
    ) -> ResultEngine<()> {
        let mut context = Map::new();
        context.insert("bulk_transfer_id".to_string(), json!(batch.id));
        context.insert("bulk_reference".to_string(), json!(batch.reference));

        let recipient = with_tx!(self, |db_tx| {
            ledger::claim(&db_tx, sender.id, spec.recipient_id).await?;
            let recipient = self.require_recipient(&db_tx, spec.recipient_id).await?;
            self.transfer_in_tx(
                &db_tx,
                TransferLeg {
                    sender,
                    recipient: &recipient,
                    amount: spec.amount,
                    out_prefix: ReferencePrefix::BulkTransferOut,
                    in_prefix: ReferencePrefix::BulkTransferIn,
                    out_description: format!(
                        "Bulk transfer to {} (Ref: {})",
                        recipient.name, batch.reference
                    ),
                    in_description: format!(
                        "Bulk transfer from {} (Ref: {})",
                        sender.name, batch.reference
                    ),
                    context: context.clone(),
                },
            )
            .await?;
            mark_recipient(&db_tx, row_id, RecipientStatus::Completed, None).await?;
            Ok(recipient)
        })?;

        self.dispatch(self.transfer_notifications(sender, &recipient, spec.amount, &context))
            .await;
        Ok(())
    }

    async fn finalize_bulk_transfer(
        &self,
        batch: BulkTransfer,
        successful: u32,
        failed: u32,
        interrupted: Option<String>,
    ) -> ResultEngine<BulkTransfer> {
        let status = BulkTransferStatus::finalize(successful, failed);
        let mut counters = Map::new();
        counters.insert("successful_transfers".to_string(), json!(successful));
        counters.insert("failed_transfers".to_string(), json!(failed));
        if let Some(reason) = interrupted {
            counters.insert("interrupted".to_string(), json!(reason));
        }
        let metadata = merge_metadata(batch.metadata, counters);

        // Only a batch still `processing` can be finalized.
        let result = bulk_transfers::Entity::update_many()
            .col_expr(bulk_transfers::Column::Status, Expr::value(status.as_str()))
            .col_expr(bulk_transfers::Column::Metadata, Expr::value(metadata))
            .filter(bulk_transfers::Column::Id.eq(batch.id))
            .filter(bulk_transfers::Column::Status.eq(BulkTransferStatus::Processing.as_str()))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(format!(
                "processing bulk transfer {}",
                batch.id
            )));
        }

        let model = bulk_transfers::Entity::find_by_id(batch.id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("bulk transfer {}", batch.id)))?;
        BulkTransfer::try_from(model)
    }

    /// A batch owned by `user_id`, with its recipient legs in submission order.
    pub async fn bulk_transfer_details(
        &self,
        user_id: i32,
        bulk_transfer_id: i32,
    ) -> ResultEngine<BulkTransferDetails> {
        let model = bulk_transfers::Entity::find_by_id(bulk_transfer_id)
            .filter(bulk_transfers::Column::UserId.eq(user_id))
            .one(&self.database)
            .await?
            .ok_or_else(|| {
                EngineError::KeyNotFound(format!("bulk transfer {bulk_transfer_id}"))
            })?;
        let recipients = bulk_transfer_recipients::Entity::find()
            .filter(bulk_transfer_recipients::Column::BulkTransferId.eq(bulk_transfer_id))
            .order_by_asc(bulk_transfer_recipients::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(BulkTransferRecipient::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(BulkTransferDetails {
            transfer: BulkTransfer::try_from(model)?,
            recipients,
        })
    }

    /// The sender's batches, newest first, each with its leg outcome counts.
    pub async fn bulk_transfer_history(
        &self,
        user_id: i32,
        status: Option<BulkTransferStatus>,
        page: PageRequest,
    ) -> ResultEngine<Page<BulkTransferSummary>> {
        let page = page.validate()?;
        let mut query =
            bulk_transfers::Entity::find().filter(bulk_transfers::Column::UserId.eq(user_id));
        if let Some(status) = status {
            query = query.filter(bulk_transfers::Column::Status.eq(status.as_str()));
        }
        let paginator = query
            .order_by_desc(bulk_transfers::Column::CreatedAt)
            .order_by_desc(bulk_transfers::Column::Id)
            .paginate(&self.database, page.per_page);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.page - 1).await?;

        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let rows: Vec<(i32, String, i64)> = bulk_transfer_recipients::Entity::find()
            .select_only()
            .column(bulk_transfer_recipients::Column::BulkTransferId)
            .column(bulk_transfer_recipients::Column::Status)
            .column_as(Expr::col(bulk_transfer_recipients::Column::Id).count(), "legs")
            .filter(bulk_transfer_recipients::Column::BulkTransferId.is_in(ids))
            .group_by(bulk_transfer_recipients::Column::BulkTransferId)
            .group_by(bulk_transfer_recipients::Column::Status)
            .into_tuple()
            .all(&self.database)
            .await?;

        let mut counts: HashMap<(i32, RecipientStatus), u64> = HashMap::new();
        for (bulk_transfer_id, status, legs) in rows {
            let status = RecipientStatus::try_from(status.as_str())?;
            let legs = u64::try_from(legs).unwrap_or_default();
            counts.insert((bulk_transfer_id, status), legs);
        }

        let items = models
            .into_iter()
            .map(|model| {
                let id = model.id;
                let count = |status| counts.get(&(id, status)).copied().unwrap_or_default();
                Ok(BulkTransferSummary {
                    successful_count: count(RecipientStatus::Completed),
                    failed_count: count(RecipientStatus::Failed),
                    transfer: BulkTransfer::try_from(model)?,
                })
            })
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Page::new(items, page, total))
    }
}

/// Write a terminal status on a recipient row that is still `pending`.
async fn mark_recipient<C: sea_orm::ConnectionTrait>(
    db: &C,
    row_id: i32,
    status: RecipientStatus,
    failure_reason: Option<String>,
) -> ResultEngine<()> {
    let result = bulk_transfer_recipients::Entity::update_many()
        .col_expr(
            bulk_transfer_recipients::Column::Status,
            Expr::value(status.as_str()),
        )
        .col_expr(
            bulk_transfer_recipients::Column::FailureReason,
            Expr::value(failure_reason),
        )
        .filter(bulk_transfer_recipients::Column::Id.eq(row_id))
        .filter(
            bulk_transfer_recipients::Column::Status.eq(RecipientStatus::Pending.as_str()),
        )
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::KeyNotFound(format!(
            "pending bulk transfer recipient {row_id}"
        )));
    }
    Ok(())
}
