use sea_orm::{DatabaseTransaction, EntityTrait, TransactionTrait};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::{
    EngineError, Money, ResultEngine, Transaction, TransactionKind, TransactionStatus,
    TransferCmd, User, ledger,
    notifier::NewNotification,
    recorder::NewTransaction,
    reference::ReferencePrefix,
    users,
    util::{ensure_positive, normalize_optional_text},
};

use super::{Engine, with_tx};

/// The two journal rows written by a transfer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub sender_transaction: Transaction,
    pub recipient_transaction: Transaction,
    pub sender_balance: Money,
}

/// Everything one sender→recipient movement needs inside its unit of work.
pub(super) struct TransferLeg<'a> {
    pub sender: &'a User,
    pub recipient: &'a User,
    pub amount: Money,
    pub out_prefix: ReferencePrefix,
    pub in_prefix: ReferencePrefix,
    pub out_description: String,
    pub in_description: String,
    /// Extra keys stamped on both journal rows and both notifications.
    pub context: Map<String, Value>,
}

impl Engine {
    /// Move `amount` from sender to recipient as one unit of work: both
    /// balance updates and both journal rows commit together or not at all.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<TransferReceipt> {
        let TransferCmd {
            sender_id,
            recipient_id,
            amount,
            description,
        } = cmd;
        if sender_id == recipient_id {
            return Err(EngineError::SelfTransfer);
        }
        ensure_positive(amount, "transfer amount")?;
        let description = normalize_optional_text(description.as_deref());

        let (receipt, sender, recipient) = with_tx!(self, |db_tx| {
            ledger::claim(&db_tx, sender_id, recipient_id).await?;
            let sender = self.require_user(&db_tx, sender_id).await?;
            let recipient = self.require_recipient(&db_tx, recipient_id).await?;
            let receipt = self
                .transfer_in_tx(
                    &db_tx,
                    TransferLeg {
                        sender: &sender,
                        recipient: &recipient,
                        amount,
                        out_prefix: ReferencePrefix::TransferOut,
                        in_prefix: ReferencePrefix::TransferIn,
                        out_description: description
                            .clone()
                            .unwrap_or_else(|| format!("Transfer to {}", recipient.name)),
                        in_description: description
                            .clone()
                            .unwrap_or_else(|| format!("Transfer from {}", sender.name)),
                        context: Map::new(),
                    },
                )
                .await?;
            Ok((receipt, sender, recipient))
        })?;

        tracing::info!(
            sender_id,
            recipient_id,
            amount = %amount,
            reference = %receipt.sender_transaction.reference,
            "transfer committed"
        );
        self.dispatch(self.transfer_notifications(&sender, &recipient, amount, &Map::new()))
            .await;
        Ok(receipt)
    }

    pub(super) async fn require_recipient(
        &self,
        db_tx: &DatabaseTransaction,
        recipient_id: i32,
    ) -> ResultEngine<User> {
        users::Entity::find_by_id(recipient_id)
            .one(db_tx)
            .await?
            .map(User::from)
            .ok_or_else(|| EngineError::RecipientNotFound(format!("user {recipient_id}")))
    }

    /// The atomic part of a transfer. The caller owns `db_tx` and decides
    /// when to commit.
    pub(super) async fn transfer_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        leg: TransferLeg<'_>,
    ) -> ResultEngine<TransferReceipt> {
        let TransferLeg {
            sender,
            recipient,
            amount,
            out_prefix,
            in_prefix,
            out_description,
            in_description,
            context,
        } = leg;
        if sender.id == recipient.id {
            return Err(EngineError::SelfTransfer);
        }

        let (sender_balance, _) = ledger::move_funds(db_tx, sender.id, recipient.id, amount).await?;

        let mut out_metadata = Map::new();
        out_metadata.insert("recipient_id".to_string(), json!(recipient.id));
        out_metadata.insert("recipient_name".to_string(), json!(recipient.name));
        out_metadata.extend(context.clone());
        let sender_transaction = self
            .recorder
            .record(
                db_tx,
                NewTransaction {
                    user_id: sender.id,
                    kind: TransactionKind::TransferOut,
                    prefix: out_prefix,
                    amount,
                    description: out_description,
                    status: TransactionStatus::Completed,
                    metadata: Value::Object(out_metadata),
                },
            )
            .await?;

        let mut in_metadata = Map::new();
        in_metadata.insert("sender_id".to_string(), json!(sender.id));
        in_metadata.insert("sender_name".to_string(), json!(sender.name));
        in_metadata.extend(context);
        let recipient_transaction = self
            .recorder
            .record(
                db_tx,
                NewTransaction {
                    user_id: recipient.id,
                    kind: TransactionKind::TransferIn,
                    prefix: in_prefix,
                    amount,
                    description: in_description,
                    status: TransactionStatus::Completed,
                    metadata: Value::Object(in_metadata),
                },
            )
            .await?;

        Ok(TransferReceipt {
            sender_transaction,
            recipient_transaction,
            sender_balance,
        })
    }

    pub(super) fn transfer_notifications(
        &self,
        sender: &User,
        recipient: &User,
        amount: Money,
        context: &Map<String, Value>,
    ) -> Vec<NewNotification> {
        vec![
            NewNotification::transfer_sent(
                sender.id,
                recipient,
                amount,
                context,
                &self.currency_symbol,
            ),
            NewNotification::transfer_received(
                recipient.id,
                sender,
                amount,
                context,
                &self.currency_symbol,
            ),
        ]
    }
}
