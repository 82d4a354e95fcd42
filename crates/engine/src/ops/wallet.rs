use sea_orm::TransactionTrait;
use serde::Serialize;
use serde_json::Value;

use crate::{
    DepositCmd, Money, ResultEngine, Transaction, TransactionKind, TransactionStatus, WithdrawCmd,
    ledger,
    notifier::NewNotification,
    recorder::NewTransaction,
    reference::ReferencePrefix,
    util::{ensure_positive, metadata_object, normalize_optional_text},
};

use super::{Engine, with_tx};

/// Result of a deposit or withdrawal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BalanceChange {
    pub transaction: Transaction,
    pub new_balance: Money,
}

impl Engine {
    /// Credit `amount` to the user and record a completed `deposit`.
    pub async fn deposit(&self, cmd: DepositCmd) -> ResultEngine<BalanceChange> {
        let DepositCmd {
            user_id,
            amount,
            description,
            metadata,
        } = cmd;
        ensure_positive(amount, "deposit amount")?;
        let metadata = metadata_object(metadata)?;
        let description = normalize_optional_text(description.as_deref())
            .unwrap_or_else(|| "Wallet deposit".to_string());

        let change = with_tx!(self, |db_tx| {
            let new_balance = ledger::credit(&db_tx, user_id, amount).await?;
            let transaction = self
                .recorder
                .record(
                    &db_tx,
                    NewTransaction {
                        user_id,
                        kind: TransactionKind::Deposit,
                        prefix: ReferencePrefix::Deposit,
                        amount,
                        description,
                        status: TransactionStatus::Completed,
                        metadata: Value::Object(metadata),
                    },
                )
                .await?;
            Ok(BalanceChange {
                transaction,
                new_balance,
            })
        })?;

        tracing::info!(
            user_id,
            amount = %amount,
            reference = %change.transaction.reference,
            "deposit committed"
        );
        self.dispatch(vec![NewNotification::deposit(
            &change.transaction,
            change.new_balance,
            &self.currency_symbol,
        )])
        .await;
        Ok(change)
    }

    /// Debit `amount` from the user and record a completed `withdrawal`.
    ///
    /// Fails with `InsufficientFunds`, leaving no trace, when the balance is
    /// lower than `amount`.
    pub async fn withdraw(&self, cmd: WithdrawCmd) -> ResultEngine<BalanceChange> {
        let WithdrawCmd {
            user_id,
            amount,
            description,
            metadata,
        } = cmd;
        ensure_positive(amount, "withdrawal amount")?;
        let metadata = metadata_object(metadata)?;
        let description = normalize_optional_text(description.as_deref())
            .unwrap_or_else(|| "Wallet withdrawal".to_string());

        let change = with_tx!(self, |db_tx| {
            let new_balance = ledger::debit(&db_tx, user_id, amount).await?;
            let transaction = self
                .recorder
                .record(
                    &db_tx,
                    NewTransaction {
                        user_id,
                        kind: TransactionKind::Withdrawal,
                        prefix: ReferencePrefix::Withdrawal,
                        amount,
                        description,
                        status: TransactionStatus::Completed,
                        metadata: Value::Object(metadata),
                    },
                )
                .await?;
            Ok(BalanceChange {
                transaction,
                new_balance,
            })
        })?;

        tracing::info!(
            user_id,
            amount = %amount,
            reference = %change.transaction.reference,
            "withdrawal committed"
        );
        self.dispatch(vec![NewNotification::withdrawal(
            &change.transaction,
            change.new_balance,
            &self.currency_symbol,
        )])
        .await;
        Ok(change)
    }
}
