//! Best-effort user notifications.
//!
//! Notifications are dispatched after the financial unit of work commits and
//! never take part in it: a failing [`Notifier`] is logged and ignored.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection};
use serde_json::{Map, Value, json};

use crate::{Money, ResultEngine, Transaction, User, notifications};

pub const DEPOSIT: &str = "transaction.deposit";
pub const WITHDRAWAL: &str = "transaction.withdrawal";
pub const TRANSFER_SENT: &str = "transfer.sent";
pub const TRANSFER_RECEIVED: &str = "transfer.received";

/// A notification about to be delivered.
#[derive(Clone, Debug, PartialEq)]
pub struct NewNotification {
    pub user_id: i32,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: Value,
}

impl NewNotification {
    pub(crate) fn deposit(transaction: &Transaction, new_balance: Money, symbol: &str) -> Self {
        Self {
            user_id: transaction.user_id,
            kind: DEPOSIT.to_string(),
            title: "Deposit Received".to_string(),
            message: format!(
                "Your deposit of {symbol}{} was successful. New balance: {symbol}{new_balance}",
                transaction.amount
            ),
            data: json!({
                "transaction_id": transaction.id,
                "amount": transaction.amount.to_string(),
                "new_balance": new_balance.to_string(),
            }),
        }
    }

    pub(crate) fn withdrawal(transaction: &Transaction, new_balance: Money, symbol: &str) -> Self {
        Self {
            user_id: transaction.user_id,
            kind: WITHDRAWAL.to_string(),
            title: "Withdrawal Processed".to_string(),
            message: format!(
                "Your withdrawal of {symbol}{} was successful. New balance: {symbol}{new_balance}",
                transaction.amount
            ),
            data: json!({
                "transaction_id": transaction.id,
                "amount": transaction.amount.to_string(),
                "new_balance": new_balance.to_string(),
            }),
        }
    }

    /// `context` carries extra keys such as the bulk batch id.
    pub(crate) fn transfer_sent(
        sender_id: i32,
        recipient: &User,
        amount: Money,
        context: &Map<String, Value>,
        symbol: &str,
    ) -> Self {
        let mut data = Map::new();
        data.insert("amount".to_string(), json!(amount.to_string()));
        data.insert("recipient_id".to_string(), json!(recipient.id));
        data.insert("recipient_name".to_string(), json!(recipient.name));
        data.extend(context.clone());
        Self {
            user_id: sender_id,
            kind: TRANSFER_SENT.to_string(),
            title: "Transfer Sent".to_string(),
            message: format!("You sent {symbol}{amount} to {}", recipient.name),
            data: Value::Object(data),
        }
    }

    pub(crate) fn transfer_received(
        recipient_id: i32,
        sender: &User,
        amount: Money,
        context: &Map<String, Value>,
        symbol: &str,
    ) -> Self {
        let mut data = Map::new();
        data.insert("amount".to_string(), json!(amount.to_string()));
        data.insert("sender_id".to_string(), json!(sender.id));
        data.insert("sender_name".to_string(), json!(sender.name));
        data.extend(context.clone());
        Self {
            user_id: recipient_id,
            kind: TRANSFER_RECEIVED.to_string(),
            title: "Transfer Received".to_string(),
            message: format!("You received {symbol}{amount} from {}", sender.name),
            data: Value::Object(data),
        }
    }
}

/// Delivery channel for notifications.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    async fn notify(&self, notification: NewNotification) -> ResultEngine<()>;
}

/// Stores notifications in the `notifications` table, on its own connection.
#[derive(Clone, Debug)]
pub struct DatabaseNotifier {
    database: DatabaseConnection,
}

impl DatabaseNotifier {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Notifier for DatabaseNotifier {
    async fn notify(&self, notification: NewNotification) -> ResultEngine<()> {
        let NewNotification {
            user_id,
            kind,
            title,
            message,
            data,
        } = notification;
        notifications::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(user_id),
            kind: ActiveValue::Set(kind),
            title: ActiveValue::Set(title),
            message: ActiveValue::Set(message),
            data: ActiveValue::Set(data),
            is_read: ActiveValue::Set(false),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(&self.database)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn user(id: i32, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
            email: format!("{name}@example.com"),
            balance: Money::ZERO,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn transfer_messages_use_symbol_and_two_decimals() {
        let mut context = Map::new();
        context.insert("bulk_transfer_id".to_string(), json!(9));

        let sent = NewNotification::transfer_sent(1, &user(2, "bola"), Money::new(5000), &context, "₦");
        assert_eq!(sent.kind, TRANSFER_SENT);
        assert_eq!(sent.message, "You sent ₦50.00 to bola");
        assert_eq!(sent.data["bulk_transfer_id"], json!(9));

        let received =
            NewNotification::transfer_received(2, &user(1, "ada"), Money::new(5), &Map::new(), "$");
        assert_eq!(received.user_id, 2);
        assert_eq!(received.message, "You received $0.05 from ada");
        assert_eq!(received.data["sender_name"], json!("ada"));
    }
}
