//! Command structs for engine operations.
//!
//! These types group parameters for write operations
//! (deposit/withdraw/transfer/bulk transfer), keeping call sites readable and
//! avoiding long argument lists.

use serde_json::Value;

use crate::Money;

/// Credit a user's balance.
#[derive(Clone, Debug)]
pub struct DepositCmd {
    pub user_id: i32,
    pub amount: Money,
    pub description: Option<String>,
    pub metadata: Option<Value>,
}

impl DepositCmd {
    #[must_use]
    pub fn new(user_id: i32, amount: Money) -> Self {
        Self {
            user_id,
            amount,
            description: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Debit a user's balance.
#[derive(Clone, Debug)]
pub struct WithdrawCmd {
    pub user_id: i32,
    pub amount: Money,
    pub description: Option<String>,
    pub metadata: Option<Value>,
}

impl WithdrawCmd {
    #[must_use]
    pub fn new(user_id: i32, amount: Money) -> Self {
        Self {
            user_id,
            amount,
            description: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Move money from one user to another.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub sender_id: i32,
    pub recipient_id: i32,
    pub amount: Money,
    pub description: Option<String>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(sender_id: i32, recipient_id: i32, amount: Money) -> Self {
        Self {
            sender_id,
            recipient_id,
            amount,
            description: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One recipient of a bulk transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecipientSpec {
    pub recipient_id: i32,
    pub amount: Money,
}

impl RecipientSpec {
    #[must_use]
    pub fn new(recipient_id: i32, amount: Money) -> Self {
        Self {
            recipient_id,
            amount,
        }
    }
}

/// Pay several recipients from one sender, one independent leg each.
#[derive(Clone, Debug)]
pub struct BulkTransferCmd {
    pub sender_id: i32,
    pub recipients: Vec<RecipientSpec>,
    pub description: Option<String>,
}

impl BulkTransferCmd {
    #[must_use]
    pub fn new(sender_id: i32, recipients: Vec<RecipientSpec>) -> Self {
        Self {
            sender_id,
            recipients,
            description: None,
        }
    }

    #[must_use]
    pub fn recipient(mut self, recipient_id: i32, amount: Money) -> Self {
        self.recipients.push(RecipientSpec::new(recipient_id, amount));
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
