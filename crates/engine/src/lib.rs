//! Wallet ledger core.
//!
//! Every money movement (deposit, withdrawal, transfer, bulk transfer leg)
//! updates balances and writes its journal rows in one database transaction.
//! Notifications are delivered after commit and never affect the outcome.

pub use bulk_transfer_recipients::{BulkTransferRecipient, RecipientStatus};
pub use bulk_transfers::{BulkTransfer, BulkTransferStatus};
pub use commands::{BulkTransferCmd, DepositCmd, RecipientSpec, TransferCmd, WithdrawCmd};
pub use error::EngineError;
pub use money::Money;
pub use notifications::Notification;
pub use notifier::{DatabaseNotifier, NewNotification, Notifier};
pub use ops::{
    BalanceChange, BulkQuote, BulkSenderPolicy, BulkTransferDetails, BulkTransferSummary,
    DEFAULT_CURRENCY_SYMBOL, Engine, EngineBuilder, NotificationFilter, TransactionFilter,
    TransferReceipt,
};
pub use pagination::{DEFAULT_PER_PAGE, MAX_PER_PAGE, Page, PageRequest};
pub use recorder::DEFAULT_REFERENCE_ATTEMPTS;
pub use reference::{RandomReferences, ReferenceGenerator, ReferencePrefix};
pub use transactions::{Transaction, TransactionKind, TransactionStatus};
pub use users::User;

mod bulk_transfer_recipients;
mod bulk_transfers;
mod commands;
mod error;
mod ledger;
mod money;
mod notifications;
pub mod notifier;
mod ops;
mod pagination;
mod recorder;
mod reference;
mod transactions;
mod users;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
