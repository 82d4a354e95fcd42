use std::{
    collections::HashMap,
    sync::{Arc, PoisonError},
};

use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Deserialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    EngineError, ResultEngine, User,
    notifier::{DatabaseNotifier, NewNotification, Notifier},
    recorder::{DEFAULT_REFERENCE_ATTEMPTS, TransactionRecorder},
    reference::{RandomReferences, ReferenceGenerator},
    users,
};

mod bulk;
mod history;
mod notifications;
mod transfer;
mod users_ops;
mod wallet;

pub use bulk::{BulkQuote, BulkTransferDetails, BulkTransferSummary};
pub use history::TransactionFilter;
pub use notifications::NotificationFilter;
pub use transfer::TransferReceipt;
pub use wallet::BalanceChange;

pub const DEFAULT_CURRENCY_SYMBOL: &str = "₦";

/// Run a block inside a DB transaction, committing on success and rolling
/// back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = async { $body }.await;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = $tx.rollback().await {
                    tracing::error!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }};
}

pub(crate) use with_tx;

/// Whether two bulk transfers from the same sender may run at the same time.
///
/// With `Exclusive` the pre-flight balance check and every leg of a batch
/// run while holding a per-sender lock, so a second batch from the same
/// sender waits. With `Concurrent` batches interleave and the pre-flight
/// check is advisory only. In both modes each leg's debit is re-checked
/// atomically, so balances never go negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkSenderPolicy {
    #[default]
    Exclusive,
    Concurrent,
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    recorder: TransactionRecorder,
    currency_symbol: String,
    bulk_policy: BulkSenderPolicy,
    sender_locks: SenderLocks,
}

type SenderLocks = std::sync::Mutex<HashMap<i32, Arc<Mutex<()>>>>;

/// A held per-sender batch lock. Dropping the last holder of a sender's
/// lock also drops its map entry.
pub(crate) struct SenderGuard<'a> {
    locks: &'a SenderLocks,
    sender_id: i32,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SenderGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map and this guard are the only owners: nobody is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.sender_id);
        }
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) async fn require_user<C: sea_orm::ConnectionTrait>(
        &self,
        db: &C,
        user_id: i32,
    ) -> ResultEngine<User> {
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .map(User::from)
            .ok_or_else(|| EngineError::KeyNotFound(format!("user {user_id}")))
    }

    /// Deliver notifications after the owning unit of work has committed.
    /// Failures are logged, never returned.
    pub(crate) async fn dispatch(&self, notifications: Vec<NewNotification>) {
        for notification in notifications {
            let user_id = notification.user_id;
            let kind = notification.kind.clone();
            if let Err(err) = self.notifier.notify(notification).await {
                tracing::warn!(user_id, kind = %kind, "notification dropped: {err}");
            }
        }
    }

    /// Per-sender batch lock, `None` under [`BulkSenderPolicy::Concurrent`].
    pub(crate) async fn lock_sender(&self, sender_id: i32) -> Option<SenderGuard<'_>> {
        if self.bulk_policy == BulkSenderPolicy::Concurrent {
            return None;
        }
        let lock = {
            let mut locks = self
                .sender_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(sender_id).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        Some(SenderGuard {
            locks: &self.sender_locks,
            sender_id,
            lock,
            guard: Some(guard),
        })
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    notifier: Option<Arc<dyn Notifier>>,
    references: Option<Arc<dyn ReferenceGenerator>>,
    reference_attempts: Option<u32>,
    currency_symbol: Option<String>,
    bulk_policy: BulkSenderPolicy,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Replace the default notifier, which writes to the `notifications` table.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> EngineBuilder {
        self.notifier = Some(notifier);
        self
    }

    pub fn references(mut self, references: Arc<dyn ReferenceGenerator>) -> EngineBuilder {
        self.references = Some(references);
        self
    }

    /// How many references to try before failing with `DuplicateReference`.
    pub fn reference_attempts(mut self, attempts: u32) -> EngineBuilder {
        self.reference_attempts = Some(attempts);
        self
    }

    pub fn currency_symbol(mut self, symbol: impl Into<String>) -> EngineBuilder {
        self.currency_symbol = Some(symbol.into());
        self
    }

    pub fn bulk_policy(mut self, policy: BulkSenderPolicy) -> EngineBuilder {
        self.bulk_policy = policy;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(DatabaseNotifier::new(self.database.clone())));
        let references = self
            .references
            .unwrap_or_else(|| Arc::new(RandomReferences));
        let recorder = TransactionRecorder::new(
            references,
            self.reference_attempts
                .unwrap_or(DEFAULT_REFERENCE_ATTEMPTS),
        );

        Ok(Engine {
            database: self.database,
            notifier,
            recorder,
            currency_symbol: self
                .currency_symbol
                .unwrap_or_else(|| DEFAULT_CURRENCY_SYMBOL.to_string()),
            bulk_policy: self.bulk_policy,
            sender_locks: SenderLocks::default(),
        })
    }
}
