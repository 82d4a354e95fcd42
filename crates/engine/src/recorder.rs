//! Transaction recorder.
//!
//! Inserts rows that carry a globally unique `reference`. Each attempt runs in
//! a savepoint nested in the caller's unit of work, so a unique-index
//! violation discards only that attempt; the caller's balance updates stay
//! pending until the outer transaction commits or rolls back.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ActiveValue, DatabaseTransaction, DbErr, EntityTrait,
    IntoActiveModel, SqlErr, TransactionTrait,
};
use serde_json::Value;

use crate::{
    EngineError, Money, ResultEngine, Transaction, TransactionKind, TransactionStatus,
    reference::{ReferenceGenerator, ReferencePrefix},
    transactions,
};

/// Attempts made before giving up with `DuplicateReference`.
pub const DEFAULT_REFERENCE_ATTEMPTS: u32 = 3;

/// A transaction row about to be written.
#[derive(Clone, Debug)]
pub(crate) struct NewTransaction {
    pub user_id: i32,
    pub kind: TransactionKind,
    pub prefix: ReferencePrefix,
    pub amount: Money,
    pub description: String,
    pub status: TransactionStatus,
    pub metadata: Value,
}

#[derive(Clone, Debug)]
pub(crate) struct TransactionRecorder {
    references: Arc<dyn ReferenceGenerator>,
    attempts: u32,
}

impl TransactionRecorder {
    pub(crate) fn new(references: Arc<dyn ReferenceGenerator>, attempts: u32) -> Self {
        Self {
            references,
            attempts: attempts.max(1),
        }
    }

    /// Write one transaction row inside `db_tx`.
    pub(crate) async fn record(
        &self,
        db_tx: &DatabaseTransaction,
        new: NewTransaction,
    ) -> ResultEngine<Transaction> {
        let NewTransaction {
            user_id,
            kind,
            prefix,
            amount,
            description,
            status,
            metadata,
        } = new;
        let created_at = Utc::now();

        let model = self
            .insert_unique(db_tx, prefix, |reference| transactions::ActiveModel {
                id: ActiveValue::NotSet,
                user_id: ActiveValue::Set(user_id),
                kind: ActiveValue::Set(kind.as_str().to_string()),
                amount: ActiveValue::Set(amount.cents()),
                description: ActiveValue::Set(description.clone()),
                status: ActiveValue::Set(status.as_str().to_string()),
                reference: ActiveValue::Set(reference),
                metadata: ActiveValue::Set(metadata.clone()),
                created_at: ActiveValue::Set(created_at),
            })
            .await?;
        Transaction::try_from(model)
    }

    /// Insert the row built by `build`, regenerating its reference on a
    /// unique-index violation.
    pub(crate) async fn insert_unique<A, F>(
        &self,
        db_tx: &DatabaseTransaction,
        prefix: ReferencePrefix,
        build: F,
    ) -> ResultEngine<<A::Entity as EntityTrait>::Model>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
        F: Fn(String) -> A,
    {
        for attempt in 1..=self.attempts {
            let reference = self.references.generate(prefix);
            let savepoint = db_tx.begin().await?;
            match build(reference.clone()).insert(&savepoint).await {
                Ok(model) => {
                    savepoint.commit().await?;
                    return Ok(model);
                }
                Err(err) if is_unique_violation(&err) => {
                    savepoint.rollback().await?;
                    tracing::debug!(%reference, attempt, "reference collision, regenerating");
                }
                Err(err) => {
                    savepoint.rollback().await?;
                    return Err(err.into());
                }
            }
        }

        tracing::warn!(
            prefix = %prefix,
            attempts = self.attempts,
            "giving up on reference generation"
        );
        Err(EngineError::DuplicateReference(prefix.to_string()))
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
