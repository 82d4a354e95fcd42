//! Ledger store: the only code that writes `users.balance`.
//!
//! Every mutation is a single conditional `UPDATE`, so the balance check and
//! the write happen atomically in the database:
//!
//! - `credit`: `balance = balance + amount WHERE id = ? AND balance <= MAX - amount`
//! - `debit`: `balance = balance - amount WHERE id = ? AND balance >= amount`
//!
//! Two concurrent debits against the same row serialize on the row write and
//! the second one re-evaluates the `balance >= amount` predicate, so they can
//! never both succeed if together they exceed the balance. The functions take
//! any [`ConnectionTrait`], normally the caller's open `DatabaseTransaction`,
//! and commit nothing themselves.
//!
//! SQLite cannot upgrade a read lock while another connection holds the write
//! lock, so a unit of work that reads before it writes fails with
//! `database is locked` instead of waiting. Transactions that look rows up
//! before moving money start with [`claim`].

use sea_orm::{ConnectionTrait, QueryFilter, prelude::*, sea_query::Expr};

use crate::{EngineError, Money, ResultEngine, users, util::ensure_positive};

/// Current committed (or, inside a transaction, current visible) balance.
pub(crate) async fn balance<C: ConnectionTrait>(db: &C, user_id: i32) -> ResultEngine<Money> {
    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("user {user_id}")))?;
    Ok(Money::new(user.balance))
}

/// Takes the write lock for the enclosing transaction with a no-op update of
/// the given rows, in ascending id order. Missing ids are ignored.
pub(crate) async fn claim<C: ConnectionTrait>(db: &C, a: i32, b: i32) -> ResultEngine<()> {
    users::Entity::update_many()
        .col_expr(users::Column::Balance, Expr::col(users::Column::Balance).into())
        .filter(users::Column::Id.is_in(lock_order(a, b)))
        .exec(db)
        .await?;
    Ok(())
}

/// Adds `amount` to the user's balance and returns the new balance.
///
/// Fails with `Validation` without touching the row when the new balance
/// would not fit in an `i64`.
pub(crate) async fn credit<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    amount: Money,
) -> ResultEngine<Money> {
    ensure_positive(amount, "credit amount")?;
    let result = users::Entity::update_many()
        .col_expr(
            users::Column::Balance,
            Expr::col(users::Column::Balance).add(amount.cents()),
        )
        .filter(users::Column::Id.eq(user_id))
        .filter(users::Column::Balance.lte(i64::MAX - amount.cents()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        // Either the user is missing or the guard rejected the credit.
        let current = balance(db, user_id).await?;
        return Err(EngineError::Validation(format!(
            "balance {current} cannot take another {amount}"
        )));
    }
    balance(db, user_id).await
}

/// Removes `amount` from the user's balance and returns the new balance.
///
/// Fails with `InsufficientFunds` without touching the row when the balance
/// is lower than `amount`.
pub(crate) async fn debit<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    amount: Money,
) -> ResultEngine<Money> {
    ensure_positive(amount, "debit amount")?;
    let result = users::Entity::update_many()
        .col_expr(
            users::Column::Balance,
            Expr::col(users::Column::Balance).sub(amount.cents()),
        )
        .filter(users::Column::Id.eq(user_id))
        .filter(users::Column::Balance.gte(amount.cents()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        // Either the user is missing or the guard rejected the debit.
        let current = balance(db, user_id).await?;
        return Err(EngineError::InsufficientFunds(format!(
            "balance {current}, requested {amount}"
        )));
    }
    balance(db, user_id).await
}

/// Moves `amount` from `sender` to `recipient`, touching the two rows in
/// ascending id order so that opposite-direction transfers between the same
/// pair cannot deadlock. Returns `(sender_balance, recipient_balance)`.
pub(crate) async fn move_funds<C: ConnectionTrait>(
    db: &C,
    sender: i32,
    recipient: i32,
    amount: Money,
) -> ResultEngine<(Money, Money)> {
    if sender == recipient {
        return Err(EngineError::SelfTransfer);
    }

    let (mut sender_balance, mut recipient_balance) = (Money::ZERO, Money::ZERO);
    for user_id in lock_order(sender, recipient) {
        if user_id == sender {
            sender_balance = debit(db, sender, amount).await?;
        } else {
            recipient_balance = credit(db, recipient, amount).await?;
        }
    }
    Ok((sender_balance, recipient_balance))
}

fn lock_order(a: i32, b: i32) -> [i32; 2] {
    if a <= b { [a, b] } else { [b, a] }
}
