//! The module contains the error the engine can throw.
//!
//! Every variant except [`Database`] is raised before the unit of work
//! commits, so the caller never observes a partial effect:
//!
//! - [`Validation`] malformed or out-of-range input.
//! - [`InsufficientFunds`] a debit would take a balance below zero.
//! - [`SelfTransfer`] sender and recipient are the same user.
//! - [`RecipientNotFound`] the transfer target does not exist.
//! - [`KeyNotFound`] any other missing (or not owned) record.
//! - [`DuplicateReference`] reference generation kept colliding.
//! - [`Database`] the storage layer failed; the unit of work rolled back.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`SelfTransfer`]: EngineError::SelfTransfer
//!  [`RecipientNotFound`]: EngineError::RecipientNotFound
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`DuplicateReference`]: EngineError::DuplicateReference
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Cannot transfer to yourself")]
    SelfTransfer,
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Could not allocate a unique reference for {0}")]
    DuplicateReference(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::SelfTransfer, Self::SelfTransfer) => true,
            (Self::RecipientNotFound(a), Self::RecipientNotFound(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::DuplicateReference(a), Self::DuplicateReference(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
