//! Reference numbers for transactions and bulk batches.
//!
//! A reference is a short type prefix followed by ten upper-case
//! alphanumerics, e.g. `DEP3F9A0C21B7`. Randomness only makes collisions
//! unlikely: uniqueness is enforced by the unique index on the reference
//! column, and the recorder regenerates on violation.

use std::fmt;

use uuid::Uuid;

const SUFFIX_LEN: usize = 10;

/// Which event a reference is issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferencePrefix {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
    BulkTransferOut,
    BulkTransferIn,
    BulkBatch,
}

impl ReferencePrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "DEP",
            Self::Withdrawal => "WDL",
            Self::TransferOut => "TRO",
            Self::TransferIn => "TRI",
            Self::BulkTransferOut => "BTO",
            Self::BulkTransferIn => "BTI",
            Self::BulkBatch => "BULK",
        }
    }
}

impl fmt::Display for ReferencePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of candidate references.
///
/// Implementations do not need to guarantee uniqueness; the store does.
pub trait ReferenceGenerator: Send + Sync + fmt::Debug {
    fn generate(&self, prefix: ReferencePrefix) -> String;
}

/// Default generator: prefix plus the first ten hex digits of a v4 UUID.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomReferences;

impl ReferenceGenerator for RandomReferences {
    fn generate(&self, prefix: ReferencePrefix) -> String {
        let random = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        format!("{prefix}{}", &random[..SUFFIX_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_reference_has_prefix_and_suffix() {
        let reference = RandomReferences.generate(ReferencePrefix::BulkBatch);
        assert!(reference.starts_with("BULK"));
        let suffix = &reference["BULK".len()..];
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn consecutive_references_differ() {
        let a = RandomReferences.generate(ReferencePrefix::Deposit);
        let b = RandomReferences.generate(ReferencePrefix::Deposit);
        assert_ne!(a, b);
    }
}
