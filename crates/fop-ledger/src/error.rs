//! Ledger errors

/// Audit ledger errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Submitted entry is missing a required field or breaks ordering
    #[error("invalid audit entry: {0}")]
    InvalidEntry(String),

    /// Stored chain no longer verifies
    #[error("audit chain integrity violation at sequence {sequence}")]
    IntegrityViolation {
        /// First entry that fails verification
        sequence: u64,
    },
}

impl LedgerError {
    /// Create invalid-entry error for a blank field
    #[inline]
    #[must_use]
    pub fn empty_field(field: &str) -> Self {
        Self::InvalidEntry(format!("field '{field}' must not be empty"))
    }
}
