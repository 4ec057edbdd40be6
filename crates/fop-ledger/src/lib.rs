//! FOP Ledger - immutable record of every plan state change
//!
//! Provides:
//! - Append-only storage; no public operation updates or removes an entry
//! - SHA-256 hash chain with integrity verification
//! - Strictly increasing timestamps per plan
//! - Lazy, restartable listing filtered by plan or action
//!
//! # Example
//!
//! ```rust,ignore
//! use fop_ledger::prelude::*;
//!
//! let ledger = AuditLedger::new();
//! ledger.append(NewAuditEntry::new(AuditAction::PlanApproved, "plan-1", "ops@example.com"))?;
//!
//! for entry in ledger.list(AuditQuery::new().for_plan("plan-1")) {
//!     println!("{} {} by {}", entry.created_at, entry.action, entry.performed_by);
//! }
//! ledger.verify_integrity()?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod cursor;
pub mod entry;
pub mod error;
pub mod ledger;

// Re-exports for convenience
pub use cursor::{AuditCursor, AuditQuery, SortOrder};
pub use entry::{AuditAction, AuditDetails, AuditLogEntry, NewAuditEntry, GENESIS_HASH};
pub use error::LedgerError;
pub use ledger::AuditLedger;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the ledger
    pub use crate::{AuditAction, AuditLedger, AuditLogEntry, AuditQuery, LedgerError, NewAuditEntry, SortOrder};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
