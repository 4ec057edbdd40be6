//! FOP Guardrails
//!
//! The safety boundary every plan crosses before it may exist or change
//! state. Evaluation is pure: the same plan and stage always give the same
//! answer, and nothing is cached, so a field mutated between states cannot
//! hide behind an earlier `guardrails_checked` snapshot.
//!
//! # Rules (canonical order, first failure wins)
//!
//! ```text
//! ENV_SCOPE -> BLAST_RADIUS -> ROLLBACK_PRESENT -> WINDOW_DEFINED
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use fop_guardrails::{GuardrailPolicy, Stage};
//!
//! let policy = GuardrailPolicy::default();
//! let passed = policy.evaluate(&plan, Stage::Creation)?;
//! plan.guardrails_checked = passed;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod error;
pub mod policy;
pub mod window;

// Re-exports for convenience
pub use error::GuardrailViolation;
pub use fop_model::GuardrailId;
pub use policy::{GuardrailPolicy, Stage};
pub use window::references_window;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
