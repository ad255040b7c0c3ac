//! # caseflow-audit
//!
//! Append-only, SHA-256 hash-chained log of clinical review decisions.
//!
//! Every `DecisionRecord` the review workflow writes is wrapped in a
//! `DecisionEvent` that links to the previous event by hash. Changing any
//! stored byte breaks the chain and is detected by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caseflow_audit::InMemoryDecisionLog;
//!
//! let log = Arc::new(InMemoryDecisionLog::new("desk-session"));
//! let desk = ReviewDesk::new(client, log.clone(), &config);
//! // ... decide ...
//! assert!(log.verify_integrity());
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{DecisionEvent, DecisionLog};
pub use memory::InMemoryDecisionLog;

// ── Tests ─────────────────────────────────────────────────────────────────────
