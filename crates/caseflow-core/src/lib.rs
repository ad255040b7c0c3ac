//! # caseflow-core
//!
//! Case aggregation and the clinical review workflow.
//!
//! This crate provides:
//! - The two seams (`ResourceClient`, `DecisionAudit`) implemented elsewhere
//! - The `CaseAssembler` that fans out per-patient sub-fetches
//! - The `FallbackStore` with its sample dataset and optional `CaseCache`
//! - The `CaseRegistry` holding the published snapshot
//! - The `ReviewWorkflow` state machine with optimistic edits and rollback
//! - The `ReviewDesk` facade that wires them together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caseflow_core::{CaseflowConfig, ReviewDesk};
//!
//! let desk = ReviewDesk::new(client, audit, &CaseflowConfig::default());
//! let outcome = desk.refresh().await;
//! ```

pub mod assembler;
pub mod config;
pub mod desk;
pub mod fallback;
pub mod registry;
pub mod review;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{AssembledBatch, CaseAssembler, FallbackReason};
pub use config::CaseflowConfig;
pub use desk::{RefreshOutcome, ReviewDesk};
pub use fallback::{CaseCache, FallbackStore};
pub use registry::{CaseRegistry, Snapshot};
pub use review::ReviewWorkflow;
