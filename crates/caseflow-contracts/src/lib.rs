//! # caseflow-contracts
//!
//! Shared types for the Caseflow case aggregation and clinical review
//! workflow.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, their small derivations, and the error
//! type.

pub mod case;
pub mod consultation;
pub mod decision;
pub mod error;
pub mod patient;
