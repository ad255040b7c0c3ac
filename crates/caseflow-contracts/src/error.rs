//! Error types for the Caseflow aggregation and review pipeline.
//!
//! Nothing here is fatal to the process. Transport failures during
//! aggregation degrade to absent fields; decision failures are surfaced to
//! the caller after rollback.

use thiserror::Error;

/// The unified error type for the Caseflow crates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaseflowError {
    /// A network or HTTP failure talking to the upstream API.
    ///
    /// `status` is set when the server answered with a non-success code.
    #[error("transport error on {resource}{}: {reason}", http_suffix(.status))]
    Transport {
        resource: String,
        status: Option<u16>,
        reason: String,
    },

    /// A decision was missing its diagnosis or treatment plan.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// A write-back was attempted against a case that has no backend record.
    #[error("case '{case_id}' is {origin} data and cannot be written back")]
    NotWritable { case_id: String, origin: String },

    /// Informational: some sub-resources of a case could not be fetched.
    ///
    /// The case is still usable with the listed fields absent.
    #[error("case '{case_id}' is missing {missing}")]
    AggregationDegraded { case_id: String, missing: String },

    /// No case with this id exists in the current registry snapshot.
    #[error("case '{case_id}' not found")]
    CaseNotFound { case_id: String },

    /// The case is not in a state that permits the requested transition.
    #[error("case '{case_id}' is already {from}; only pending cases can be decided")]
    InvalidTransition { case_id: String, from: String },

    /// The decision audit log could not record an entry.
    ///
    /// A decision that cannot be audited cannot proceed.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The local case cache could not be read or written.
    #[error("case cache error: {reason}")]
    CacheError { reason: String },
}

impl CaseflowError {
    /// Shorthand for a transport failure without an HTTP status.
    pub fn transport(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        CaseflowError::Transport {
            resource: resource.into(),
            status: None,
            reason: reason.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, CaseflowError::Transport { .. })
    }
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

/// Convenience alias used throughout the Caseflow crates.
pub type CaseflowResult<T> = Result<T, CaseflowError>;
