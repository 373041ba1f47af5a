//! Errors - エラー型と分類
//!
//! Every fallible operation in the crate returns [`VaultError`]. Callers that
//! need to branch on the failure class use [`VaultError::kind`] instead of
//! matching on individual variants.

use std::fmt;

use thiserror::Error;

use super::artifact::ArtifactDescriptor;

/// ErrorKind は失敗の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Gateway call failed (network, auth, rate limit).
    RemoteUnavailable,
    /// Page, block or artifact does not exist.
    NotFound,
    /// Artifact exists but cannot be parsed.
    MalformedArtifact,
    /// A multi-step operation completed some steps and failed others.
    PartialFailure,
    /// Local storage medium failed.
    Storage,
    /// Caller-supplied value or configuration was rejected.
    InvalidInput,
}

/// Phases of a restore, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestoreStep {
    Load,
    UpdateProperties,
    ListChildren,
    ClearBlocks,
    RecreateBlocks,
}

impl RestoreStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::UpdateProperties => "update_properties",
            Self::ListChildren => "list_children",
            Self::ClearBlocks => "clear_blocks",
            Self::RecreateBlocks => "recreate_blocks",
        }
    }
}

impl fmt::Display for RestoreStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One artifact that retention wanted to delete but could not.
#[derive(Debug)]
pub struct EvictionFailure {
    pub descriptor: ArtifactDescriptor,
    pub error: VaultError,
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("remote workspace unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("malformed artifact {location}: {reason}")]
    MalformedArtifact { location: String, reason: String },

    #[error("restore of page {page_id} failed at step {step}: {source}")]
    RestoreFailed {
        page_id: String,
        step: RestoreStep,
        /// A write reached the live page before the failing step.
        modified: bool,
        #[source]
        source: Box<VaultError>,
    },

    #[error("retention evicted {evicted} artifact(s) but {} deletion(s) failed", .failures.len())]
    EvictionIncomplete {
        evicted: usize,
        failures: Vec<EvictionFailure>,
    },

    #[error("refusing to {operation} page {page_id} without a backup: {source}")]
    BackupUnavailable {
        page_id: String,
        operation: &'static str,
        #[source]
        source: Box<VaultError>,
    },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("invalid {kind} id: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VaultError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MalformedArtifact { .. } => ErrorKind::MalformedArtifact,
            Self::RestoreFailed {
                modified, source, ..
            } => {
                if *modified {
                    ErrorKind::PartialFailure
                } else {
                    source.kind()
                }
            }
            Self::EvictionIncomplete { .. } => ErrorKind::PartialFailure,
            Self::BackupUnavailable { source, .. } => source.kind(),
            Self::Storage(_) => ErrorKind::Storage,
            Self::InvalidId { .. } | Self::Config(_) => ErrorKind::InvalidInput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_failure_after_clearing_is_partial() {
        let err = VaultError::RestoreFailed {
            page_id: "p1".to_string(),
            step: RestoreStep::RecreateBlocks,
            modified: true,
            source: Box::new(VaultError::RemoteUnavailable("503".to_string())),
        };
        assert_eq!(err.kind(), ErrorKind::PartialFailure);
        assert!(err.to_string().contains("recreate_blocks"));
    }

    #[test]
    fn restore_failure_before_touching_page_keeps_source_kind() {
        let err = VaultError::RestoreFailed {
            page_id: "p1".to_string(),
            step: RestoreStep::Load,
            modified: false,
            source: Box::new(VaultError::not_found("artifact", "x.json")),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = VaultError::RestoreFailed {
            page_id: "p1".to_string(),
            step: RestoreStep::UpdateProperties,
            modified: false,
            source: Box::new(VaultError::RemoteUnavailable("401".to_string())),
        };
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    }

    #[test]
    fn late_step_failure_without_writes_keeps_source_kind() {
        let err = VaultError::RestoreFailed {
            page_id: "p1".to_string(),
            step: RestoreStep::ListChildren,
            modified: false,
            source: Box::new(VaultError::RemoteUnavailable("503".to_string())),
        };
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    }

    #[test]
    fn io_errors_convert_to_storage() {
        let err: VaultError = std::io::Error::other("disk full").into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
