#![forbid(unsafe_code)]

//! Error taxonomy for actions, saves and configuration.
//!
//! Invalid transitions (`undo`/`redo` with nothing to do) are not errors:
//! they are reported as `false` by the director. Everything here is a
//! condition the caller must handle.

use std::fmt;

use crate::action::{ActionId, HookKind};
use crate::commit::CommitOp;
use crate::Action;

/// Failure reported by a persist/destroy completion.
///
/// Produced by the storage collaborator. Timeouts and cancellation are the
/// backend's business and surface here as ordinary failed completions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// The backend refused the operation.
    #[error("backend rejected commit: {0}")]
    Rejected(String),
    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The backend did not answer in time.
    #[error("commit timed out")]
    TimedOut,
    /// The request was cancelled before completing.
    #[error("commit cancelled")]
    Cancelled,
    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// A save stopped at a failed commit.
///
/// Every commit before `completed` succeeded and is reflected in the
/// director's state. The failed action keeps its pre-commit `saved` flag.
#[derive(thiserror::Error)]
#[error("{op} of action {action} failed after {completed} commit(s): {source}")]
pub struct SaveError {
    /// Action whose commit failed.
    pub action: ActionId,
    /// What the failed commit was trying to do.
    pub op: CommitOp,
    /// Number of commits that completed before the failure.
    pub completed: usize,
    /// The completion's failure.
    #[source]
    pub source: CommitError,
    /// The trailing action handed to `save`, returned to the caller.
    pub trailing: Option<Action>,
}

impl fmt::Debug for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveError")
            .field("action", &self.action)
            .field("op", &self.op)
            .field("completed", &self.completed)
            .field("source", &self.source)
            .field("trailing", &self.trailing.as_ref().map(Action::id))
            .finish()
    }
}

/// An [`ActionBuilder`](crate::ActionBuilder) was missing a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("action is missing its {0} hook")]
    MissingHook(HookKind),
}

/// Errors from loading a [`DirectorConfig`](crate::DirectorConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading a file.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    /// Validation errors.
    #[error("invalid config: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_error_display() {
        assert_eq!(
            CommitError::Rejected("slot taken".into()).to_string(),
            "backend rejected commit: slot taken"
        );
        assert_eq!(CommitError::TimedOut.to_string(), "commit timed out");
        assert_eq!(CommitError::Other("boom".into()).to_string(), "boom");
    }

    #[test]
    fn build_error_names_hook() {
        let err = BuildError::MissingHook(HookKind::Persist);
        assert_eq!(err.to_string(), "action is missing its persist hook");
    }

    #[test]
    fn validation_error_joins_messages() {
        let err = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "invalid config: a; b");
    }

    #[test]
    fn save_error_exposes_source() {
        use std::error::Error as _;

        let err = SaveError {
            action: ActionId::from_raw(7),
            op: CommitOp::Persist,
            completed: 2,
            source: CommitError::Unavailable("offline".into()),
            trailing: None,
        };
        assert_eq!(
            err.to_string(),
            "persist of action #7 failed after 2 commit(s): backend unavailable: offline"
        );
        assert!(err.source().is_some());
        assert!(format!("{err:?}").contains("SaveError"));
    }
}
