#![forbid(unsafe_code)]

//! Commit plans and the chain runner behind [`Director::save`].
//!
//! A save is planned as an explicit, ordered list of [`CommitStep`]s and then
//! executed by a single runner that awaits each step before starting the
//! next one:
//!
//! ```text
//!  plan:   [ destroy #4 ][ destroy #2 ][ persist #5 ][ persist #6 ][ persist #9 ]
//!            pending       undone        applied      applied       trailing
//!
//!  run:    commit ──ok──► commit ──ok──► commit ──ok──► commit ──ok──► commit
//!                                          │
//!                                          └─err──► stop, report step + error
//! ```
//!
//! # Ordering
//!
//! 1. Pending destroys (diverged actions that were saved).
//! 2. Undone actions that are still saved, bottom of the undone stack first.
//! 3. Applied actions at or above the needle, oldest first.
//! 4. The trailing action, if one was given.
//!
//! Destroys always precede persists, and persists follow creation order.
//!
//! [`Director::save`]: crate::Director::save

use std::fmt;

use crate::action::{Action, ActionId};
use crate::error::CommitError;

/// What a single commit does to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum CommitOp {
    /// Write the action's effect.
    Persist,
    /// Remove the action's effect.
    Destroy,
}

impl fmt::Display for CommitOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Persist => "persist",
            Self::Destroy => "destroy",
        })
    }
}

/// Where the committing action lives while the chain runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum CommitSource {
    /// The pending-destroy set.
    PendingDestroy,
    /// The undone stack.
    Undone,
    /// The applied stack.
    Applied,
    /// The trailing action passed to `save`.
    Trailing,
}

/// One element of a [`CommitPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct CommitStep {
    /// Action to commit.
    pub action: ActionId,
    /// Operation the commit issues.
    pub op: CommitOp,
    /// Container holding the action.
    pub source: CommitSource,
    /// Index of the action within its container.
    pub position: usize,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.op)
    }
}

/// Ordered list of commits a save will issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct CommitPlan {
    steps: Vec<CommitStep>,
}

impl CommitPlan {
    pub(crate) fn push(&mut self, action: &Action, source: CommitSource, position: usize) {
        self.steps.push(CommitStep {
            action: action.id(),
            op: action.pending_op(),
            source,
            position,
        });
    }

    #[must_use]
    pub fn steps(&self) -> &[CommitStep] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `(action, op)` pairs in execution order.
    #[must_use]
    pub fn ops(&self) -> Vec<(ActionId, CommitOp)> {
        self.steps.iter().map(|s| (s.action, s.op)).collect()
    }

    /// Number of destroy steps.
    #[must_use]
    pub fn destroy_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.op == CommitOp::Destroy)
            .count()
    }

    /// Number of persist steps.
    #[must_use]
    pub fn persist_count(&self) -> usize {
        self.len() - self.destroy_count()
    }
}

impl fmt::Display for CommitPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{step}")?;
        }
        f.write_str("]")
    }
}

/// Outcome of a successful save.
pub struct SaveReport {
    /// Commits that were executed, in order.
    pub steps: Vec<CommitStep>,
    /// The trailing action handed to `save`, returned to the caller.
    pub trailing: Option<Action>,
}

impl SaveReport {
    /// Number of commits issued.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.steps.len()
    }
}

impl fmt::Debug for SaveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveReport")
            .field("steps", &self.steps)
            .field("trailing", &self.trailing.as_ref().map(Action::id))
            .finish()
    }
}

// ============================================================================
// Chain runner
// ============================================================================

/// Resolves plan steps to actions and observes their completion.
pub(crate) trait ChainTargets {
    /// The action a step refers to.
    fn action_mut(&mut self, step: &CommitStep) -> Option<&mut Action>;

    /// Called once a step's commit resolved successfully.
    fn committed(&mut self, step: &CommitStep);
}

/// A chain stopped at a failed step.
#[derive(Debug)]
pub(crate) struct ChainFailure {
    pub step: CommitStep,
    pub completed: usize,
    pub error: CommitError,
}

/// Run `plan` strictly in order, awaiting each commit before the next.
///
/// Returns the number of completed commits, or the first failure.
pub(crate) async fn run_chain<T: ChainTargets>(
    plan: &CommitPlan,
    targets: &mut T,
) -> Result<usize, ChainFailure> {
    for (completed, step) in plan.steps().iter().enumerate() {
        let Some(action) = targets.action_mut(step) else {
            return Err(ChainFailure {
                step: *step,
                completed,
                error: CommitError::Other(format!("action {} left the history", step.action)),
            });
        };

        tracing::debug!(
            target: "act.commit",
            action = %step.action,
            op = %step.op,
            index = completed,
            "commit started"
        );

        let outcome = action.commit().await;
        match outcome {
            Ok(_) => {
                targets.committed(step);
                tracing::debug!(
                    target: "act.commit",
                    action = %step.action,
                    op = %step.op,
                    index = completed,
                    "commit completed"
                );
            }
            Err(error) => {
                tracing::warn!(
                    target: "act.commit",
                    action = %step.action,
                    op = %step.op,
                    index = completed,
                    error = %error,
                    "commit failed, chain stopped"
                );
                return Err(ChainFailure {
                    step: *step,
                    completed,
                    error,
                });
            }
        }
    }
    Ok(plan.len())
}

// ============================================================================
// Tests
// ============================================================================
