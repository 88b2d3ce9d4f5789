#![forbid(unsafe_code)]

//! History of applied/undone actions and its durability bookkeeping.
//!
//! The [`Director`] keeps two stacks plus the information needed to bring a
//! storage backend in line with the history on [`save`](Director::save):
//!
//! - **applied**: actions in effect, oldest first
//! - **undone**: actions removed by undo, most recently undone last
//! - **pending destroy**: diverged actions that storage still holds
//! - **needle**: applied actions below this index are known durable
//!
//! ```text
//! push(A) push(B) save()
//! ┌──────────────────────────────────────────────┐
//! │ applied: [A*, B*]   needle: 2   undone: []   │   * = saved
//! └──────────────────────────────────────────────┘
//!
//! undo()
//! ┌──────────────────────────────────────────────┐
//! │ applied: [A*]       needle: 2   undone: [B*] │
//! └──────────────────────────────────────────────┘
//!
//! push(C)  <-- divergence: B can never be redone
//! ┌──────────────────────────────────────────────┐
//! │ applied: [A*, C]    needle: 1   undone: []   │
//! │ pending destroy: [B*]                        │
//! └──────────────────────────────────────────────┘
//!
//! save()  -> destroy B, persist C
//! ┌──────────────────────────────────────────────┐
//! │ applied: [A*, C*]   needle: 2   undone: []   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. An action is in at most one of applied, undone and pending destroy
//!    (the director owns each action exactly once).
//! 2. `is_saved()` ⇔ `needle == applied.len()`.
//! 3. The needle may point past the end of the applied stack after saved
//!    actions are undone: storage then holds effects the history no longer
//!    shows, and the next save destroys them.
//! 4. An action enters pending destroy only if it was saved when it
//!    diverged.
//! 5. After a successful save, `needle == applied.len()`.
//!
//! # Saves
//!
//! [`save`](Director::save) takes `&mut self` for its whole duration, so two
//! saves can never interleave and the history cannot change under a running
//! commit chain.

use std::fmt;

use tracing::Instrument;

use crate::action::{Action, ActionId};
use crate::commit::{
    ChainTargets, CommitPlan, CommitSource, CommitStep, SaveReport, run_chain,
};
use crate::config::DirectorConfig;
use crate::error::SaveError;

/// Snapshot passed to the state-change observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct StateChange {
    /// The history matches durable storage.
    pub saved: bool,
    /// There is an action to undo.
    pub can_undo: bool,
    /// There is an action to redo.
    pub can_redo: bool,
}

type Observer = Box<dyn FnMut(&StateChange)>;

/// Undo/redo history that knows what storage still has to hear about.
pub struct Director {
    applied: Vec<Action>,
    undone: Vec<Action>,
    pending_destroy: Vec<Action>,
    needle: usize,
    observer: Observer,
    config: DirectorConfig,
}

impl fmt::Debug for Director {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Director")
            .field("undo_depth", &self.applied.len())
            .field("redo_depth", &self.undone.len())
            .field("pending_destroy", &self.pending_destroy_count())
            .field("needle", &self.needle)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Director {
    fn default() -> Self {
        Self::new(DirectorConfig::default())
    }
}

impl Director {
    /// Create an empty director.
    #[must_use]
    pub fn new(config: DirectorConfig) -> Self {
        Self {
            applied: Vec::new(),
            undone: Vec::new(),
            pending_destroy: Vec::new(),
            needle: 0,
            observer: Box::new(|_| {}),
            config,
        }
    }

    /// Replace the state-change observer.
    pub fn set_observer(&mut self, observer: impl FnMut(&StateChange) + 'static) {
        self.observer = Box::new(observer);
    }

    // ========================================================================
    // History operations
    // ========================================================================

    /// Apply a new action.
    ///
    /// If actions were undone, the new action diverges from them: saved ones
    /// are queued for destruction, and none of them can be redone anymore.
    pub fn push_action(&mut self, mut action: Action) {
        if !self.undone.is_empty() {
            self.diverge();
        }

        action.initialize();
        tracing::trace!(
            target: "act.history",
            label = %self.config.label,
            action = %action.id(),
            description = action.description(),
            undo_depth = self.applied.len() + 1,
            needle = self.needle,
            "action pushed"
        );
        self.applied.push(action);
        self.enforce_depth();
        self.emit();
    }

    /// Undo the most recent action. Returns `false` if there is none.
    pub fn undo(&mut self) -> bool {
        let Some(mut action) = self.applied.pop() else {
            return false;
        };
        action.undo();
        tracing::trace!(
            target: "act.history",
            label = %self.config.label,
            action = %action.id(),
            undo_depth = self.applied.len(),
            redo_depth = self.undone.len() + 1,
            "action undone"
        );
        self.undone.push(action);
        self.emit();
        true
    }

    /// Redo the most recently undone action. Returns `false` if there is none.
    pub fn redo(&mut self) -> bool {
        let Some(mut action) = self.undone.pop() else {
            return false;
        };
        action.redo();
        tracing::trace!(
            target: "act.history",
            label = %self.config.label,
            action = %action.id(),
            undo_depth = self.applied.len() + 1,
            redo_depth = self.undone.len(),
            "action redone"
        );
        self.applied.push(action);
        self.emit();
        true
    }

    /// Forget all history without calling any hook.
    pub fn reset(&mut self) {
        tracing::trace!(
            target: "act.history",
            label = %self.config.label,
            dropped = self.applied.len() + self.undone.len() + self.pending_destroy.len(),
            "history reset"
        );
        self.applied.clear();
        self.undone.clear();
        self.pending_destroy.clear();
        self.needle = 0;
        self.emit();
    }

    fn diverge(&mut self) {
        let before = self.pending_destroy.len();
        let discarded = self.undone.len();
        self.pending_destroy
            .extend(self.undone.drain(..).filter(Action::is_saved));

        let queued = self.pending_destroy.len() - before;
        if queued > 0 {
            self.needle = self.applied.len();
        }
        tracing::debug!(
            target: "act.history",
            label = %self.config.label,
            discarded,
            queued,
            pending_destroy = self.pending_destroy_count(),
            needle = self.needle,
            "history diverged"
        );
    }

    /// Evict the oldest durable actions beyond `max_depth`.
    fn enforce_depth(&mut self) {
        let Some(max_depth) = self.config.max_depth else {
            return;
        };
        let excess = self.applied.len().saturating_sub(max_depth);
        let evict = excess.min(self.needle);
        if evict == 0 {
            return;
        }
        self.applied.drain(..evict);
        self.needle -= evict;
        tracing::debug!(
            target: "act.history",
            label = %self.config.label,
            evicted = evict,
            undo_depth = self.applied.len(),
            needle = self.needle,
            "durable actions evicted"
        );
    }

    // ========================================================================
    // Saving
    // ========================================================================

    /// The commits the next [`save`](Self::save) without a trailing action
    /// would issue.
    #[must_use]
    pub fn plan_save(&self) -> CommitPlan {
        let mut plan = CommitPlan::default();
        for (i, action) in self.pending_destroy.iter().enumerate() {
            if action.is_saved() {
                plan.push(action, CommitSource::PendingDestroy, i);
            }
        }
        for (i, action) in self.undone.iter().enumerate() {
            if action.is_saved() {
                plan.push(action, CommitSource::Undone, i);
            }
        }
        for (i, action) in self.applied.iter().enumerate().skip(self.needle) {
            if action.is_saved() {
                tracing::trace!(
                    target: "act.commit",
                    label = %self.config.label,
                    action = %action.id(),
                    "already durable above needle, skipped"
                );
                continue;
            }
            plan.push(action, CommitSource::Applied, i);
        }
        plan
    }

    /// Bring storage in line with the history.
    ///
    /// Destroys diverged and undone-but-saved actions, then persists every
    /// applied action above the needle, then the `trailing` action (after
    /// initializing it). Commits run one at a time, each awaited before the
    /// next starts.
    ///
    /// The trailing action is not added to the history; it is handed back in
    /// the report or the error.
    ///
    /// # Errors
    ///
    /// Stops at the first failed commit. Commits that completed before it
    /// stay reflected in the history; the failed action keeps its flag and
    /// the needle stays below it, so saving again retries from there.
    ///
    /// # Cancellation
    ///
    /// Dropping the future mid-chain keeps every commit that already
    /// completed and loses none of the pending destroys; the next save picks
    /// up the rest. No state change is emitted for a dropped save.
    pub async fn save(&mut self, trailing: Option<Action>) -> Result<SaveReport, SaveError> {
        let mut trailing = trailing;
        self.prune_destroyed();
        let mut plan = self.plan_save();
        if let Some(action) = trailing.as_mut() {
            action.initialize();
            plan.push(action, CommitSource::Trailing, 0);
        }

        if plan.is_empty() {
            tracing::debug!(
                target: "act.commit",
                label = %self.config.label,
                "nothing to commit"
            );
            return Ok(SaveReport {
                steps: Vec::new(),
                trailing,
            });
        }

        let span = tracing::debug_span!(
            "act.save",
            label = %self.config.label,
            steps = plan.len(),
            destroys = plan.destroy_count(),
        );

        let mut session = SaveSession {
            applied: &mut self.applied,
            undone: &mut self.undone,
            pending: &mut self.pending_destroy,
            needle: &mut self.needle,
            trailing,
        };
        let result = run_chain(&plan, &mut session).instrument(span).await;
        let SaveSession { trailing, .. } = session;
        self.prune_destroyed();

        let outcome = match result {
            Ok(completed) => {
                self.needle = self.applied.len();
                tracing::debug!(
                    target: "act.commit",
                    label = %self.config.label,
                    completed,
                    needle = self.needle,
                    "save completed"
                );
                Ok(SaveReport {
                    steps: plan.steps().to_vec(),
                    trailing,
                })
            }
            Err(failure) => {
                tracing::debug!(
                    target: "act.commit",
                    label = %self.config.label,
                    completed = failure.completed,
                    needle = self.needle,
                    pending_destroy = self.pending_destroy.len(),
                    "save aborted"
                );
                Err(SaveError {
                    action: failure.step.action,
                    op: failure.step.op,
                    completed: failure.completed,
                    source: failure.error,
                    trailing,
                })
            }
        };
        self.emit();
        outcome
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether storage reflects the history exactly.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.needle == self.applied.len()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.applied.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Current observer snapshot.
    #[must_use]
    pub fn state(&self) -> StateChange {
        StateChange {
            saved: self.is_saved(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }

    /// Durability boundary within the applied stack.
    #[must_use]
    pub fn needle(&self) -> usize {
        self.needle
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.applied.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    #[must_use]
    pub fn pending_destroy_count(&self) -> usize {
        self.pending().count()
    }

    /// IDs of actions waiting to be destroyed, in commit order.
    #[must_use]
    pub fn pending_destroy_ids(&self) -> Vec<ActionId> {
        self.pending().map(Action::id).collect()
    }

    /// IDs of applied actions, oldest first.
    #[must_use]
    pub fn applied_ids(&self) -> Vec<ActionId> {
        self.applied.iter().map(Action::id).collect()
    }

    /// IDs of undone actions, next redo last.
    #[must_use]
    pub fn undone_ids(&self) -> Vec<ActionId> {
        self.undone.iter().map(Action::id).collect()
    }

    /// Whether the action with `id` is tracked and saved.
    #[must_use]
    pub fn is_action_saved(&self, id: ActionId) -> Option<bool> {
        self.applied
            .iter()
            .chain(&self.undone)
            .chain(self.pending())
            .find(|a| a.id() == id)
            .map(Action::is_saved)
    }

    /// Descriptions of undoable actions (most recent first).
    pub fn undo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.applied
            .iter()
            .rev()
            .take(limit)
            .map(Action::description)
            .collect()
    }

    /// Descriptions of redoable actions (next redo first).
    pub fn redo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.undone
            .iter()
            .rev()
            .take(limit)
            .map(Action::description)
            .collect()
    }

    #[must_use]
    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    /// Pending-destroy entries whose destroy has not succeeded yet.
    fn pending(&self) -> impl Iterator<Item = &Action> {
        self.pending_destroy.iter().filter(|a| a.is_saved())
    }

    /// Drop pending-destroy entries a commit chain already destroyed.
    fn prune_destroyed(&mut self) {
        self.pending_destroy.retain(Action::is_saved);
    }

    fn emit(&mut self) {
        let state = self.state();
        (self.observer)(&state);
    }
}

/// Borrowed director state for the duration of one commit chain.
struct SaveSession<'d> {
    applied: &'d mut Vec<Action>,
    undone: &'d mut Vec<Action>,
    /// Stays in place while the chain runs, so a save dropped mid-chain
    /// loses nothing. Destroyed entries turn unsaved and are pruned later.
    pending: &'d mut Vec<Action>,
    needle: &'d mut usize,
    trailing: Option<Action>,
}

impl ChainTargets for SaveSession<'_> {
    fn action_mut(&mut self, step: &CommitStep) -> Option<&mut Action> {
        let action = match step.source {
            CommitSource::PendingDestroy => self.pending.get_mut(step.position),
            CommitSource::Undone => self.undone.get_mut(step.position),
            CommitSource::Applied => self.applied.get_mut(step.position),
            CommitSource::Trailing => self.trailing.as_mut(),
        }?;
        (action.id() == step.action).then_some(action)
    }

    fn committed(&mut self, step: &CommitStep) {
        match step.source {
            CommitSource::PendingDestroy | CommitSource::Trailing => {}
            CommitSource::Undone => {
                // Position this action would take in the applied stack if
                // every undone action were redone.
                let redo_position =
                    self.applied.len() + (self.undone.len() - 1 - step.position);
                *self.needle = (*self.needle).min(redo_position);
            }
            CommitSource::Applied => *self.needle = step.position + 1,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Completion;
    use crate::commit::CommitOp;
    use crate::error::CommitError;
    use futures_lite::FutureExt;
    use futures_lite::future::block_on;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn ok() -> Completion {
        async { Ok(()) }.boxed_local()
    }

    /// Action over a shared counter: initialize/redo add `delta`, undo
    /// subtracts it.
    fn add(counter: &Rc<Cell<i64>>, delta: i64) -> Action {
        let (c1, c2, c3) = (counter.clone(), counter.clone(), counter.clone());
        Action::builder(())
            .on_initialize(move |_| c1.set(c1.get() + delta))
            .on_undo(move |_| c2.set(c2.get() - delta))
            .on_redo(move |_| c3.set(c3.get() + delta))
            .on_persist(|_| ok())
            .on_destroy(|_| ok())
            .with_description(format!("add {delta}"))
            .build()
            .unwrap()
    }

    fn failing_persist(failures: Rc<Cell<u32>>) -> Action {
        Action::builder(())
            .on_initialize(|_| {})
            .on_undo(|_| {})
            .on_redo(|_| {})
            .on_persist(move |_| {
                let fail = failures.get() > 0;
                if fail {
                    failures.set(failures.get() - 1);
                }
                async move {
                    if fail {
                        Err(CommitError::Unavailable("offline".into()))
                    } else {
                        Ok(())
                    }
                }
                .boxed_local()
            })
            .on_destroy(|_| ok())
            .build()
            .unwrap()
    }

    fn save(director: &mut Director) -> Result<SaveReport, SaveError> {
        block_on(director.save(None))
    }

    #[test]
    fn new_director_is_saved_and_empty() {
        let director = Director::default();
        assert!(director.is_saved());
        assert!(!director.can_undo());
        assert!(!director.can_redo());
        assert_eq!(director.needle(), 0);
        assert!(director.plan_save().is_empty());
    }

    #[test]
    fn push_initializes_and_enables_undo() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        director.push_action(add(&counter, 5));

        assert_eq!(counter.get(), 5);
        assert!(director.can_undo());
        assert!(!director.can_redo());
        assert!(!director.is_saved());
    }

    #[test]
    fn undo_then_redo_round_trip() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        director.push_action(add(&counter, 5));

        assert!(director.undo());
        assert_eq!(counter.get(), 0);
        assert!(director.can_redo());
        assert!(director.is_saved(), "nothing applied, nothing stored");

        assert!(director.redo());
        assert_eq!(counter.get(), 5);
        assert!(!director.can_redo());
        assert!(!director.is_saved());
    }

    #[test]
    fn noop_undo_redo_report_false_without_emitting() {
        let events = Rc::new(Cell::new(0));
        let seen = events.clone();
        let mut director = Director::default();
        director.set_observer(move |_| seen.set(seen.get() + 1));

        assert!(!director.undo());
        assert!(!director.redo());
        assert_eq!(events.get(), 0);
    }

    #[test]
    fn observer_sees_every_mutation() {
        let states = Rc::new(RefCell::new(Vec::new()));
        let sink = states.clone();
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        director.set_observer(move |s| sink.borrow_mut().push(*s));

        director.push_action(add(&counter, 1));
        director.undo();
        director.redo();
        save(&mut director).unwrap();
        director.reset();

        let states = states.borrow();
        assert_eq!(states.len(), 5);
        assert_eq!(
            states[0],
            StateChange {
                saved: false,
                can_undo: true,
                can_redo: false
            }
        );
        assert_eq!(
            states[1],
            StateChange {
                saved: true,
                can_undo: false,
                can_redo: true
            }
        );
        assert!(states[3].saved);
        assert_eq!(
            states[4],
            StateChange {
                saved: true,
                can_undo: false,
                can_redo: false
            }
        );
    }

    #[test]
    fn save_single_action_advances_needle() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        let action = add(&counter, 1);
        let id = action.id();
        director.push_action(action);

        assert_eq!(director.plan_save().ops(), vec![(id, CommitOp::Persist)]);
        let report = save(&mut director).unwrap();
        assert_eq!(report.completed(), 1);
        assert_eq!(director.needle(), 1);
        assert_eq!(director.is_action_saved(id), Some(true));
        assert!(director.is_saved());
    }

    #[test]
    fn undo_of_saved_action_is_destroyed_on_save() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        let action = add(&counter, 1);
        let id = action.id();
        director.push_action(action);
        save(&mut director).unwrap();

        director.undo();
        assert!(!director.is_saved(), "storage still holds the undone edit");
        assert_eq!(director.plan_save().ops(), vec![(id, CommitOp::Destroy)]);

        save(&mut director).unwrap();
        assert_eq!(director.needle(), 0);
        assert_eq!(director.is_action_saved(id), Some(false));
        assert!(director.is_saved());
        assert!(director.can_redo());
    }

    #[test]
    fn redo_of_saved_action_is_already_durable() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        director.push_action(add(&counter, 1));
        save(&mut director).unwrap();

        director.undo();
        director.redo();
        assert!(director.is_saved());
        assert!(director.plan_save().is_empty());
    }

    #[test]
    fn divergence_queues_saved_undone_actions() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        let a = add(&counter, 1);
        let b = add(&counter, 2);
        let c = add(&counter, 3);
        let (a_id, b_id, c_id) = (a.id(), b.id(), c.id());

        director.push_action(a);
        director.push_action(b);
        save(&mut director).unwrap();
        director.undo();
        director.push_action(c);

        assert_eq!(director.pending_destroy_ids(), vec![b_id]);
        assert_eq!(director.redo_depth(), 0);
        assert_eq!(director.needle(), 1);
        assert_eq!(director.applied_ids(), vec![a_id, c_id]);
        assert_eq!(
            director.plan_save().ops(),
            vec![(b_id, CommitOp::Destroy), (c_id, CommitOp::Persist)]
        );

        save(&mut director).unwrap();
        assert_eq!(director.pending_destroy_count(), 0);
        assert_eq!(director.is_action_saved(a_id), Some(true));
        assert_eq!(director.is_action_saved(b_id), None);
        assert_eq!(director.is_action_saved(c_id), Some(true));
        assert!(director.is_saved());
    }

    #[test]
    fn divergence_drops_unsaved_undone_actions() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        director.push_action(add(&counter, 1));
        save(&mut director).unwrap();
        director.push_action(add(&counter, 2));
        director.undo();
        director.push_action(add(&counter, 3));

        assert_eq!(director.pending_destroy_count(), 0);
        assert_eq!(director.redo_depth(), 0);
        assert_eq!(director.needle(), 1, "needle untouched without destroys");
        assert_eq!(counter.get(), 4);
    }

    #[test]
    fn reset_clears_everything_without_hooks() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        director.push_action(add(&counter, 1));
        director.push_action(add(&counter, 2));
        save(&mut director).unwrap();
        director.undo();
        director.push_action(add(&counter, 4));
        director.undo();

        director.reset();
        assert_eq!(counter.get(), 1, "reset must not undo");
        assert!(director.is_saved());
        assert!(!director.can_undo());
        assert!(!director.can_redo());
        assert_eq!(director.pending_destroy_count(), 0);
        assert_eq!(director.needle(), 0);
    }

    #[test]
    fn empty_save_is_a_noop() {
        let events = Rc::new(Cell::new(0));
        let seen = events.clone();
        let mut director = Director::default();
        director.set_observer(move |_| seen.set(seen.get() + 1));

        let report = save(&mut director).unwrap();
        assert_eq!(report.completed(), 0);
        assert_eq!(director.needle(), 0);
        assert_eq!(events.get(), 0);
    }

    #[test]
    fn trailing_action_is_initialized_committed_and_returned() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        director.push_action(add(&counter, 1));

        let trailing = add(&counter, 10);
        let trailing_id = trailing.id();
        let report = block_on(director.save(Some(trailing))).unwrap();

        assert_eq!(counter.get(), 11);
        assert_eq!(report.completed(), 2);
        assert_eq!(report.steps[1].action, trailing_id);
        assert_eq!(report.steps[1].source, CommitSource::Trailing);
        let trailing = report.trailing.unwrap();
        assert!(trailing.is_saved());
        assert_eq!(director.undo_depth(), 1, "trailing action is not history");
        assert!(director.is_saved());
    }

    #[test]
    fn failed_persist_leaves_needle_short() {
        let counter = Rc::new(Cell::new(0));
        let failures = Rc::new(Cell::new(1));
        let mut director = Director::default();
        let a = add(&counter, 1);
        let flaky = failing_persist(failures.clone());
        let c = add(&counter, 3);
        let (a_id, flaky_id, c_id) = (a.id(), flaky.id(), c.id());
        director.push_action(a);
        director.push_action(flaky);
        director.push_action(c);

        let err = save(&mut director).unwrap_err();
        assert_eq!(err.action, flaky_id);
        assert_eq!(err.op, CommitOp::Persist);
        assert_eq!(err.completed, 1);
        assert_eq!(director.needle(), 1);
        assert!(!director.is_saved());
        assert_eq!(director.is_action_saved(a_id), Some(true));
        assert_eq!(director.is_action_saved(flaky_id), Some(false));
        assert_eq!(director.is_action_saved(c_id), Some(false));

        let report = save(&mut director).unwrap();
        assert_eq!(report.completed(), 2);
        assert!(director.is_saved());
        assert_eq!(director.needle(), 3);
    }

    #[test]
    fn failed_pending_destroy_is_requeued() {
        let counter = Rc::new(Cell::new(0));
        let destroy_fails = Rc::new(Cell::new(true));
        let flag = destroy_fails.clone();
        let stubborn = Action::builder(())
            .on_initialize(|_| {})
            .on_undo(|_| {})
            .on_redo(|_| {})
            .on_persist(|_| ok())
            .on_destroy(move |_| {
                let fail = flag.get();
                async move {
                    if fail {
                        Err(CommitError::Rejected("in use".into()))
                    } else {
                        Ok(())
                    }
                }
                .boxed_local()
            })
            .build()
            .unwrap();
        let stubborn_id = stubborn.id();

        let mut director = Director::default();
        director.push_action(add(&counter, 1));
        director.push_action(stubborn);
        save(&mut director).unwrap();
        director.undo();
        director.push_action(add(&counter, 2));

        let err = save(&mut director).unwrap_err();
        assert_eq!(err.op, CommitOp::Destroy);
        assert_eq!(err.completed, 0);
        assert_eq!(director.pending_destroy_ids(), vec![stubborn_id]);
        assert_eq!(director.needle(), 1);

        destroy_fails.set(false);
        save(&mut director).unwrap();
        assert_eq!(director.pending_destroy_count(), 0);
        assert!(director.is_saved());
    }

    #[test]
    fn dropped_save_keeps_destroyed_and_pending_accounting() {
        let counter = Rc::new(Cell::new(0));
        let slow_destroy = || {
            Action::builder(())
                .on_initialize(|_| {})
                .on_undo(|_| {})
                .on_redo(|_| {})
                .on_persist(|_| ok())
                .on_destroy(|_| {
                    async {
                        futures_lite::future::yield_now().await;
                        Ok(())
                    }
                    .boxed_local()
                })
                .build()
                .unwrap()
        };

        let mut director = Director::default();
        director.push_action(add(&counter, 1));
        director.push_action(slow_destroy());
        director.push_action(slow_destroy());
        save(&mut director).unwrap();
        director.undo();
        director.undo();
        director.push_action(add(&counter, 2));
        assert_eq!(director.pending_destroy_count(), 2);

        // First destroy completes, second is in flight when the save drops.
        {
            let mut saving = Box::pin(director.save(None));
            for _ in 0..2 {
                assert!(block_on(futures_lite::future::poll_once(&mut saving)).is_none());
            }
        }
        assert_eq!(director.pending_destroy_count(), 1);
        let plan = director.plan_save();
        assert_eq!(plan.destroy_count(), 1);
        assert_eq!(plan.persist_count(), 1);

        let report = save(&mut director).unwrap();
        assert_eq!(report.completed(), 2);
        assert_eq!(director.pending_destroy_count(), 0);
        assert!(director.is_saved());
    }

    #[test]
    fn partial_undone_destroy_keeps_redo_accounting() {
        let counter = Rc::new(Cell::new(0));
        let destroy_fails = Rc::new(Cell::new(false));
        let flag = destroy_fails.clone();
        let first = Action::builder(())
            .on_initialize(|_| {})
            .on_undo(|_| {})
            .on_redo(|_| {})
            .on_persist(|_| ok())
            .on_destroy(move |_| {
                let fail = flag.get();
                async move {
                    if fail {
                        Err(CommitError::TimedOut)
                    } else {
                        Ok(())
                    }
                }
                .boxed_local()
            })
            .build()
            .unwrap();
        let second = add(&counter, 2);

        let mut director = Director::default();
        director.push_action(first);
        director.push_action(second);
        save(&mut director).unwrap();
        director.undo();
        director.undo();

        // Destroys run bottom of the undone stack first: `second`, then
        // `first`, which fails.
        destroy_fails.set(true);
        assert!(save(&mut director).is_err());
        assert_eq!(director.needle(), 1);

        director.redo();
        assert!(director.is_saved(), "first is still stored");
        director.redo();
        assert!(!director.is_saved(), "second was destroyed");
        assert_eq!(director.plan_save().persist_count(), 1);
    }

    #[test]
    fn depth_limit_evicts_only_durable_actions() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::new(DirectorConfig::new("limited", 2));
        for delta in 1..=3 {
            director.push_action(add(&counter, delta));
        }
        assert_eq!(director.undo_depth(), 3, "unsaved actions are never evicted");

        save(&mut director).unwrap();
        director.push_action(add(&counter, 4));
        assert_eq!(director.undo_depth(), 2);
        assert_eq!(director.needle(), 1);
        assert_eq!(director.undo_descriptions(5), vec!["add 4", "add 3"]);
        assert_eq!(director.plan_save().persist_count(), 1);
    }

    #[test]
    fn descriptions_follow_stack_order() {
        let counter = Rc::new(Cell::new(0));
        let mut director = Director::default();
        for delta in 1..=3 {
            director.push_action(add(&counter, delta));
        }
        director.undo();
        director.undo();

        assert_eq!(director.undo_descriptions(5), vec!["add 1"]);
        assert_eq!(director.redo_descriptions(1), vec!["add 2"]);
        assert_eq!(director.redo_descriptions(5), vec!["add 2", "add 3"]);
    }

    #[test]
    fn debug_impl() {
        let director = Director::default();
        let debug = format!("{director:?}");
        assert!(debug.contains("Director"));
        assert!(debug.contains("needle"));
    }
}
