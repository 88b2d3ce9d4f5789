#![forbid(unsafe_code)]

//! Reversible actions with durable-storage hooks.
//!
//! An [`Action`] wraps user-supplied behavior behind the [`ActionHooks`]
//! capability trait: three synchronous hooks that mutate the caller's model
//! (`initialize`, `undo`, `redo`) and two asynchronous hooks that talk to the
//! storage backend (`persist`, `destroy`). On top of that the action tracks a
//! single bit of durability state, `saved`.
//!
//! # Invariants
//!
//! - `saved` starts `false`.
//! - `saved` only changes inside [`Action::commit`], and only after the
//!   backend completion resolved successfully.
//! - A failed commit leaves `saved` at its pre-commit value.
//!
//! # Two ways to build an action
//!
//! Implement [`ActionHooks`] on a struct that owns the action's state, or
//! hand five closures over an owned state to [`ActionBuilder`]:
//!
//! ```
//! use act_core::{Action, CommitError};
//! use futures_lite::FutureExt;
//!
//! let action = Action::builder(0_i32)
//!     .on_initialize(|n| *n = 1)
//!     .on_undo(|n| *n = 0)
//!     .on_redo(|n| *n = 1)
//!     .on_persist(|_| async { Ok::<(), CommitError>(()) }.boxed_local())
//!     .on_destroy(|_| async { Ok::<(), CommitError>(()) }.boxed_local())
//!     .with_description("Set flag")
//!     .build()
//!     .expect("all hooks present");
//! assert!(!action.is_saved());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_lite::future::BoxedLocal;

use crate::commit::CommitOp;
use crate::error::{BuildError, CommitError};

/// Asynchronous result of a persist or destroy hook.
pub type Completion = BoxedLocal<Result<(), CommitError>>;

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionId(u64);

impl ActionId {
    fn next() -> Self {
        Self(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create an ID from a raw value.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Names the five hooks an action is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Initialize,
    Undo,
    Redo,
    Persist,
    Destroy,
}

impl HookKind {
    /// Hook name as used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Persist => "persist",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-supplied behavior of an action.
///
/// The implementor owns the action's state. The synchronous hooks mutate it
/// (and whatever external model it points at); the asynchronous hooks return
/// a `'static` future, so anything the backend needs must be cloned into it.
pub trait ActionHooks {
    /// Apply the action for the first time.
    fn initialize(&mut self);

    /// Revert the action's effect.
    fn undo(&mut self);

    /// Re-apply the action after it was undone.
    fn redo(&mut self);

    /// Write the action's current effect to durable storage.
    fn persist(&mut self) -> Completion;

    /// Remove the action's effect from durable storage.
    fn destroy(&mut self) -> Completion;

    /// Human-readable description for UI display.
    fn description(&self) -> &str {
        "Action"
    }
}

/// A reversible unit of work tracked by a [`Director`](crate::Director).
pub struct Action {
    id: ActionId,
    description: String,
    saved: bool,
    hooks: Box<dyn ActionHooks>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("saved", &self.saved)
            .finish()
    }
}

impl Action {
    /// Wrap a hooks implementation.
    #[must_use]
    pub fn new(hooks: impl ActionHooks + 'static) -> Self {
        Self::from_boxed(Box::new(hooks))
    }

    /// Wrap an already boxed hooks implementation.
    #[must_use]
    pub fn from_boxed(hooks: Box<dyn ActionHooks>) -> Self {
        Self {
            id: ActionId::next(),
            description: hooks.description().to_owned(),
            saved: false,
            hooks,
        }
    }

    /// Start building an action from closures over `state`.
    pub fn builder<S: 'static>(state: S) -> ActionBuilder<S> {
        ActionBuilder::new(state)
    }

    /// Override the description reported by the hooks.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn id(&self) -> ActionId {
        self.id
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the action's current effect is durably persisted.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// The operation the next [`commit`](Self::commit) would issue.
    #[must_use]
    pub fn pending_op(&self) -> CommitOp {
        if self.saved {
            CommitOp::Destroy
        } else {
            CommitOp::Persist
        }
    }

    pub(crate) fn initialize(&mut self) {
        self.hooks.initialize();
    }

    pub(crate) fn undo(&mut self) {
        self.hooks.undo();
    }

    pub(crate) fn redo(&mut self) {
        self.hooks.redo();
    }

    /// Bring storage in line with the action's durability flag.
    ///
    /// A saved action is destroyed, an unsaved one is persisted. The flag
    /// flips only once the completion resolves `Ok`; on failure the error is
    /// returned and the flag is left untouched.
    pub async fn commit(&mut self) -> Result<CommitOp, CommitError> {
        let op = self.pending_op();
        let completion = match op {
            CommitOp::Persist => self.hooks.persist(),
            CommitOp::Destroy => self.hooks.destroy(),
        };
        completion.await?;
        self.saved = op == CommitOp::Persist;
        tracing::trace!(
            target: "act.commit",
            action = %self.id,
            op = %op,
            saved = self.saved,
            "action committed"
        );
        Ok(op)
    }
}

// ============================================================================
// Closure-based construction
// ============================================================================

type MutateFn<S> = Box<dyn FnMut(&mut S)>;
type CommitFn<S> = Box<dyn FnMut(&S) -> Completion>;

/// Builds an [`Action`] from five closures over an owned state.
///
/// [`build`](Self::build) refuses to produce an action unless every hook
/// was supplied.
pub struct ActionBuilder<S> {
    state: S,
    description: Option<String>,
    initialize: Option<MutateFn<S>>,
    undo: Option<MutateFn<S>>,
    redo: Option<MutateFn<S>>,
    persist: Option<CommitFn<S>>,
    destroy: Option<CommitFn<S>>,
}

impl<S> fmt::Debug for ActionBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBuilder")
            .field("description", &self.description)
            .field("initialize", &self.initialize.is_some())
            .field("undo", &self.undo.is_some())
            .field("redo", &self.redo.is_some())
            .field("persist", &self.persist.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

impl<S: 'static> ActionBuilder<S> {
    #[must_use]
    pub fn new(state: S) -> Self {
        Self {
            state,
            description: None,
            initialize: None,
            undo: None,
            redo: None,
            persist: None,
            destroy: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn on_initialize(mut self, f: impl FnMut(&mut S) + 'static) -> Self {
        self.initialize = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_undo(mut self, f: impl FnMut(&mut S) + 'static) -> Self {
        self.undo = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_redo(mut self, f: impl FnMut(&mut S) + 'static) -> Self {
        self.redo = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_persist(mut self, f: impl FnMut(&S) -> Completion + 'static) -> Self {
        self.persist = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_destroy(mut self, f: impl FnMut(&S) -> Completion + 'static) -> Self {
        self.destroy = Some(Box::new(f));
        self
    }

    /// Finish the action, checking that all five hooks are present.
    pub fn build(self) -> Result<Action, BuildError> {
        let hooks = FnHooks {
            description: self
                .description
                .unwrap_or_else(|| String::from("Action")),
            initialize: self
                .initialize
                .ok_or(BuildError::MissingHook(HookKind::Initialize))?,
            undo: self.undo.ok_or(BuildError::MissingHook(HookKind::Undo))?,
            redo: self.redo.ok_or(BuildError::MissingHook(HookKind::Redo))?,
            persist: self
                .persist
                .ok_or(BuildError::MissingHook(HookKind::Persist))?,
            destroy: self
                .destroy
                .ok_or(BuildError::MissingHook(HookKind::Destroy))?,
            state: self.state,
        };
        Ok(Action::new(hooks))
    }
}

struct FnHooks<S> {
    state: S,
    description: String,
    initialize: MutateFn<S>,
    undo: MutateFn<S>,
    redo: MutateFn<S>,
    persist: CommitFn<S>,
    destroy: CommitFn<S>,
}

impl<S> ActionHooks for FnHooks<S> {
    fn initialize(&mut self) {
        (self.initialize)(&mut self.state);
    }

    fn undo(&mut self) {
        (self.undo)(&mut self.state);
    }

    fn redo(&mut self) {
        (self.redo)(&mut self.state);
    }

    fn persist(&mut self) -> Completion {
        (self.persist)(&self.state)
    }

    fn destroy(&mut self) -> Completion {
        (self.destroy)(&self.state)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

// ============================================================================
// Tests
// ============================================================================
