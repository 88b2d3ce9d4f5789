#![forbid(unsafe_code)]

//! In-memory storage backend with an operation log and failure injection.
//!
//! Every [`MemoryStore`] handle clone shares the same state, so a test can
//! hand clones to actions and inspect the result afterwards.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use act_core::{CommitError, Completion};
use futures_lite::FutureExt;

/// A completed storage operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Put { key: String, value: String },
    Delete { key: String },
}

impl StoreOp {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Put { key, value } => write!(f, "put {key}={value}"),
            Self::Delete { key } => write!(f, "delete {key}"),
        }
    }
}

#[derive(Default)]
struct StoreState {
    entries: BTreeMap<String, String>,
    log: Vec<StoreOp>,
    failures: VecDeque<Option<CommitError>>,
    latency: usize,
    attempts: usize,
    in_flight: usize,
    max_in_flight: usize,
}

/// Counts an operation as in flight until dropped, including when its
/// completion is dropped before resolving.
struct InFlight(Rc<RefCell<StoreState>>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.borrow_mut().in_flight -= 1;
    }
}

/// Shared in-memory key/value backend.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<StoreState>>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryStore")
            .field("entries", &state.entries.len())
            .field("log", &state.log.len())
            .field("queued_failures", &state.failures.len())
            .field("latency", &state.latency)
            .finish()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every completion yield `yields` times before resolving.
    pub fn set_latency(&self, yields: usize) {
        self.state.borrow_mut().latency = yields;
    }

    /// Fail the next `count` operations with `error`.
    pub fn fail_next(&self, count: usize, error: CommitError) {
        let mut state = self.state.borrow_mut();
        state
            .failures
            .extend(std::iter::repeat_n(Some(error), count));
    }

    /// Let `skip` operations through, then fail the one after with `error`.
    pub fn fail_after(&self, skip: usize, error: CommitError) {
        let mut state = self.state.borrow_mut();
        state.failures.extend(std::iter::repeat_n(None, skip));
        state.failures.push_back(Some(error));
    }

    /// Drop any queued failures.
    pub fn clear_failures(&self) {
        self.state.borrow_mut().failures.clear();
    }

    /// Store `value` under `key`.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Completion {
        self.run(StoreOp::Put {
            key: key.into(),
            value: value.into(),
        })
    }

    /// Remove `key`. Deleting a missing key is rejected.
    pub fn delete(&self, key: impl Into<String>) -> Completion {
        self.run(StoreOp::Delete { key: key.into() })
    }

    fn run(&self, op: StoreOp) -> Completion {
        let state = Rc::clone(&self.state);
        async move {
            let latency = {
                let mut s = state.borrow_mut();
                s.attempts += 1;
                s.in_flight += 1;
                s.max_in_flight = s.max_in_flight.max(s.in_flight);
                s.latency
            };
            let in_flight = InFlight(Rc::clone(&state));
            for _ in 0..latency {
                futures_lite::future::yield_now().await;
            }
            drop(in_flight);

            let mut s = state.borrow_mut();
            if let Some(error) = s.failures.pop_front().flatten() {
                tracing::trace!(target: "act.harness", op = %op, error = %error, "store op failed");
                return Err(error);
            }
            match &op {
                StoreOp::Put { key, value } => {
                    s.entries.insert(key.clone(), value.clone());
                }
                StoreOp::Delete { key } => {
                    if s.entries.remove(key).is_none() {
                        return Err(CommitError::Rejected(format!("no record {key}")));
                    }
                }
            }
            tracing::trace!(target: "act.harness", op = %op, "store op applied");
            s.log.push(op);
            Ok(())
        }
        .boxed_local()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.borrow().entries.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.borrow().entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.borrow().entries.keys().cloned().collect()
    }

    /// Successful operations in completion order.
    #[must_use]
    pub fn log(&self) -> Vec<StoreOp> {
        self.state.borrow().log.clone()
    }

    /// Operations started, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.state.borrow().attempts
    }

    /// Highest number of operations in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.state.borrow().max_in_flight
    }
}
