#![forbid(unsafe_code)]

//! Act core
//!
//! Undo/redo history that also keeps track of what a storage backend still
//! has to hear about.
//!
//! # Key Components
//!
//! - [`Action`] - reversible unit of work with persist/destroy hooks
//! - [`ActionHooks`] / [`ActionBuilder`] - the two ways to supply behavior
//! - [`Director`] - applied/undone stacks, divergence handling, saves
//! - [`CommitPlan`] - ordered persist/destroy commits a save issues
//! - [`DirectorConfig`] - labels and depth limits, loadable from TOML/JSON
//!
//! # Example
//!
//! ```
//! use act_core::{Action, Director};
//! use futures_lite::FutureExt;
//! use futures_lite::future::block_on;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let model = Rc::new(Cell::new(false));
//! let (m1, m2, m3) = (model.clone(), model.clone(), model.clone());
//! let action = Action::builder(())
//!     .on_initialize(move |_| m1.set(true))
//!     .on_undo(move |_| m2.set(false))
//!     .on_redo(move |_| m3.set(true))
//!     .on_persist(|_| async { Ok(()) }.boxed_local())
//!     .on_destroy(|_| async { Ok(()) }.boxed_local())
//!     .build()
//!     .unwrap();
//!
//! let mut director = Director::default();
//! director.push_action(action);
//! assert!(model.get());
//! assert!(!director.is_saved());
//!
//! block_on(director.save(None)).unwrap();
//! assert!(director.is_saved());
//!
//! director.undo();
//! assert!(!model.get());
//! ```
//!
//! # Logging
//!
//! Events are emitted with `tracing` under the `act.history` and
//! `act.commit` targets; saves run inside an `act.save` span. The library
//! never installs a subscriber.

pub mod action;
pub mod commit;
pub mod config;
pub mod director;
pub mod error;

pub use action::{Action, ActionBuilder, ActionHooks, ActionId, Completion, HookKind};
pub use commit::{CommitOp, CommitPlan, CommitSource, CommitStep, SaveReport};
pub use config::DirectorConfig;
pub use director::{Director, StateChange};
pub use error::{BuildError, CommitError, ConfigError, SaveError};
