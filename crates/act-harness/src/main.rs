#![forbid(unsafe_code)]

//! Scripted Act session.
//!
//! Walks through edits, undo, divergence, a failed save and its retry,
//! logging every step. Run with `RUST_LOG=act=trace` for the full picture.

use act_core::{CommitError, Director, DirectorConfig};
use act_harness::{FieldEdit, MemoryStore, init_tracing, model};
use futures_lite::future::block_on;

fn main() {
    if let Err(err) = init_tracing("act=debug") {
        eprintln!("logging disabled: {err}");
    }

    let doc = model([("fancy", 1), ("coolness", 2), ("awesomeness", 42)]);
    let store = MemoryStore::new();
    let mut director = Director::new(DirectorConfig::default().with_label("demo"));
    director.set_observer(|state| {
        tracing::info!(
            saved = state.saved,
            can_undo = state.can_undo,
            can_redo = state.can_redo,
            "state changed"
        );
    });

    director.push_action(FieldEdit::new(&doc, &store, "fancy", 0).into_action().0);
    director.push_action(FieldEdit::new(&doc, &store, "coolness", 7).into_action().0);
    report("after two edits", &director, &store);

    if let Err(err) = block_on(director.save(None)) {
        tracing::error!(error = %err, "initial save failed");
    }
    report("after save", &director, &store);

    director.undo();
    director.push_action(FieldEdit::new(&doc, &store, "awesomeness", 7).into_action().0);
    tracing::info!(plan = %director.plan_save(), "diverged, next save");

    store.fail_next(1, CommitError::Unavailable("network down".into()));
    match block_on(director.save(None)) {
        Ok(_) => tracing::warn!("save unexpectedly succeeded"),
        Err(err) => tracing::warn!(error = %err, "save failed, retrying"),
    }
    match block_on(director.save(None)) {
        Ok(summary) => tracing::info!(commits = summary.completed(), "retry succeeded"),
        Err(err) => tracing::error!(error = %err, "retry failed"),
    }
    report("final", &director, &store);
}

fn report(stage: &str, director: &Director, store: &MemoryStore) {
    tracing::info!(
        stage,
        saved = director.is_saved(),
        needle = director.needle(),
        undo_depth = director.undo_depth(),
        records = ?store.keys(),
        "checkpoint"
    );
}
