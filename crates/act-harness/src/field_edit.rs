#![forbid(unsafe_code)]

//! Reference action: set one field of a shared model.
//!
//! A [`FieldEdit`] keeps the `{old, new}` snapshot of a single field. It is
//! durable as one record in a [`MemoryStore`], keyed `"{field}/{seq}"` so
//! that several edits of the same field are separate records.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use act_core::{Action, ActionHooks, Completion};

use crate::store::MemoryStore;

/// Shared model the edits mutate.
pub type Model<T> = Rc<RefCell<BTreeMap<String, T>>>;

/// Build a model from `(field, value)` pairs.
pub fn model<T, K: Into<String>>(fields: impl IntoIterator<Item = (K, T)>) -> Model<T> {
    Rc::new(RefCell::new(
        fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    ))
}

static NEXT_RECORD: AtomicU64 = AtomicU64::new(1);

/// Set `field` of a model to a new value.
pub struct FieldEdit<T> {
    model: Model<T>,
    store: MemoryStore,
    field: String,
    record: String,
    description: String,
    old: Option<T>,
    new: T,
}

impl<T: fmt::Debug> fmt::Debug for FieldEdit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEdit")
            .field("field", &self.field)
            .field("record", &self.record)
            .field("old", &self.old)
            .field("new", &self.new)
            .finish()
    }
}

impl<T> FieldEdit<T>
where
    T: Clone + fmt::Display + 'static,
{
    #[must_use]
    pub fn new(model: &Model<T>, store: &MemoryStore, field: impl Into<String>, new: T) -> Self {
        let field = field.into();
        let record = format!("{field}/{}", NEXT_RECORD.fetch_add(1, Ordering::Relaxed));
        Self {
            model: Rc::clone(model),
            store: store.clone(),
            description: format!("Set {field}"),
            field,
            record,
            old: None,
            new,
        }
    }

    /// Storage key of this edit.
    #[must_use]
    pub fn record(&self) -> &str {
        &self.record
    }

    /// Wrap into an [`Action`], returning the record key alongside.
    #[must_use]
    pub fn into_action(self) -> (Action, String) {
        let record = self.record.clone();
        (Action::new(self), record)
    }

    fn write_new(&mut self) {
        self.model
            .borrow_mut()
            .insert(self.field.clone(), self.new.clone());
    }
}

impl<T> ActionHooks for FieldEdit<T>
where
    T: Clone + fmt::Display + 'static,
{
    fn initialize(&mut self) {
        self.old = self.model.borrow().get(&self.field).cloned();
        self.write_new();
    }

    fn undo(&mut self) {
        let mut model = self.model.borrow_mut();
        match &self.old {
            Some(old) => {
                model.insert(self.field.clone(), old.clone());
            }
            None => {
                model.remove(&self.field);
            }
        }
    }

    fn redo(&mut self) {
        self.write_new();
    }

    fn persist(&mut self) -> Completion {
        self.store.put(self.record.clone(), self.new.to_string())
    }

    fn destroy(&mut self) -> Completion {
        self.store.delete(self.record.clone())
    }

    fn description(&self) -> &str {
        &self.description
    }
}
