//! In-memory thought store for tests and embedding.
//!
//! # Invariants
//! - Behaves like the SQLite store: missing keys yield `record: None`.
//! - While marked unavailable every call fails without touching data.
//! - Parents marked partial are served as `NotRequested`, like a remote
//!   record that still has unfetched children.

use super::thought_store::{StoreError, StoreResult, ThoughtStore};
use crate::index::IndexDelta;
use crate::model::hash::{hash_thought, ContextHash, ValueHash};
use crate::model::lexeme::Lexeme;
use crate::model::load_state::LoadState;
use crate::model::parent::Parent;
use crate::model::path::Context;
use crate::state::{FetchedLexeme, FetchedParent};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

/// Map-backed store that counts load calls.
#[derive(Debug, Default)]
pub struct MemoryThoughtStore {
    lexemes: BTreeMap<ValueHash, Lexeme>,
    parents: BTreeMap<ContextHash, Parent>,
    partial: BTreeSet<ContextHash>,
    unavailable: Cell<bool>,
    loads: Cell<usize>,
}

impl MemoryThoughtStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Serves the parent of `context` as incomplete until cleared.
    pub fn set_partial(&mut self, context: &Context, partial: bool) {
        let key = context.canonical().hash();
        if partial {
            self.partial.insert(key);
        } else {
            self.partial.remove(&key);
        }
    }

    /// Number of load calls served so far.
    pub fn load_count(&self) -> usize {
        self.loads.get()
    }

    pub fn lexeme(&self, value: &str) -> Option<&Lexeme> {
        self.lexemes.get(&hash_thought(value))
    }

    pub fn parent(&self, context: &Context) -> Option<&Parent> {
        self.parents.get(&context.canonical().hash())
    }

    pub fn lexeme_count(&self) -> usize {
        self.lexemes.len()
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl ThoughtStore for MemoryThoughtStore {
    fn load_parents(&self, contexts: &[Context]) -> StoreResult<Vec<FetchedParent>> {
        self.check_available()?;
        self.loads.set(self.loads.get() + 1);
        Ok(contexts
            .iter()
            .map(|context| {
                let context = context.canonical();
                let key = context.hash();
                let record = self.parents.get(&key).cloned().map(|mut parent| {
                    if self.partial.contains(&key) {
                        parent.load_state = LoadState::NotRequested;
                    }
                    parent
                });
                FetchedParent { context, record }
            })
            .collect())
    }

    fn load_lexemes(&self, values: &[String]) -> StoreResult<Vec<FetchedLexeme>> {
        self.check_available()?;
        self.loads.set(self.loads.get() + 1);
        Ok(values
            .iter()
            .map(|value| FetchedLexeme {
                value: value.clone(),
                record: self.lexemes.get(&hash_thought(value)).cloned(),
            })
            .collect())
    }

    fn apply_delta(&mut self, delta: &IndexDelta) -> StoreResult<()> {
        self.check_available()?;
        for (key, record) in &delta.lexemes {
            match record {
                Some(lexeme) => self.lexemes.insert(*key, lexeme.clone()),
                None => self.lexemes.remove(key),
            };
        }
        for (key, record) in &delta.parents {
            match record {
                Some(parent) => self.parents.insert(*key, parent.clone()),
                None => self.parents.remove(key),
            };
        }
        Ok(())
    }
}
