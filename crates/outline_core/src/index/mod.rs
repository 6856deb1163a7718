//! Dual index owner: lexemes by value hash, parent records by context hash.
//!
//! # Responsibility
//! - Own both maps and expose only paired updates that touch both sides.
//! - Record every touched key so a reduction can emit a minimal delta.
//!
//! # Invariants
//! - Direct map mutation is private to this module.
//! - `insert_occurrence`/`remove_occurrence` update the parent child list and
//!   the lexeme entry together, or fail before writing anything.
//! - Root parent records are never removed.
//! - A record stored under a key whose normalized identity differs from the
//!   incoming one is a hash collision and aborts the write.

mod delta;

pub use delta::IndexDelta;

use crate::model::hash::{normalize_value, ContextHash, ValueHash};
use crate::model::lexeme::Lexeme;
use crate::model::load_state::LoadState;
use crate::model::parent::{Child, Parent};
use crate::model::path::Context;
use crate::model::rank::Rank;
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for index writes.
pub type IndexResult<T> = Result<T, IndexError>;

/// Which of the two key spaces collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpace {
    Value,
    Context,
}

/// Errors raised by index writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Two distinct identities map to one key. Fatal for the operation.
    HashCollision {
        space: KeySpace,
        key: String,
        existing: String,
        incoming: String,
    },
}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HashCollision {
                space,
                key,
                existing,
                incoming,
            } => write!(
                f,
                "hash collision in {} space at {key}: stored `{existing}`, incoming `{incoming}`",
                match space {
                    KeySpace::Value => "value",
                    KeySpace::Context => "context",
                }
            ),
        }
    }
}

impl Error for IndexError {}

/// Both indices of the thought graph.
#[derive(Debug, Clone, Default)]
pub struct ThoughtIndex {
    lexemes: HashMap<ValueHash, Lexeme>,
    parents: HashMap<ContextHash, Parent>,
}

impl ThoughtIndex {
    /// Creates an index holding only the two immortal root records.
    pub fn new(now: i64) -> Self {
        let mut index = Self::default();
        for root in [Context::root(), Context::absolute()] {
            index.parents.insert(root.hash(), Parent::new(root, now));
        }
        index
    }

    pub fn lexeme(&self, key: &ValueHash) -> Option<&Lexeme> {
        self.lexemes.get(key)
    }

    pub fn parent(&self, key: &ContextHash) -> Option<&Parent> {
        self.parents.get(key)
    }

    pub fn lexemes(&self) -> impl Iterator<Item = (&ValueHash, &Lexeme)> {
        self.lexemes.iter()
    }

    pub fn parents(&self) -> impl Iterator<Item = (&ContextHash, &Parent)> {
        self.parents.iter()
    }

    pub fn lexeme_count(&self) -> usize {
        self.lexemes.len()
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// Opens a write transaction stamped with `now` (epoch ms).
    pub(crate) fn transaction(&mut self, now: i64) -> IndexTransaction<'_> {
        IndexTransaction {
            index: self,
            now,
            dirty_lexemes: BTreeSet::new(),
            dirty_parents: BTreeSet::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_parent(&mut self, key: ContextHash, parent: Parent) {
        self.parents.insert(key, parent);
    }
}

/// Write handle over a `ThoughtIndex`.
///
/// Paired writes mark keys dirty; `commit` turns them into an `IndexDelta`.
/// Fetch merges do not mark keys dirty because the records came from storage.
pub(crate) struct IndexTransaction<'a> {
    index: &'a mut ThoughtIndex,
    now: i64,
    dirty_lexemes: BTreeSet<ValueHash>,
    dirty_parents: BTreeSet<ContextHash>,
}

impl IndexTransaction<'_> {
    pub(crate) fn now(&self) -> i64 {
        self.now
    }

    pub(crate) fn parent(&self, key: &ContextHash) -> Option<&Parent> {
        self.index.parents.get(key)
    }

    pub(crate) fn lexeme(&self, key: &ValueHash) -> Option<&Lexeme> {
        self.index.lexemes.get(key)
    }

    /// Adds `child` under `context` and the matching lexeme entry.
    ///
    /// Returns `Ok(false)` without writing when `(value, rank)` already sits
    /// in that context.
    pub(crate) fn insert_occurrence(&mut self, context: &Context, child: Child) -> IndexResult<bool> {
        let context = context.canonical();
        let context_key = context.hash();
        let value_key = child.value_hash();
        self.ensure_no_collision(&context, &context_key, &child.value, &value_key)?;

        let now = self.now;
        let parent = self
            .index
            .parents
            .entry(context_key)
            .or_insert_with(|| Parent::new(context.clone(), now));
        let rank = child.rank;
        let value = child.value.clone();
        if !parent.add_child(child, now) {
            return Ok(false);
        }
        self.dirty_parents.insert(context_key);

        let lexeme = self
            .index
            .lexemes
            .entry(value_key)
            .or_insert_with(|| Lexeme::new(value, now));
        lexeme.add_context(context, rank, now);
        self.dirty_lexemes.insert(value_key);
        Ok(true)
    }

    /// Removes the `(value, rank)` child of `context` and its lexeme entry.
    ///
    /// Empty lexemes and empty non-root parents are deleted. Returns the
    /// removed child, or `None` when it was not present.
    pub(crate) fn remove_occurrence(
        &mut self,
        context: &Context,
        value: &str,
        rank: Rank,
    ) -> Option<Child> {
        let context = context.canonical();
        let context_key = context.hash();
        let now = self.now;

        let parent = self.index.parents.get_mut(&context_key)?;
        let removed = parent.remove_child(value, rank, now)?;
        if parent.children.is_empty() && !parent.context.is_root() {
            self.index.parents.remove(&context_key);
        }
        self.dirty_parents.insert(context_key);

        let value_key = removed.value_hash();
        if let Some(lexeme) = self.index.lexemes.get_mut(&value_key) {
            lexeme.remove_context(&context, rank, now);
            if lexeme.contexts.is_empty() {
                self.index.lexemes.remove(&value_key);
            }
            self.dirty_lexemes.insert(value_key);
        }
        Some(removed)
    }

    /// Rewrites the display text of one child whose normalized value is
    /// unchanged. Keys are unaffected.
    pub(crate) fn set_display_value(
        &mut self,
        context: &Context,
        rank: Rank,
        old_value: &str,
        new_value: &str,
    ) -> bool {
        let context = context.canonical();
        let context_key = context.hash();
        let now = self.now;
        let Some(parent) = self.index.parents.get_mut(&context_key) else {
            return false;
        };
        let old_key = crate::model::hash::hash_thought(old_value);
        let Some(child) = parent
            .children
            .iter_mut()
            .find(|child| child.matches(&old_key, rank))
        else {
            return false;
        };
        child.value = new_value.to_string();
        parent.last_updated = now;
        self.dirty_parents.insert(context_key);

        if let Some(lexeme) = self.index.lexemes.get_mut(&old_key) {
            lexeme.value = new_value.to_string();
            lexeme.last_updated = now;
            self.dirty_lexemes.insert(old_key);
        }
        true
    }

    /// Installs a fetched parent record (or drops a stale placeholder when the
    /// store has none). Root records are always kept, and children already
    /// placed into a non-loaded local record are kept next to the fetched ones.
    pub(crate) fn merge_fetched_parent(&mut self, context: &Context, record: Option<Parent>) {
        let context = context.canonical();
        let key = context.hash();
        match record {
            Some(mut parent) => {
                if parent.context.is_empty() {
                    parent.context = context.clone();
                }
                if let Some(local) = self.index.parents.get(&key) {
                    for child in &local.children {
                        if parent.find(&child.value, child.rank).is_none() {
                            parent.children.push(child.clone());
                        }
                    }
                }
                let child_contexts: Vec<(Context, String)> = parent
                    .children
                    .iter()
                    .map(|child| (parent.context.child(&child.value), child.value.clone()))
                    .collect();
                self.index.parents.insert(key, parent);
                for (child_context, value) in child_contexts {
                    self.index
                        .parents
                        .entry(child_context.hash())
                        .or_insert_with(|| Parent::placeholder(child_context));
                    self.index
                        .lexemes
                        .entry(crate::model::hash::hash_thought(&value))
                        .or_insert_with(|| Lexeme::placeholder(value));
                }
            }
            None => {
                let remove = match self.index.parents.get_mut(&key) {
                    Some(parent) => {
                        parent.load_state = LoadState::Loaded;
                        parent.children.is_empty() && !parent.context.is_root()
                    }
                    None => false,
                };
                if remove {
                    self.index.parents.remove(&key);
                }
            }
        }
    }

    /// Installs a fetched lexeme (or drops a stale placeholder).
    pub(crate) fn merge_fetched_lexeme(&mut self, value: &str, record: Option<Lexeme>) {
        let key = crate::model::hash::hash_thought(value);
        match record {
            Some(lexeme) => {
                self.index.lexemes.insert(key, lexeme);
            }
            None => {
                let remove = match self.index.lexemes.get_mut(&key) {
                    Some(lexeme) => {
                        lexeme.load_state = LoadState::Loaded;
                        lexeme.contexts.is_empty()
                    }
                    None => false,
                };
                if remove {
                    self.index.lexemes.remove(&key);
                }
            }
        }
    }

    /// Moves a non-loaded parent to `Pending { requested_at }`.
    pub(crate) fn mark_parent_requested(&mut self, key: &ContextHash, requested_at: i64) {
        if let Some(parent) = self.index.parents.get_mut(key) {
            if parent.is_pending() {
                parent.load_state = LoadState::Pending { requested_at };
            }
        }
    }

    /// Moves a non-loaded lexeme to `Pending { requested_at }`.
    pub(crate) fn mark_lexeme_requested(&mut self, key: &ValueHash, requested_at: i64) {
        if let Some(lexeme) = self.index.lexemes.get_mut(key) {
            if lexeme.is_pending() {
                lexeme.load_state = LoadState::Pending { requested_at };
            }
        }
    }

    /// Finishes the transaction and returns every touched record.
    pub(crate) fn commit(self) -> IndexDelta {
        let mut delta = IndexDelta::default();
        for key in self.dirty_lexemes {
            delta
                .lexemes
                .insert(key, self.index.lexemes.get(&key).cloned());
        }
        for key in self.dirty_parents {
            delta
                .parents
                .insert(key, self.index.parents.get(&key).cloned());
        }
        delta
    }

    fn ensure_no_collision(
        &self,
        context: &Context,
        context_key: &ContextHash,
        value: &str,
        value_key: &ValueHash,
    ) -> IndexResult<()> {
        if let Some(parent) = self.index.parents.get(context_key) {
            if parent.context.normalized() != context.normalized() {
                return Err(IndexError::HashCollision {
                    space: KeySpace::Context,
                    key: context_key.to_hex(),
                    existing: parent.context.to_string(),
                    incoming: context.to_string(),
                });
            }
        }
        if let Some(lexeme) = self.index.lexemes.get(value_key) {
            if normalize_value(&lexeme.value) != normalize_value(value) {
                return Err(IndexError::HashCollision {
                    space: KeySpace::Value,
                    key: value_key.to_hex(),
                    existing: lexeme.value.clone(),
                    incoming: value.to_string(),
                });
            }
        }
        Ok(())
    }
}
