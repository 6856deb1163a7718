//! Lexeme record: every occurrence of one value.
//!
//! # Responsibility
//! - Hold the `{context, rank}` occurrences of one normalized value.
//!
//! # Invariants
//! - At most one entry per `(hash(context), rank)` pair.
//! - A live, loaded lexeme has at least one entry.

use crate::model::hash::{hash_thought, ContextHash, ValueHash};
use crate::model::load_state::LoadState;
use crate::model::path::Context;
use crate::model::rank::Rank;
use serde::{Deserialize, Serialize};

/// One occurrence of a value: the context it sits in and its rank there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThoughtContext {
    pub context: Context,
    pub rank: Rank,
}

impl ThoughtContext {
    pub fn new(context: Context, rank: Rank) -> Self {
        Self { context, rank }
    }

    /// Returns whether this entry denotes the occurrence at `(context, rank)`.
    pub fn matches(&self, context_hash: &ContextHash, rank: Rank) -> bool {
        self.rank == rank && self.context.hash() == *context_hash
    }
}

/// Aggregate of every occurrence of one value in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexeme {
    /// Display text of the first occurrence.
    pub value: String,
    pub contexts: Vec<ThoughtContext>,
    /// Epoch ms.
    pub created: i64,
    /// Epoch ms.
    pub last_updated: i64,
    #[serde(skip)]
    pub load_state: LoadState,
}

impl Lexeme {
    pub fn new(value: impl Into<String>, now: i64) -> Self {
        Self {
            value: value.into(),
            contexts: Vec::new(),
            created: now,
            last_updated: now,
            load_state: LoadState::Loaded,
        }
    }

    /// Placeholder for a value referenced by a loaded parent but not fetched.
    pub fn placeholder(value: impl Into<String>) -> Self {
        Self {
            load_state: LoadState::NotRequested,
            ..Self::new(value, 0)
        }
    }

    pub fn hash(&self) -> ValueHash {
        hash_thought(&self.value)
    }

    pub fn is_pending(&self) -> bool {
        self.load_state.is_pending()
    }

    /// Returns the entry for `(context, rank)` if present.
    pub fn find(&self, context: &Context, rank: Rank) -> Option<&ThoughtContext> {
        let key = context.hash();
        self.contexts.iter().find(|entry| entry.matches(&key, rank))
    }

    /// Adds an entry; returns `false` when it already exists.
    pub(crate) fn add_context(&mut self, context: Context, rank: Rank, now: i64) -> bool {
        if self.find(&context, rank).is_some() {
            return false;
        }
        self.contexts.push(ThoughtContext::new(context, rank));
        self.last_updated = now;
        true
    }

    /// Removes an entry; returns `false` when it was absent.
    pub(crate) fn remove_context(&mut self, context: &Context, rank: Rank, now: i64) -> bool {
        let key = context.hash();
        let before = self.contexts.len();
        self.contexts.retain(|entry| !entry.matches(&key, rank));
        let removed = self.contexts.len() != before;
        if removed {
            self.last_updated = now;
        }
        removed
    }
}
