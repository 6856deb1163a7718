//! Parent record: the ordered children of one context.
//!
//! # Invariants
//! - No two children share both value hash and rank.
//! - Child listing is deterministic: `rank ASC, id ASC`.
//! - `context` is the record's own key material; `hash(context)` is its key.

use crate::model::hash::{hash_thought, ContextHash, ValueHash};
use crate::model::load_state::LoadState;
use crate::model::path::Context;
use crate::model::rank::Rank;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one placed thought. Survives rename and move.
pub type ThoughtId = Uuid;

/// One direct child of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub value: String,
    pub rank: Rank,
    pub id: ThoughtId,
}

impl Child {
    pub fn new(value: impl Into<String>, rank: Rank, id: ThoughtId) -> Self {
        Self {
            value: value.into(),
            rank,
            id,
        }
    }

    pub fn value_hash(&self) -> ValueHash {
        hash_thought(&self.value)
    }

    /// Returns whether this child is the `(value, rank)` occurrence.
    pub fn matches(&self, value_hash: &ValueHash, rank: Rank) -> bool {
        self.rank == rank && self.value_hash() == *value_hash
    }
}

/// Aggregate of the children directly under one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parent {
    pub context: Context,
    pub children: Vec<Child>,
    /// Epoch ms.
    pub last_updated: i64,
    #[serde(skip)]
    pub load_state: LoadState,
}

impl Parent {
    pub fn new(context: Context, now: i64) -> Self {
        Self {
            context,
            children: Vec::new(),
            last_updated: now,
            load_state: LoadState::Loaded,
        }
    }

    /// Placeholder for a context known to have children that are not fetched.
    pub fn placeholder(context: Context) -> Self {
        Self {
            load_state: LoadState::NotRequested,
            ..Self::new(context, 0)
        }
    }

    pub fn hash(&self) -> ContextHash {
        self.context.hash()
    }

    pub fn is_pending(&self) -> bool {
        self.load_state.is_pending()
    }

    pub fn find(&self, value: &str, rank: Rank) -> Option<&Child> {
        let key = hash_thought(value);
        self.children.iter().find(|child| child.matches(&key, rank))
    }

    /// Children sorted by `(rank, id)`.
    pub fn ranked_children(&self) -> Vec<Child> {
        let mut children = self.children.clone();
        children.sort_by(|left, right| left.rank.cmp(&right.rank).then(left.id.cmp(&right.id)));
        children
    }

    pub fn max_rank(&self) -> Option<Rank> {
        self.children.iter().map(|child| child.rank).max()
    }

    pub fn min_rank(&self) -> Option<Rank> {
        self.children.iter().map(|child| child.rank).min()
    }

    /// Inserts a child; returns `false` when `(value, rank)` already exists.
    pub(crate) fn add_child(&mut self, child: Child, now: i64) -> bool {
        if self.find(&child.value, child.rank).is_some() {
            return false;
        }
        self.children.push(child);
        self.last_updated = now;
        true
    }

    /// Removes the `(value, rank)` child and returns it.
    pub(crate) fn remove_child(&mut self, value: &str, rank: Rank, now: i64) -> Option<Child> {
        let key = hash_thought(value);
        let index = self
            .children
            .iter()
            .position(|child| child.matches(&key, rank))?;
        self.last_updated = now;
        Some(self.children.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::{Child, Parent};
    use crate::model::path::Context;
    use crate::model::rank::Rank;
    use uuid::Uuid;

    #[test]
    fn same_value_at_different_ranks_is_allowed() {
        let mut parent = Parent::new(Context::root(), 0);
        assert!(parent.add_child(Child::new("todo", Rank::from(0), Uuid::new_v4()), 1));
        assert!(parent.add_child(Child::new("todo", Rank::from(1), Uuid::new_v4()), 1));
        assert!(!parent.add_child(Child::new("TODO", Rank::from(1), Uuid::new_v4()), 1));
        assert_eq!(parent.children.len(), 2);
    }

    #[test]
    fn ranked_children_breaks_ties_by_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let mut parent = Parent::new(Context::root(), 0);
        parent.add_child(Child::new("z", Rank::from(5), high), 1);
        parent.add_child(Child::new("y", Rank::from(5), low), 1);
        parent.add_child(Child::new("x", Rank::from(-1), high), 1);
        let values: Vec<_> = parent
            .ranked_children()
            .into_iter()
            .map(|child| child.value)
            .collect();
        assert_eq!(values, vec!["x", "y", "z"]);
        assert_eq!(parent.max_rank(), Some(Rank::from(5)));
    }
}
