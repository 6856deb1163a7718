//! Consistency checker for the dual index.
//!
//! # Responsibility
//! - Walk the tree from both roots and compare what the parent records
//!   imply with what the lexemes record.
//! - Report the record rewrites that would restore consistency.
//!
//! # Invariants
//! - The checker never writes; a healthy state yields empty update maps.
//! - Entries that depend on non-loaded records are not judged.
//! - Timestamps and ids are not compared.

use crate::model::hash::{ContextHash, ValueHash};
use crate::model::lexeme::{Lexeme, ThoughtContext};
use crate::model::parent::Parent;
use crate::model::path::Context;
use crate::state::State;
use log::error;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Record rewrites that would restore consistency. `None` means delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrityReport {
    pub thought_index_updates: BTreeMap<ValueHash, Option<Lexeme>>,
    pub context_index_updates: BTreeMap<ContextHash, Option<Parent>>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.thought_index_updates.is_empty() && self.context_index_updates.is_empty()
    }
}

/// Raised by `assert_integrity` when the report is not empty.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityViolation {
    pub report: IntegrityReport,
}

impl Display for IntegrityViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "index integrity violated: {} lexeme updates, {} parent updates",
            self.report.thought_index_updates.len(),
            self.report.context_index_updates.len()
        )
    }
}

impl Error for IntegrityViolation {}

/// Fails when `check_data_integrity` reports anything.
pub fn assert_integrity(state: &State) -> Result<(), IntegrityViolation> {
    let report = check_data_integrity(state);
    if report.is_healthy() {
        return Ok(());
    }
    error!(
        "event=integrity_check module=integrity status=violation lexemes={} parents={}",
        report.thought_index_updates.len(),
        report.context_index_updates.len()
    );
    Err(IntegrityViolation { report })
}

/// Occurrences implied by the parent records reachable from the roots.
struct Walk {
    reachable: HashSet<ContextHash>,
    expected: HashMap<ValueHash, (String, Vec<ThoughtContext>)>,
}

fn walk(state: &State) -> Walk {
    let index = state.index();
    let mut reachable = HashSet::new();
    let mut expected: HashMap<ValueHash, (String, Vec<ThoughtContext>)> = HashMap::new();
    let mut queue = VecDeque::from([Context::root(), Context::absolute()]);
    while let Some(context) = queue.pop_front() {
        let key = context.hash();
        if !reachable.insert(key) {
            continue;
        }
        let Some(parent) = index.parent(&key) else {
            continue;
        };
        for child in parent.ranked_children() {
            let entry = expected
                .entry(child.value_hash())
                .or_insert_with(|| (child.value.clone(), Vec::new()));
            entry
                .1
                .push(ThoughtContext::new(parent.context.clone(), child.rank));
            queue.push_back(context.child(&child.value));
        }
    }
    Walk {
        reachable,
        expected,
    }
}

/// Returns whether `context` or any of its ancestors is not loaded.
fn blocked_by_pending(state: &State, context: &Context) -> bool {
    context
        .ancestors()
        .iter()
        .chain(std::iter::once(context))
        .any(|candidate| {
            state
                .index()
                .parent(&candidate.hash())
                .is_some_and(Parent::is_pending)
        })
}

/// Compares both indices and reports the records that need rewriting.
pub fn check_data_integrity(state: &State) -> IntegrityReport {
    let index = state.index();
    let walk = walk(state);
    let mut report = IntegrityReport::default();

    for (key, parent) in index.parents() {
        if parent.is_pending() {
            continue;
        }
        if *key != parent.hash() {
            report.context_index_updates.insert(*key, None);
            continue;
        }
        if parent.context.is_root() {
            continue;
        }
        if !walk.reachable.contains(key) {
            if !blocked_by_pending(state, &parent.context) {
                report.context_index_updates.insert(*key, None);
            }
            continue;
        }
        if parent.children.is_empty() {
            report.context_index_updates.insert(*key, None);
            continue;
        }
        let mut seen = HashSet::new();
        let deduped: Vec<_> = parent
            .children
            .iter()
            .filter(|child| seen.insert((child.value_hash(), child.rank)))
            .cloned()
            .collect();
        if deduped.len() != parent.children.len() {
            let mut repaired = parent.clone();
            repaired.children = deduped;
            report.context_index_updates.insert(*key, Some(repaired));
        }
    }
    for (key, lexeme) in index.lexemes() {
        if *key != lexeme.hash() {
            report.thought_index_updates.insert(*key, None);
            continue;
        }
        let expected = walk
            .expected
            .get(key)
            .map(|(_, contexts)| contexts.as_slice())
            .unwrap_or_default();
        let is_expected = |entry: &ThoughtContext| {
            let entry_key = entry.context.hash();
            expected
                .iter()
                .any(|candidate| candidate.matches(&entry_key, entry.rank))
        };
        let unverifiable = |entry: &ThoughtContext| match index.parent(&entry.context.hash()) {
            Some(parent) => parent.is_pending(),
            None => blocked_by_pending(state, &entry.context),
        };

        let mut contexts: Vec<ThoughtContext> = lexeme
            .contexts
            .iter()
            .filter(|entry| is_expected(entry) || unverifiable(entry))
            .cloned()
            .collect();
        let mut changed = contexts.len() != lexeme.contexts.len();
        if !lexeme.is_pending() {
            for entry in expected {
                if lexeme.find(&entry.context, entry.rank).is_none() {
                    contexts.push(entry.clone());
                    changed = true;
                }
            }
        }
        if contexts.is_empty() && !lexeme.is_pending() {
            report.thought_index_updates.insert(*key, None);
        } else if changed {
            let mut repaired = lexeme.clone();
            repaired.contexts = contexts;
            report.thought_index_updates.insert(*key, Some(repaired));
        }
    }

    for (key, (value, contexts)) in &walk.expected {
        if index.lexeme(key).is_some() {
            continue;
        }
        let mut lexeme = Lexeme::new(value.clone(), 0);
        lexeme.contexts = contexts.clone();
        report.thought_index_updates.insert(*key, Some(lexeme));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::check_data_integrity;
    use crate::model::parent::{Child, Parent};
    use crate::model::path::Context;
    use crate::model::rank::Rank;
    use crate::state::State;
    use uuid::Uuid;

    #[test]
    fn empty_state_is_healthy() {
        assert!(check_data_integrity(&State::new()).is_healthy());
    }

    #[test]
    fn orphaned_parent_is_reported_for_deletion() {
        let mut state = State::new();
        let context = Context::new(["ghost"]);
        let mut parent = Parent::new(context.clone(), 0);
        parent
            .children
            .push(Child::new("x", Rank::ZERO, Uuid::new_v4()));
        state.index.force_parent(context.hash(), parent);

        let report = check_data_integrity(&state);
        assert_eq!(report.context_index_updates.get(&context.hash()), Some(&None));
    }
}
