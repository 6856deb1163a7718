//! Subtree relocation shared by edit, move, archive and delete.
//!
//! # Invariants
//! - The whole old subtree is read before anything is written, so prefix
//!   overlap between the old and new subtree cannot corrupt the walk.
//! - Every destination context is loaded before anything is written.
//! - Writes happen as: remove every old occurrence, then insert every new
//!   occurrence.
//! - An incoming child identical in `{value, rank}` to an existing one is
//!   merged; one that only shares the rank is renumbered after the last
//!   sibling.

use super::pending::LoadCheck;
use crate::index::{IndexResult, IndexTransaction};
use crate::model::parent::{Child, Parent};
use crate::model::path::Context;
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// Children of one context inside the relocated subtree.
pub(super) struct SubtreeEntry {
    pub(super) context: Context,
    pub(super) children: Vec<Child>,
}

/// How the old subtree is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Relocation {
    /// Remove the old occurrences and recreate them under the new root.
    Move,
    /// Keep the old occurrences and add copies with fresh ids.
    Copy,
    /// Remove the old occurrences only.
    Remove,
}

/// Walks the subtree below `root` breadth first.
///
/// Non-loaded parents and non-loaded or missing child lexemes met on the way
/// are recorded in `check`.
pub(super) fn snapshot_subtree(check: &mut LoadCheck<'_>, root: &Context) -> Vec<SubtreeEntry> {
    let mut entries = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([root.canonical()]);
    while let Some(context) = queue.pop_front() {
        if !visited.insert(context.hash()) {
            continue;
        }
        let Some(parent) = check.parent(&context) else {
            continue;
        };
        let children = parent.ranked_children();
        for child in &children {
            check.required_lexeme(&child.value);
            queue.push_back(context.child(&child.value));
        }
        entries.push(SubtreeEntry { context, children });
    }
    entries
}

/// Records every context a relocation writes into below `new_root`.
///
/// The destination may already hold children that are only stored remotely;
/// writing into such a record would replace them.
pub(super) fn check_destination(
    check: &mut LoadCheck<'_>,
    entries: &[SubtreeEntry],
    old_root: &Context,
    new_root: &Context,
) {
    check.parent(new_root);
    for entry in entries {
        check.parent(&entry.context.rebase(old_root, new_root));
    }
}

/// Applies `mode` to a snapshot taken below `old_root`.
pub(super) fn relocate(
    tx: &mut IndexTransaction<'_>,
    entries: &[SubtreeEntry],
    old_root: &Context,
    new_root: Option<&Context>,
    mode: Relocation,
) -> IndexResult<()> {
    if matches!(mode, Relocation::Move | Relocation::Remove) {
        for entry in entries {
            for child in &entry.children {
                tx.remove_occurrence(&entry.context, &child.value, child.rank);
            }
        }
    }
    let Some(new_root) = new_root else {
        return Ok(());
    };
    if mode == Relocation::Remove {
        return Ok(());
    }
    for entry in entries {
        let context = entry.context.rebase(old_root, new_root);
        for child in &entry.children {
            let id = match mode {
                Relocation::Copy => Uuid::new_v4(),
                _ => child.id,
            };
            place_child(
                tx,
                &context,
                Child::new(child.value.clone(), child.rank, id),
                true,
            )?;
        }
    }
    Ok(())
}

/// Inserts `child` under `context` following the merge rules.
///
/// With `renumber` unset, a rank shared with a different value is kept as is.
/// Returns the rank the child ended up at.
pub(super) fn place_child(
    tx: &mut IndexTransaction<'_>,
    context: &Context,
    mut child: Child,
    renumber: bool,
) -> IndexResult<Child> {
    if let Some(parent) = tx.parent(&context.canonical().hash()) {
        if parent.find(&child.value, child.rank).is_some() {
            return Ok(child);
        }
        if renumber && parent.children.iter().any(|other| other.rank == child.rank) {
            if let Some(max) = parent.max_rank() {
                child.rank = max.after();
            }
        }
    }
    tx.insert_occurrence(context, child.clone())?;
    Ok(child)
}

/// Returns whether `parent` holds another child with the same value as
/// `(value, rank)`.
pub(super) fn has_duplicate_sibling(parent: &Parent, child: &Child) -> bool {
    let key = child.value_hash();
    parent
        .children
        .iter()
        .any(|other| other.rank != child.rank && other.value_hash() == key)
}
