//! Relocation of one thought to another context or rank, and archiving.
//!
//! # Invariants
//! - Old and new paths share their head value.
//! - A thought cannot be moved into its own subtree.
//! - Moving within one context only changes the rank; the child context and
//!   therefore the subtree stay where they are.

use super::cursor::rebase_cursor;
use super::pending::LoadCheck;
use super::relocate::{
    check_destination, has_duplicate_sibling, place_child, relocate, snapshot_subtree, Relocation,
};
use super::{create, delete, ReducerError, ReducerResult, Transition};
use crate::index::IndexDelta;
use crate::model::hash::{hash_thought, values_equal};
use crate::model::parent::Child;
use crate::model::path::{
    is_root_token, parent_context, path_to_context, without_home_token, PathSegment,
    ARCHIVE_TOKEN,
};
use crate::selectors;
use crate::state::{now_ms, State};

pub(super) fn move_thought(
    state: &State,
    old_path: &[PathSegment],
    new_path: &[PathSegment],
) -> ReducerResult<Transition> {
    let old_path = without_home_token(old_path);
    let new_path = without_home_token(new_path);
    let (Some(old_segment), Some(new_segment)) = (old_path.last(), new_path.last()) else {
        return Err(ReducerError::Precondition("move path is empty".to_string()));
    };
    let (Some(old_context), Some(new_context)) = (parent_context(old_path), parent_context(new_path))
    else {
        return Err(ReducerError::Precondition(
            "root thoughts cannot be moved".to_string(),
        ));
    };
    let (old_context, new_context) = (old_context.canonical(), new_context.canonical());
    if !values_equal(&old_segment.value, &new_segment.value) || is_root_token(&old_segment.value)
    {
        return Err(ReducerError::Precondition(format!(
            "move must keep the thought value: {} -> {}",
            path_to_context(old_path),
            path_to_context(new_path)
        )));
    }

    let mut check = LoadCheck::new(state);
    check.context_exists(&new_context)?;
    let old_parent = check.parent(&old_context);
    check.parent(&new_context);
    check.lexeme(&old_segment.value);
    check.ensure_loaded()?;
    let old_parent =
        old_parent.ok_or_else(|| ReducerError::NotFound(path_to_context(old_path)))?;
    let current = old_parent
        .find(&old_segment.value, old_segment.rank)
        .cloned()
        .ok_or_else(|| ReducerError::NotFound(path_to_context(old_path)))?;
    let new_rank = new_segment.rank;

    let mut next = state.clone();
    if old_context.hash() == new_context.hash() {
        if current.rank == new_rank {
            return Ok(Transition {
                state: next,
                delta: IndexDelta::default(),
            });
        }
        let mut tx = next.index.transaction(now_ms());
        tx.remove_occurrence(&old_context, &current.value, current.rank);
        let placed = place_child(
            &mut tx,
            &new_context,
            Child::new(current.value.clone(), new_rank, current.id),
            false,
        )?;
        let delta = tx.commit();
        let mut moved = new_path.to_vec();
        if let Some(last) = moved.last_mut() {
            last.rank = placed.rank;
        }
        next.cursor = rebase_cursor(state.cursor.as_ref(), old_path, &moved);
        return Ok(Transition { state: next, delta });
    }

    let old_root = old_context.child(&current.value);
    let new_root = new_context.child(&current.value);
    if new_context.starts_with(&old_root) {
        return Err(ReducerError::Precondition(format!(
            "cannot move {} into its own subtree",
            path_to_context(old_path)
        )));
    }
    let mode = if has_duplicate_sibling(old_parent, &current) {
        Relocation::Copy
    } else {
        Relocation::Move
    };
    let entries = snapshot_subtree(&mut check, &old_root);
    check_destination(&mut check, &entries, &old_root, &new_root);
    check.ensure_loaded()?;

    let mut tx = next.index.transaction(now_ms());
    tx.remove_occurrence(&old_context, &current.value, current.rank);
    place_child(
        &mut tx,
        &new_context,
        Child::new(current.value.clone(), new_rank, current.id),
        false,
    )?;
    relocate(&mut tx, &entries, &old_root, Some(&new_root), mode)?;
    let delta = tx.commit();
    next.cursor = rebase_cursor(state.cursor.as_ref(), old_path, new_path);
    Ok(Transition { state: next, delta })
}

/// Moves the thought at `path` to the top of its context's `=archive`
/// attribute, creating the attribute first when missing. A thought already
/// inside an archive is deleted instead.
pub(super) fn archive_thought(state: &State, path: &[PathSegment]) -> ReducerResult<Transition> {
    let path = without_home_token(path);
    let context = parent_context(path)
        .ok_or_else(|| ReducerError::Precondition("root thoughts cannot be archived".to_string()))?
        .canonical();
    if context
        .head()
        .is_some_and(|head| values_equal(head, ARCHIVE_TOKEN))
    {
        return delete::delete_thought(state, path);
    }
    let Some(segment) = path.last() else {
        return Err(ReducerError::Precondition("archive path is empty".to_string()));
    };

    let mut check = LoadCheck::new(state);
    let parent = check.parent(&context);
    check.lexeme(ARCHIVE_TOKEN);
    check.ensure_loaded()?;
    let parent = parent.ok_or_else(|| ReducerError::NotFound(path_to_context(path)))?;
    let archive_key = hash_thought(ARCHIVE_TOKEN);
    let existing = parent
        .ranked_children()
        .into_iter()
        .find(|child| child.value_hash() == archive_key);

    let (prepared, archive_rank) = match existing {
        Some(child) => (
            Transition {
                state: state.clone(),
                delta: IndexDelta::default(),
            },
            child.rank,
        ),
        None => {
            let rank = selectors::get_prev_rank(state, &context);
            let created = create::create_thought(state, &context, ARCHIVE_TOKEN, rank)?;
            (created, rank)
        }
    };

    let archive_path = path[..path.len() - 1]
        .iter()
        .cloned()
        .chain(std::iter::once(PathSegment::new(ARCHIVE_TOKEN, archive_rank)))
        .collect::<Vec<_>>();
    let archive_context = context.child(ARCHIVE_TOKEN);
    let target_rank = selectors::get_prev_rank(&prepared.state, &archive_context);
    let mut new_path = archive_path;
    new_path.push(PathSegment::new(segment.value.clone(), target_rank));

    let moved = move_thought(&prepared.state, path, &new_path)?;
    Ok(Transition {
        state: moved.state,
        delta: prepared.delta.merge(moved.delta),
    })
}
