//! Thought rename: the edited child and its whole subtree move from
//! `context + old_value` to `context + new_value`.
//!
//! # Invariants
//! - The edited child keeps its rank and id.
//! - When a sibling with the old value remains in the same context, the old
//!   subtree is kept for it and copied under the new value.
//! - A rename that only changes case or outer punctuation keeps every key and
//!   rewrites display text only.

use super::cursor::rebase_cursor;
use super::pending::LoadCheck;
use super::relocate::{
    check_destination, has_duplicate_sibling, place_child, relocate, snapshot_subtree, Relocation,
};
use super::{create, ReducerError, ReducerResult, Transition};
use crate::index::IndexDelta;
use crate::model::hash::values_equal;
use crate::model::parent::Child;
use crate::model::path::{
    is_root_token, parent_context, path_to_context, without_home_token, Context, PathSegment,
};
use crate::selectors;
use crate::state::{now_ms, State};

pub(super) fn edit_thought(
    state: &State,
    context: &Context,
    old_value: &str,
    new_value: &str,
    path: &[PathSegment],
) -> ReducerResult<Transition> {
    let context = context.canonical();
    let path = without_home_token(path);
    let segment = path
        .last()
        .ok_or_else(|| ReducerError::Precondition("edit path is empty".to_string()))?;
    let path_context = parent_context(path)
        .ok_or_else(|| ReducerError::Precondition("root thoughts cannot be edited".to_string()))?
        .canonical();
    if path_context.normalized() != context.normalized() || !values_equal(&segment.value, old_value)
    {
        return Err(ReducerError::Precondition(format!(
            "path {} does not address `{old_value}` in {context}",
            path_to_context(path)
        )));
    }
    if is_root_token(old_value) || is_root_token(new_value) {
        return Err(ReducerError::Precondition(
            "root tokens cannot be used as thought values".to_string(),
        ));
    }
    let rank = segment.rank;

    let mut check = LoadCheck::new(state);
    let parent = check.parent(&context);
    check.lexeme(old_value);
    check.lexeme(new_value);
    check.ensure_loaded()?;
    let parent = parent.ok_or_else(|| ReducerError::NotFound(path_to_context(path)))?;
    let current = parent
        .find(old_value, rank)
        .cloned()
        .ok_or_else(|| ReducerError::NotFound(path_to_context(path)))?;

    if current.value == new_value {
        return Ok(Transition {
            state: state.clone(),
            delta: IndexDelta::default(),
        });
    }

    let mut new_path = path.to_vec();
    if let Some(last) = new_path.last_mut() {
        last.value = new_value.to_string();
    }

    let mut next = state.clone();
    if values_equal(&current.value, new_value) {
        let mut tx = next.index.transaction(now_ms());
        tx.set_display_value(&context, rank, &current.value, new_value);
        let delta = tx.commit();
        next.cursor = rebase_cursor(state.cursor.as_ref(), path, &new_path);
        return Ok(Transition { state: next, delta });
    }

    let old_root = context.child(&current.value);
    let new_root = context.child(new_value);
    let mode = if has_duplicate_sibling(parent, &current) {
        Relocation::Copy
    } else {
        Relocation::Move
    };
    let entries = snapshot_subtree(&mut check, &old_root);
    check_destination(&mut check, &entries, &old_root, &new_root);
    check.ensure_loaded()?;

    let mut tx = next.index.transaction(now_ms());
    tx.remove_occurrence(&context, &current.value, rank);
    place_child(
        &mut tx,
        &context,
        Child::new(new_value, rank, current.id),
        false,
    )?;
    relocate(&mut tx, &entries, &old_root, Some(&new_root), mode)?;
    let delta = tx.commit();
    next.cursor = rebase_cursor(state.cursor.as_ref(), path, &new_path);
    Ok(Transition { state: next, delta })
}

/// Renames the first child of `context`, or creates it when there is none.
pub(super) fn set_first_subthought(
    state: &State,
    context: &Context,
    value: &str,
) -> ReducerResult<Transition> {
    let context = context.canonical();
    if selectors::is_pending(state, &context) {
        let mut check = LoadCheck::new(state);
        check.parent(&context);
        check.ensure_loaded()?;
    }
    match selectors::get_all_children(state, &context).into_iter().next() {
        Some(first) => {
            let parent_path = selectors::rank_thoughts_first_match(state, &context)?;
            let path = selectors::child_path(
                &parent_path,
                PathSegment::new(first.value.clone(), first.rank),
            );
            edit_thought(state, &context, &first.value, value, &path)
        }
        None => create::create_thought(
            state,
            &context,
            value,
            selectors::get_prev_rank(state, &context),
        ),
    }
}
