use super::pending::LoadCheck;
use super::relocate::{has_duplicate_sibling, relocate, snapshot_subtree, Relocation};
use super::{ReducerError, ReducerResult, Transition};
use crate::model::path::{
    parent_context, path_starts_with, path_to_context, without_home_token, PathSegment,
};
use crate::state::{now_ms, State};

/// Removes the thought at `path` together with its subtree.
///
/// The subtree survives when a sibling with the same value still uses it.
/// A cursor at or below the deleted thought moves to its parent, or is
/// cleared for top-level thoughts.
pub(super) fn delete_thought(state: &State, path: &[PathSegment]) -> ReducerResult<Transition> {
    let path = without_home_token(path);
    let segment = path
        .last()
        .ok_or_else(|| ReducerError::Precondition("delete path is empty".to_string()))?;
    let context = parent_context(path)
        .ok_or_else(|| ReducerError::Precondition("root thoughts cannot be deleted".to_string()))?
        .canonical();

    let mut check = LoadCheck::new(state);
    let parent = check.parent(&context);
    check.lexeme(&segment.value);
    check.ensure_loaded()?;
    let parent = parent.ok_or_else(|| ReducerError::NotFound(path_to_context(path)))?;
    let current = parent
        .find(&segment.value, segment.rank)
        .cloned()
        .ok_or_else(|| ReducerError::NotFound(path_to_context(path)))?;

    let old_root = context.child(&current.value);
    let entries = if has_duplicate_sibling(parent, &current) {
        Vec::new()
    } else {
        snapshot_subtree(&mut check, &old_root)
    };
    check.ensure_loaded()?;

    let mut next = state.clone();
    let mut tx = next.index.transaction(now_ms());
    tx.remove_occurrence(&context, &current.value, current.rank);
    relocate(&mut tx, &entries, &old_root, None, Relocation::Remove)?;
    let delta = tx.commit();

    if state
        .cursor
        .as_ref()
        .is_some_and(|cursor| path_starts_with(cursor, path))
    {
        next.cursor = (path.len() > 1).then(|| path[..path.len() - 1].to_vec());
    }
    Ok(Transition { state: next, delta })
}
