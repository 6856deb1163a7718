use super::{ReducerResult, Transition};
use crate::index::IndexDelta;
use crate::model::path::{path_starts_with, Path, PathSegment};
use crate::selectors;
use crate::state::State;

/// Moves the cursor to `path`, validated against the index.
pub(super) fn set_cursor(state: &State, path: Option<&Path>) -> ReducerResult<Transition> {
    let cursor = match path {
        Some(path) => Some(selectors::simplify_path(state, path)?),
        None => None,
    };
    let mut next = state.clone();
    next.cursor = cursor;
    Ok(Transition {
        state: next,
        delta: IndexDelta::default(),
    })
}

/// Rewrites a cursor lying at or under `old_prefix` to sit under `new_prefix`.
pub(super) fn rebase_cursor(
    cursor: Option<&Path>,
    old_prefix: &[PathSegment],
    new_prefix: &[PathSegment],
) -> Option<Path> {
    let cursor = cursor?;
    if !path_starts_with(cursor, old_prefix) {
        return Some(cursor.clone());
    }
    let mut rebased = new_prefix.to_vec();
    rebased.extend_from_slice(&cursor[old_prefix.len()..]);
    Some(rebased)
}

#[cfg(test)]
mod tests {
    use super::rebase_cursor;
    use crate::model::path::PathSegment;

    #[test]
    fn rebase_only_touches_paths_under_prefix() {
        let cursor = vec![PathSegment::new("a", 0), PathSegment::new("b", 1)];
        let old = vec![PathSegment::new("a", 0)];
        let new = vec![PathSegment::new("x", 0), PathSegment::new("a", 2)];
        assert_eq!(
            rebase_cursor(Some(&cursor), &old, &new).unwrap(),
            vec![
                PathSegment::new("x", 0),
                PathSegment::new("a", 2),
                PathSegment::new("b", 1)
            ]
        );
        let elsewhere = vec![PathSegment::new("c", 0)];
        assert_eq!(
            rebase_cursor(Some(&elsewhere), &old, &new).unwrap(),
            elsewhere
        );
        assert!(rebase_cursor(None, &old, &new).is_none());
    }
}
