//! Read-only queries over a `State`.
//!
//! # Responsibility
//! - Resolve contexts and paths to index records.
//! - Compute ranks for insertion relative to existing siblings.
//!
//! # Invariants
//! - Selectors never write.
//! - A walk that reaches a non-loaded record reports `NeedsFetch` rather than
//!   treating the missing data as empty.

use crate::model::hash::{hash_thought, values_equal};
use crate::model::lexeme::{Lexeme, ThoughtContext};
use crate::model::parent::{Child, Parent};
use crate::model::path::{
    is_meta_value, is_root_path, parent_context, path_to_context, root_path, Context, PathSegment,
    SimplePath, ABSOLUTE_TOKEN, ROOT_TOKEN,
};
use crate::model::rank::Rank;
use crate::state::{FetchRequest, State};
use std::collections::{HashSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SelectorResult<T> = Result<T, SelectorError>;

/// Errors for context and path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// No node exists along the given context.
    NotFound(Context),
    /// A non-loaded record blocks resolution.
    NeedsFetch(FetchRequest),
}

impl Display for SelectorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(context) => write!(f, "context not found: {context}"),
            Self::NeedsFetch(request) => write!(
                f,
                "records not loaded: {} contexts, {} values",
                request.contexts.len(),
                request.values.len()
            ),
        }
    }
}

impl Error for SelectorError {}

fn needs_context(context: &Context) -> SelectorError {
    let mut request = FetchRequest::new();
    request.add_context(context);
    SelectorError::NeedsFetch(request)
}

/// Parent record of `context`, whatever its load state.
pub fn get_parent<'a>(state: &'a State, context: &Context) -> Option<&'a Parent> {
    state.index.parent(&context.canonical().hash())
}

/// Lexeme of `value`, whatever its load state.
pub fn get_thought<'a>(state: &'a State, value: &str) -> Option<&'a Lexeme> {
    state.index.lexeme(&hash_thought(value))
}

/// Every known occurrence of `value`.
pub fn get_contexts(state: &State, value: &str) -> Vec<ThoughtContext> {
    get_thought(state, value)
        .map(|lexeme| lexeme.contexts.clone())
        .unwrap_or_default()
}

/// All children of `context` ordered by `(rank, id)`.
pub fn get_all_children(state: &State, context: &Context) -> Vec<Child> {
    get_parent(state, context)
        .map(Parent::ranked_children)
        .unwrap_or_default()
}

/// Visible children of `context` ordered by `(rank, id)`; meta attributes
/// such as `=archive` are left out.
pub fn get_children_ranked(state: &State, context: &Context) -> Vec<Child> {
    get_all_children(state, context)
        .into_iter()
        .filter(|child| !is_meta_value(&child.value))
        .collect()
}

/// Returns whether the parent record of `context` still awaits a fetch.
pub fn is_pending(state: &State, context: &Context) -> bool {
    get_parent(state, context).is_some_and(Parent::is_pending)
}

/// Returns whether `(value, rank)` is a child of `context`.
pub fn thought_exists_at(state: &State, context: &Context, value: &str, rank: Rank) -> bool {
    get_parent(state, context).is_some_and(|parent| parent.find(value, rank).is_some())
}

/// Rank that sorts before every current child of `context`.
pub fn get_prev_rank(state: &State, context: &Context) -> Rank {
    get_parent(state, context)
        .and_then(Parent::min_rank)
        .map(Rank::before)
        .unwrap_or(Rank::ZERO)
}

/// Rank that sorts after every current child of `context`.
pub fn get_next_rank(state: &State, context: &Context) -> Rank {
    get_parent(state, context)
        .and_then(Parent::max_rank)
        .map(Rank::after)
        .unwrap_or(Rank::ZERO)
}

/// Rank strictly between the node at `path` and its previous sibling.
pub fn get_rank_before(state: &State, path: &[PathSegment]) -> SelectorResult<Rank> {
    let (siblings, position) = sibling_position(state, path)?;
    let rank = siblings[position].rank;
    Ok(match position.checked_sub(1) {
        Some(prev) if siblings[prev].rank < rank => Rank::between(siblings[prev].rank, rank),
        _ => rank.before(),
    })
}

/// Rank strictly between the node at `path` and its next sibling.
pub fn get_rank_after(state: &State, path: &[PathSegment]) -> SelectorResult<Rank> {
    let (siblings, position) = sibling_position(state, path)?;
    let rank = siblings[position].rank;
    Ok(match siblings.get(position + 1) {
        Some(next) if next.rank > rank => Rank::between(rank, next.rank),
        _ => rank.after(),
    })
}

fn sibling_position(state: &State, path: &[PathSegment]) -> SelectorResult<(Vec<Child>, usize)> {
    let context = parent_context(path).ok_or_else(|| SelectorError::NotFound(path_to_context(path)))?;
    let parent = get_parent(state, &context)
        .ok_or_else(|| SelectorError::NotFound(path_to_context(path)))?;
    if parent.is_pending() {
        return Err(needs_context(&context));
    }
    let Some(segment) = path.last() else {
        return Err(SelectorError::NotFound(context));
    };
    let key = hash_thought(&segment.value);
    let siblings = parent.ranked_children();
    let position = siblings
        .iter()
        .position(|child| child.matches(&key, segment.rank))
        .ok_or_else(|| SelectorError::NotFound(path_to_context(path)))?;
    Ok((siblings, position))
}

/// Resolves `context` to a path by picking, at every level, the first child
/// (by rank) whose value matches.
pub fn rank_thoughts_first_match(state: &State, context: &Context) -> SelectorResult<SimplePath> {
    let context = context.canonical();
    if context.is_root() {
        return Ok(vec![PathSegment::new(
            context.head().unwrap_or(ROOT_TOKEN),
            Rank::ZERO,
        )]);
    }
    let values = context.values();
    let (mut path, mut current, rest) = if values[0] == ABSOLUTE_TOKEN {
        (
            vec![PathSegment::new(ABSOLUTE_TOKEN, Rank::ZERO)],
            Context::absolute(),
            &values[1..],
        )
    } else {
        (Vec::new(), Context::root(), values)
    };

    for value in rest {
        let parent = state
            .index
            .parent(&current.hash())
            .ok_or_else(|| SelectorError::NotFound(context.clone()))?;
        if parent.is_pending() {
            return Err(needs_context(&current));
        }
        let child = parent
            .ranked_children()
            .into_iter()
            .find(|child| values_equal(&child.value, value))
            .ok_or_else(|| SelectorError::NotFound(context.clone()))?;
        current = current.child(&child.value);
        path.push(PathSegment::new(child.value, child.rank));
    }
    Ok(path)
}

/// Checks that the node addressed by `context` exists.
pub fn context_exists(state: &State, context: &Context) -> SelectorResult<()> {
    rank_thoughts_first_match(state, context).map(|_| ())
}

/// Validates a path against the index and strips a leading home root token.
///
/// Every `(value, rank)` step must be a child of the previous context.
pub fn simplify_path(state: &State, path: &[PathSegment]) -> SelectorResult<SimplePath> {
    if path.is_empty() {
        return Ok(root_path());
    }
    if is_root_path(path) {
        return Ok(path.to_vec());
    }
    let path = if path[0].value == ROOT_TOKEN {
        &path[1..]
    } else {
        path
    };
    let (start, mut current) = if path[0].value == ABSOLUTE_TOKEN {
        (1, Context::absolute())
    } else {
        (0, Context::root())
    };

    for (position, segment) in path.iter().enumerate().skip(start) {
        let missing = || SelectorError::NotFound(path_to_context(&path[..=position]));
        let parent = state.index.parent(&current.hash()).ok_or_else(missing)?;
        if parent.is_pending() {
            return Err(needs_context(&current));
        }
        parent.find(&segment.value, segment.rank).ok_or_else(missing)?;
        current = current.child(&segment.value);
    }
    Ok(path.to_vec())
}

/// Every non-loaded parent and lexeme reachable below `context`.
///
/// The walk does not descend through non-loaded parents, so a deep unloaded
/// subtree surfaces one level per call.
pub fn pending_in_subtree(state: &State, context: &Context) -> FetchRequest {
    let mut request = FetchRequest::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([context.canonical()]);
    while let Some(context) = queue.pop_front() {
        if !visited.insert(context.hash()) {
            continue;
        }
        let Some(parent) = get_parent(state, &context) else {
            continue;
        };
        if parent.is_pending() {
            request.add_context(&context);
            continue;
        }
        for child in &parent.children {
            if get_thought(state, &child.value).is_some_and(Lexeme::is_pending) {
                request.add_value(&child.value);
            }
            queue.push_back(context.child(&child.value));
        }
    }
    request
}

/// Path of a child placed under the node at `parent_path`.
pub fn child_path(parent_path: &[PathSegment], segment: PathSegment) -> SimplePath {
    if parent_path.len() == 1 && parent_path[0].value == ROOT_TOKEN {
        return vec![segment];
    }
    let mut path = parent_path.to_vec();
    path.push(segment);
    path
}
