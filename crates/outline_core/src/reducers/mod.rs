//! Pure state transitions for outline mutations.
//!
//! # Responsibility
//! - Map an `Intent` and an input `State` to a new `State` plus the changed
//!   index records.
//! - Refuse to write when any record the operation depends on is not loaded.
//!
//! # Invariants
//! - The input state is never modified; failure leaves it untouched.
//! - After a successful transition both indices agree: every lexeme entry
//!   has a matching child and every child has a matching lexeme entry.
//! - `version` increases by exactly one per successful transition.

mod create;
mod cursor;
mod delete;
mod edit;
mod move_thought;
mod pending;
mod relocate;

pub use pending::bootstrap;

use crate::index::{IndexDelta, IndexError};
use crate::model::path::{Context, Path};
use crate::model::rank::Rank;
use crate::selectors::SelectorError;
use crate::state::{FetchRequest, FetchResult, State};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ReducerResult<T> = Result<T, ReducerError>;

/// Requested mutation or state change.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Adds `value` at `rank` under the node addressed by `context`.
    CreateThought {
        context: Context,
        value: String,
        rank: Rank,
    },
    /// Renames the node at `path` (which sits in `context`) from `old_value`
    /// to `new_value`, carrying its subtree along.
    EditThought {
        context: Context,
        old_value: String,
        new_value: String,
        path: Path,
    },
    /// Relocates the node at `old_path` to `new_path` (same head value).
    MoveThought { old_path: Path, new_path: Path },
    /// Removes the node at `path` and its subtree.
    DeleteThought { path: Path },
    /// Moves the node at `path` under its context's `=archive` attribute.
    ArchiveThought { path: Path },
    /// Replaces the first child of `context`, or creates one if none exists.
    SetFirstSubthought { context: Context, value: String },
    /// Moves the cursor.
    SetCursor { path: Option<Path> },
    /// Installs records delivered by the persistence collaborator.
    MergeFetched(FetchResult),
    /// Marks records as requested from the persistence collaborator.
    MarkRequested {
        request: FetchRequest,
        requested_at: i64,
    },
}

impl Intent {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateThought { .. } => "create_thought",
            Self::EditThought { .. } => "edit_thought",
            Self::MoveThought { .. } => "move_thought",
            Self::DeleteThought { .. } => "delete_thought",
            Self::ArchiveThought { .. } => "archive_thought",
            Self::SetFirstSubthought { .. } => "set_first_subthought",
            Self::SetCursor { .. } => "set_cursor",
            Self::MergeFetched(_) => "merge_fetched",
            Self::MarkRequested { .. } => "mark_requested",
        }
    }

    /// Values whose lexemes the intent reads; a store-backed caller loads
    /// absent ones before reducing.
    pub fn referenced_values(&self) -> Vec<String> {
        let head = |path: &Path| path.last().map(|segment| segment.value.clone());
        match self {
            Self::CreateThought { value, .. } | Self::SetFirstSubthought { value, .. } => {
                vec![value.clone()]
            }
            Self::EditThought {
                old_value,
                new_value,
                ..
            } => vec![old_value.clone(), new_value.clone()],
            Self::MoveThought { old_path, .. } => head(old_path).into_iter().collect(),
            Self::DeleteThought { path } => head(path).into_iter().collect(),
            Self::ArchiveThought { path } => head(path)
                .into_iter()
                .chain(std::iter::once(
                    crate::model::path::ARCHIVE_TOKEN.to_string(),
                ))
                .collect(),
            Self::SetCursor { .. } | Self::MergeFetched(_) | Self::MarkRequested { .. } => {
                Vec::new()
            }
        }
    }
}

/// Output of one successful reduction.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: State,
    pub delta: IndexDelta,
}

/// Errors returned by reducers. The input state is unchanged on every error.
#[derive(Debug, Clone, PartialEq)]
pub enum ReducerError {
    /// Referenced context or path does not resolve.
    NotFound(Context),
    /// Intent arguments are inconsistent with the current state.
    Precondition(String),
    /// Two distinct identities share one key.
    HashCollision(IndexError),
    /// Records must be loaded before the intent can run.
    NeedsFetch(FetchRequest),
}

impl Display for ReducerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(context) => write!(f, "context not found: {context}"),
            Self::Precondition(message) => write!(f, "precondition failed: {message}"),
            Self::HashCollision(err) => write!(f, "{err}"),
            Self::NeedsFetch(request) => write!(
                f,
                "records not loaded: {} contexts, {} values",
                request.contexts.len(),
                request.values.len()
            ),
        }
    }
}

impl Error for ReducerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::HashCollision(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IndexError> for ReducerError {
    fn from(value: IndexError) -> Self {
        Self::HashCollision(value)
    }
}

impl From<SelectorError> for ReducerError {
    fn from(value: SelectorError) -> Self {
        match value {
            SelectorError::NotFound(context) => Self::NotFound(context),
            SelectorError::NeedsFetch(request) => Self::NeedsFetch(request),
        }
    }
}

/// Applies one intent to `state`.
pub fn reduce(state: &State, intent: &Intent) -> ReducerResult<Transition> {
    let result = match intent {
        Intent::CreateThought {
            context,
            value,
            rank,
        } => create::create_thought(state, context, value, *rank),
        Intent::EditThought {
            context,
            old_value,
            new_value,
            path,
        } => edit::edit_thought(state, context, old_value, new_value, path),
        Intent::MoveThought { old_path, new_path } => {
            move_thought::move_thought(state, old_path, new_path)
        }
        Intent::DeleteThought { path } => delete::delete_thought(state, path),
        Intent::ArchiveThought { path } => move_thought::archive_thought(state, path),
        Intent::SetFirstSubthought { context, value } => {
            edit::set_first_subthought(state, context, value)
        }
        Intent::SetCursor { path } => cursor::set_cursor(state, path.as_ref()),
        Intent::MergeFetched(result) => Ok(pending::merge_fetched(state, result)),
        Intent::MarkRequested {
            request,
            requested_at,
        } => Ok(pending::mark_requested(state, request, *requested_at)),
    };

    match result {
        Ok(mut transition) => {
            transition.state.version = state.version + 1;
            debug!(
                "event=reduce module=reducers status=ok intent={} changed={} version={}",
                intent.name(),
                transition.delta.len(),
                transition.state.version
            );
            Ok(transition)
        }
        Err(ReducerError::NeedsFetch(request)) => {
            debug!(
                "event=reduce module=reducers status=needs_fetch intent={} contexts={} values={}",
                intent.name(),
                request.contexts.len(),
                request.values.len()
            );
            Err(ReducerError::NeedsFetch(request))
        }
        Err(err) => {
            warn!(
                "event=reduce module=reducers status=error intent={} error={err}",
                intent.name()
            );
            Err(err)
        }
    }
}

/// Applies intents in order; stops at the first error.
///
/// The returned delta folds every step, later records winning.
pub fn reduce_all<'a, I>(state: &State, intents: I) -> ReducerResult<Transition>
where
    I: IntoIterator<Item = &'a Intent>,
{
    let mut current = Transition {
        state: state.clone(),
        delta: IndexDelta::default(),
    };
    for intent in intents {
        let next = reduce(&current.state, intent)?;
        current = Transition {
            state: next.state,
            delta: current.delta.merge(next.delta),
        };
    }
    Ok(current)
}
