use super::pending::LoadCheck;
use super::{ReducerError, ReducerResult, Transition};
use crate::index::IndexDelta;
use crate::model::parent::Child;
use crate::model::path::{is_root_token, Context};
use crate::model::rank::Rank;
use crate::state::{now_ms, State};
use uuid::Uuid;

/// Adds `value` at `rank` under `context`.
///
/// Creating an identical `{value, rank}` child again changes nothing.
/// Root tokens are rejected: a child named after a root would address the
/// root record itself.
pub(super) fn create_thought(
    state: &State,
    context: &Context,
    value: &str,
    rank: Rank,
) -> ReducerResult<Transition> {
    if is_root_token(value) {
        return Err(ReducerError::Precondition(format!(
            "`{value}` is a root token and cannot be a thought value"
        )));
    }
    let context = context.canonical();
    let mut check = LoadCheck::new(state);
    check.context_exists(&context)?;
    let parent = check.parent(&context);
    check.lexeme(value);
    check.ensure_loaded()?;

    if parent.is_some_and(|parent| parent.find(value, rank).is_some()) {
        return Ok(Transition {
            state: state.clone(),
            delta: IndexDelta::default(),
        });
    }

    let mut next = state.clone();
    let mut tx = next.index.transaction(now_ms());
    tx.insert_occurrence(&context, Child::new(value, rank, Uuid::new_v4()))?;
    let delta = tx.commit();
    Ok(Transition { state: next, delta })
}

#[cfg(test)]
mod tests {
    use super::create_thought;
    use crate::model::hash::hash_thought;
    use crate::model::path::{Context, ABSOLUTE_TOKEN, ROOT_TOKEN};
    use crate::model::rank::Rank;
    use crate::reducers::ReducerError;
    use crate::state::State;

    #[test]
    fn create_under_missing_context_is_not_found() {
        let state = State::new();
        let err = create_thought(&state, &Context::new(["nope"]), "a", Rank::ZERO).unwrap_err();
        assert!(matches!(err, ReducerError::NotFound(_)));
    }

    #[test]
    fn root_tokens_are_not_thought_values() {
        let state = State::new();
        for token in [ROOT_TOKEN, ABSOLUTE_TOKEN] {
            let err = create_thought(&state, &Context::root(), token, Rank::ZERO).unwrap_err();
            assert!(matches!(err, ReducerError::Precondition(_)));
        }
        let nested = create_thought(&state, &Context::root(), "a", Rank::ZERO).unwrap();
        let err = create_thought(&nested.state, &Context::new(["a"]), ROOT_TOKEN, Rank::ZERO)
            .unwrap_err();
        assert!(matches!(err, ReducerError::Precondition(_)));
    }

    #[test]
    fn repeated_create_is_a_no_op() {
        let state = State::new();
        let first = create_thought(&state, &Context::root(), "a", Rank::ZERO).unwrap();
        assert_eq!(first.delta.len(), 2);
        let second =
            create_thought(&first.state, &Context::root(), "A", Rank::ZERO).unwrap();
        assert!(second.delta.is_empty());
        let lexeme = second.state.index().lexeme(&hash_thought("a")).unwrap();
        assert_eq!(lexeme.contexts.len(), 1);
    }
}
