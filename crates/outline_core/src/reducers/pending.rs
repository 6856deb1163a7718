//! Lazy-load bookkeeping: gating reads and merging fetched records.
//!
//! # Invariants
//! - A reducer that touches a non-loaded record returns `NeedsFetch` with
//!   every blocking key it found, before any write.
//! - Fetched records never overwrite loaded local records.
//! - Children of a fetched parent get placeholder records for their own
//!   context and value so later walks know to fetch them.

use super::{ReducerError, ReducerResult, Transition};
use crate::index::IndexDelta;
use crate::model::hash::hash_thought;
use crate::model::lexeme::Lexeme;
use crate::model::parent::Parent;
use crate::model::path::Context;
use crate::selectors::{self, SelectorError};
use crate::state::{now_ms, FetchRequest, FetchResult, State};
use log::debug;

/// Collects the records a reduction reads and the ones it is blocked on.
pub(super) struct LoadCheck<'a> {
    state: &'a State,
    request: FetchRequest,
}

impl<'a> LoadCheck<'a> {
    pub(super) fn new(state: &'a State) -> Self {
        Self {
            state,
            request: FetchRequest::new(),
        }
    }

    /// Loaded parent of `context`. A non-loaded one is recorded as blocking.
    pub(super) fn parent(&mut self, context: &Context) -> Option<&'a Parent> {
        let parent = selectors::get_parent(self.state, context)?;
        if parent.is_pending() {
            self.request.add_context(context);
            return None;
        }
        Some(parent)
    }

    /// Loaded lexeme of `value`. A non-loaded one is recorded as blocking.
    pub(super) fn lexeme(&mut self, value: &str) -> Option<&'a Lexeme> {
        let lexeme = self.state.index.lexeme(&hash_thought(value))?;
        if lexeme.is_pending() {
            self.request.add_value(value);
            return None;
        }
        Some(lexeme)
    }

    /// Like `lexeme`, but a missing record also blocks: the value is known
    /// to occur, so its lexeme must exist somewhere.
    pub(super) fn required_lexeme(&mut self, value: &str) -> Option<&'a Lexeme> {
        let lexeme = self.lexeme(value);
        if lexeme.is_none() {
            self.request.add_value(value);
        }
        lexeme
    }

    /// Requires the node addressed by `context` to exist.
    pub(super) fn context_exists(&mut self, context: &Context) -> ReducerResult<()> {
        match selectors::context_exists(self.state, context) {
            Ok(()) => Ok(()),
            Err(SelectorError::NeedsFetch(request)) => {
                self.request.extend(request);
                Ok(())
            }
            Err(SelectorError::NotFound(context)) => Err(ReducerError::NotFound(context)),
        }
    }

    /// Fails with `NeedsFetch` when anything read so far was not loaded.
    pub(super) fn ensure_loaded(&self) -> ReducerResult<()> {
        if self.request.is_empty() {
            Ok(())
        } else {
            Err(ReducerError::NeedsFetch(self.request.clone()))
        }
    }
}

/// Installs fetched records into a copy of `state`.
pub(super) fn merge_fetched(state: &State, result: &FetchResult) -> Transition {
    let mut next = state.clone();
    let mut tx = next.index.transaction(now_ms());
    let mut merged = 0usize;
    for fetched in &result.parents {
        let key = fetched.context.canonical().hash();
        if tx
            .parent(&key)
            .is_some_and(|parent| parent.load_state.is_loaded())
        {
            continue;
        }
        tx.merge_fetched_parent(&fetched.context, fetched.record.clone());
        merged += 1;
    }
    for fetched in &result.lexemes {
        let key = hash_thought(&fetched.value);
        if tx
            .lexeme(&key)
            .is_some_and(|lexeme| lexeme.load_state.is_loaded())
        {
            continue;
        }
        tx.merge_fetched_lexeme(&fetched.value, fetched.record.clone());
        merged += 1;
    }
    tx.commit();
    debug!("event=merge_fetched module=reducers status=ok merged={merged}");
    Transition {
        state: next,
        delta: IndexDelta::default(),
    }
}

/// Marks every non-loaded record named by `request` as pending.
pub(super) fn mark_requested(state: &State, request: &FetchRequest, requested_at: i64) -> Transition {
    let mut next = state.clone();
    let mut tx = next.index.transaction(requested_at);
    for context in &request.contexts {
        tx.mark_parent_requested(&context.canonical().hash(), requested_at);
    }
    for value in &request.values {
        tx.mark_lexeme_requested(&hash_thought(value), requested_at);
    }
    tx.commit();
    Transition {
        state: next,
        delta: IndexDelta::default(),
    }
}

/// Builds the initial state from stored root records.
///
/// Unlike `merge_fetched`, the stored roots replace the empty local ones.
pub fn bootstrap(roots: &FetchResult) -> State {
    let mut state = State::new();
    let mut tx = state.index.transaction(now_ms());
    for fetched in &roots.parents {
        if fetched.record.is_some() {
            tx.merge_fetched_parent(&fetched.context, fetched.record.clone());
        }
    }
    for fetched in &roots.lexemes {
        tx.merge_fetched_lexeme(&fetched.value, fetched.record.clone());
    }
    tx.commit();
    state
}
