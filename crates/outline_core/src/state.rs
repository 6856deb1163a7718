//! Immutable application state snapshot and lazy-load requests.
//!
//! # Responsibility
//! - Bundle the thought index with the cursor and a version counter.
//! - Describe which records must be fetched before a reduction can run.
//!
//! # Invariants
//! - Reducers never mutate an input `State`; they clone and return a new one.
//! - `version` increases by one per successful reduction.

use crate::index::ThoughtIndex;
use crate::model::hash::{hash_thought, ContextHash, ValueHash};
use crate::model::lexeme::Lexeme;
use crate::model::parent::Parent;
use crate::model::path::{Context, Path};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot consumed and produced by reducers.
#[derive(Debug, Clone)]
pub struct State {
    pub(crate) index: ThoughtIndex,
    pub(crate) cursor: Option<Path>,
    pub(crate) version: u64,
}

impl State {
    /// Empty outline with both roots loaded.
    pub fn new() -> Self {
        Self {
            index: ThoughtIndex::new(now_ms()),
            cursor: None,
            version: 0,
        }
    }

    pub fn index(&self) -> &ThoughtIndex {
        &self.index
    }

    pub fn cursor(&self) -> Option<&Path> {
        self.cursor.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Records a reduction needs before it can run. Deduplicated by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub contexts: Vec<Context>,
    pub values: Vec<String>,
    context_keys: BTreeSet<ContextHash>,
    value_keys: BTreeSet<ValueHash>,
}

impl FetchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_context(&mut self, context: &Context) {
        let context = context.canonical();
        if self.context_keys.insert(context.hash()) {
            self.contexts.push(context);
        }
    }

    pub fn add_value(&mut self, value: &str) {
        if self.value_keys.insert(hash_thought(value)) {
            self.values.push(value.to_string());
        }
    }

    pub fn extend(&mut self, other: FetchRequest) {
        for context in &other.contexts {
            self.add_context(context);
        }
        for value in &other.values {
            self.add_value(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty() && self.values.is_empty()
    }
}

/// One fetched parent record; `None` means the store has no record.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedParent {
    pub context: Context,
    pub record: Option<Parent>,
}

/// One fetched lexeme record; `None` means the store has no record.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedLexeme {
    pub value: String,
    pub record: Option<Lexeme>,
}

/// Records delivered by the persistence collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub parents: Vec<FetchedParent>,
    pub lexemes: Vec<FetchedLexeme>,
}

impl FetchResult {
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.lexemes.is_empty()
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{FetchRequest, State};
    use crate::model::path::Context;

    #[test]
    fn new_state_holds_both_roots() {
        let state = State::new();
        assert_eq!(state.index().parent_count(), 2);
        assert!(state.cursor().is_none());
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn fetch_request_deduplicates_by_key() {
        let mut request = FetchRequest::new();
        request.add_context(&Context::new(["A"]));
        request.add_context(&Context::new(["a"]));
        request.add_value("Note");
        request.add_value("note.");
        assert_eq!(request.contexts.len(), 1);
        assert_eq!(request.values.len(), 1);
    }
}
