//! Outline use-case service.
//!
//! # Responsibility
//! - Own the current `State` and drive reducers against it.
//! - Resolve `NeedsFetch` by loading records from the store and retrying.
//! - Persist each transition's delta before publishing the new state.
//!
//! # Invariants
//! - Only one intent is reduced at a time; callers needing concurrency wrap
//!   the service in their own lock.
//! - A failed fetch or persist leaves the published state unchanged.
//! - Fetch rounds per call are bounded by `max_fetch_rounds`.

use crate::export::{export_context, ExportError, ExportFormat, ExportOptions};
use crate::import::{import_intents, ImportError};
use crate::integrity::{check_data_integrity, IntegrityReport};
use crate::model::hash::hash_thought;
use crate::model::path::Context;
use crate::reducers::{bootstrap, reduce, Intent, ReducerError};
use crate::repo::thought_store::{StoreError, ThoughtStore};
use crate::selectors;
use crate::state::{now_ms, FetchRequest, State};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default bound on fetch rounds per service call.
pub const DEFAULT_MAX_FETCH_ROUNDS: u32 = 64;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from outline service operations.
#[derive(Debug)]
pub enum ServiceError {
    Reducer(ReducerError),
    Store(StoreError),
    Export(ExportError),
    Import(ImportError),
    /// Records kept arriving incomplete after the allowed fetch rounds.
    FetchLimitExceeded { operation: &'static str, rounds: u32 },
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reducer(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Export(err) => write!(f, "{err}"),
            Self::Import(err) => write!(f, "{err}"),
            Self::FetchLimitExceeded { operation, rounds } => {
                write!(f, "{operation} still needs records after {rounds} fetch rounds")
            }
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Reducer(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Export(err) => Some(err),
            Self::Import(err) => Some(err),
            Self::FetchLimitExceeded { .. } => None,
        }
    }
}

impl From<ReducerError> for ServiceError {
    fn from(value: ReducerError) -> Self {
        Self::Reducer(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ImportError> for ServiceError {
    fn from(value: ImportError) -> Self {
        match value {
            ImportError::Reducer(err) => Self::Reducer(err),
            other => Self::Import(other),
        }
    }
}

/// Outline service facade over a thought store.
pub struct OutlineService<S: ThoughtStore> {
    store: S,
    state: State,
    max_fetch_rounds: u32,
}

impl<S: ThoughtStore> OutlineService<S> {
    /// Opens the service, loading both root records from `store`.
    pub fn open(store: S) -> ServiceResult<Self> {
        let roots = store.load_roots()?;
        let state = bootstrap(&roots);
        info!(
            "event=outline_open module=service status=ok parents={} lexemes={}",
            state.index().parent_count(),
            state.index().lexeme_count()
        );
        Ok(Self {
            store,
            state,
            max_fetch_rounds: DEFAULT_MAX_FETCH_ROUNDS,
        })
    }

    pub fn with_max_fetch_rounds(mut self, rounds: u32) -> Self {
        self.max_fetch_rounds = rounds.max(1);
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn version(&self) -> u64 {
        self.state.version()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drops the in-memory state and hands the store back.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Reduces one intent, fetching missing records as needed, and persists
    /// the resulting delta.
    pub fn apply(&mut self, intent: &Intent) -> ServiceResult<&State> {
        self.prefetch_values(&intent.referenced_values())?;
        let mut rounds = 0;
        loop {
            match reduce(&self.state, intent) {
                Ok(transition) => {
                    self.store.apply_delta(&transition.delta)?;
                    self.state = transition.state;
                    return Ok(&self.state);
                }
                Err(ReducerError::NeedsFetch(request)) => {
                    rounds += 1;
                    if rounds > self.max_fetch_rounds {
                        warn!(
                            "event=apply module=service status=fetch_limit intent={} rounds={}",
                            intent.name(),
                            self.max_fetch_rounds
                        );
                        return Err(ServiceError::FetchLimitExceeded {
                            operation: intent.name(),
                            rounds: self.max_fetch_rounds,
                        });
                    }
                    self.fetch(&request)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Applies intents in order; stops at the first failure.
    pub fn apply_all(&mut self, intents: &[Intent]) -> ServiceResult<&State> {
        for intent in intents {
            self.apply(intent)?;
        }
        Ok(&self.state)
    }

    /// Imports indented text under `context`.
    pub fn import_text(&mut self, context: &Context, text: &str) -> ServiceResult<usize> {
        self.pull(context)?;
        let intents = import_intents(&self.state, context, text)?;
        self.apply_all(&intents)?;
        info!(
            "event=import module=service status=ok thoughts={}",
            intents.len()
        );
        Ok(intents.len())
    }

    /// Loads every record below `context`.
    pub fn pull(&mut self, context: &Context) -> ServiceResult<()> {
        let mut rounds = 0;
        loop {
            let request = selectors::pending_in_subtree(&self.state, context);
            if request.is_empty() {
                return Ok(());
            }
            rounds += 1;
            if rounds > self.max_fetch_rounds {
                return Err(ServiceError::FetchLimitExceeded {
                    operation: "pull",
                    rounds: self.max_fetch_rounds,
                });
            }
            self.fetch(&request)?;
        }
    }

    /// Exports `context` after loading its subtree.
    pub fn export(
        &mut self,
        context: &Context,
        format: ExportFormat,
        options: &ExportOptions,
    ) -> ServiceResult<String> {
        self.pull(context)?;
        export_context(&self.state, context, format, options).map_err(ServiceError::Export)
    }

    /// Loads both trees completely and checks index consistency.
    pub fn check_integrity(&mut self) -> ServiceResult<IntegrityReport> {
        self.pull(&Context::root())?;
        self.pull(&Context::absolute())?;
        Ok(check_data_integrity(&self.state))
    }

    fn prefetch_values(&mut self, values: &[String]) -> ServiceResult<()> {
        let mut request = FetchRequest::new();
        for value in values {
            if self.state.index().lexeme(&hash_thought(value)).is_none() {
                request.add_value(value);
            }
        }
        if request.is_empty() {
            return Ok(());
        }
        self.fetch(&request)
    }

    fn fetch(&mut self, request: &FetchRequest) -> ServiceResult<()> {
        let marked = reduce(
            &self.state,
            &Intent::MarkRequested {
                request: request.clone(),
                requested_at: now_ms(),
            },
        )?;
        let result = self.store.fetch(request).map_err(|err| {
            warn!("event=fetch module=service status=error error={err}");
            err
        })?;
        debug!(
            "event=fetch module=service status=ok contexts={} values={}",
            request.contexts.len(),
            request.values.len()
        );
        let merged = reduce(&marked.state, &Intent::MergeFetched(result))?;
        self.state = merged.state;
        Ok(())
    }
}
