//! Core domain logic for the outline thought graph.
//!
//! Thoughts are stored twice: a lexeme per normalized value listing where the
//! value occurs, and a parent record per context listing its ranked children.
//! Reducers keep both sides in agreement; the service loads missing records
//! lazily and persists each change.

pub mod config;
pub mod db;
pub mod export;
pub mod import;
pub mod index;
pub mod integrity;
pub mod logging;
pub mod model;
pub mod reducers;
pub mod repo;
pub mod selectors;
pub mod service;
pub mod state;

pub use config::{ConfigError, CoreConfig, ExportConfig};
pub use export::{export_context, ExportError, ExportFormat, ExportOptions};
pub use import::{import_intents, import_text, parse_outline, ImportError, OutlineNode};
pub use index::{IndexDelta, IndexError, ThoughtIndex};
pub use integrity::{assert_integrity, check_data_integrity, IntegrityReport, IntegrityViolation};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::hash::{hash_context, hash_thought, normalize_value, ContextHash, ValueHash};
pub use model::lexeme::{Lexeme, ThoughtContext};
pub use model::load_state::LoadState;
pub use model::parent::{Child, Parent, ThoughtId};
pub use model::path::{Context, Path, PathSegment, SimplePath};
pub use model::rank::Rank;
pub use reducers::{reduce, reduce_all, Intent, ReducerError, ReducerResult, Transition};
pub use repo::memory_store::MemoryThoughtStore;
pub use repo::thought_store::{SqliteThoughtStore, StoreError, StoreResult, ThoughtStore};
pub use selectors::SelectorError;
pub use service::outline_service::{OutlineService, ServiceError, ServiceResult};
pub use state::{FetchRequest, FetchResult, FetchedLexeme, FetchedParent, State};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
