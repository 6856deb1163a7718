//! Domain model for the content-addressed thought graph.
//!
//! # Responsibility
//! - Define thought values, contexts, paths, ranks and the two index records.
//! - Keep hashing pure so both indices are addressable in O(1).
//!
//! # Invariants
//! - A `Lexeme` is keyed by `hash_thought(value)`.
//! - A `Parent` is keyed by `hash_context(context)`.
//! - Records carry a `LoadState`; only `Loaded` records are authoritative.

pub mod hash;
pub mod lexeme;
pub mod load_state;
pub mod parent;
pub mod path;
pub mod rank;
