//! Persistence collaborators for the thought index.
//!
//! # Responsibility
//! - Define the load and persist contract the service depends on.
//! - Isolate SQLite details from reducers and selectors.
//!
//! # Invariants
//! - Stores return semantic absence (`record: None`) separately from
//!   transport errors.

pub mod memory_store;
pub mod thought_store;
