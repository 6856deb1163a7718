//! Core use-case services.
//!
//! # Responsibility
//! - Drive reducers against a store-backed state.
//! - Keep the command line and embedding layers free of fetch and persistence
//!   details.

pub mod outline_service;
