//! Lazy-load state of one index record.
//!
//! # Invariants
//! - Only `Loaded` records are authoritative.
//! - Transitions are driven by the persistence collaborator: a fetch request
//!   moves `NotRequested → Pending`, fetch completion moves to `Loaded`.
//! - Absence of data is never interpreted as `Loaded`.

/// Tri-state replacing ad hoc pending booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Record content is complete.
    #[default]
    Loaded,
    /// A fetch was issued at `requested_at` (epoch ms) and has not completed.
    Pending { requested_at: i64 },
    /// Record is known to have more content remotely; no fetch issued yet.
    NotRequested,
}

impl LoadState {
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded)
    }

    /// Returns whether the record still needs a fetch before use.
    pub fn is_pending(self) -> bool {
        !self.is_loaded()
    }
}
