//! Sparse sibling ordering keys.
//!
//! # Invariants
//! - Ranks are totally ordered (`f64::total_cmp`), `-0.0 == 0.0`.
//! - Inserting between two siblings never renumbers other siblings.
//! - Equal ranks are legal; callers break ties by thought id.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Sort key of one child within its parent context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Rank(f64);

impl Rank {
    pub const ZERO: Rank = Rank(0.0);

    /// Creates a rank; non-finite input collapses to zero.
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            // Why: adding 0.0 folds -0.0 into +0.0 so Eq/Hash agree.
            Self(value + 0.0)
        } else {
            Self::ZERO
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Rank placed before `self` at the start of a sibling list.
    pub fn before(self) -> Self {
        Self::new(self.0 - 1.0)
    }

    /// Rank placed after `self` at the end of a sibling list.
    pub fn after(self) -> Self {
        Self::new(self.0 + 1.0)
    }

    /// Midpoint between two neighbours.
    ///
    /// When the neighbours are too close for `f64` to separate, the lower
    /// neighbour is returned and ordering falls back to the id tie-break.
    pub fn between(lower: Rank, upper: Rank) -> Self {
        let (low, high) = if lower <= upper {
            (lower.0, upper.0)
        } else {
            (upper.0, lower.0)
        };
        Self::new(low + (high - low) / 2.0)
    }
}

impl Default for Rank {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i32> for Rank {
    fn from(value: i32) -> Self {
        Self::new(f64::from(value))
    }
}

impl From<f64> for Rank {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Rank> for f64 {
    fn from(value: Rank) -> Self {
        value.0
    }
}

impl PartialEq for Rank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rank {}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Rank {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl Display for Rank {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Rank;

    #[test]
    fn between_interpolates_without_touching_neighbours() {
        let mid = Rank::between(Rank::from(0), Rank::from(1));
        assert_eq!(mid, Rank::from(0.5));
        assert!(Rank::from(0) < mid && mid < Rank::from(1));
        assert_eq!(Rank::between(Rank::from(4), Rank::from(2)), Rank::from(3));
    }

    #[test]
    fn ends_extend_by_one() {
        assert_eq!(Rank::from(0).before(), Rank::from(-1));
        assert_eq!(Rank::from(2.5).after(), Rank::from(3.5));
    }

    #[test]
    fn negative_zero_equals_zero() {
        assert_eq!(Rank::new(-0.0), Rank::ZERO);
        assert_eq!(Rank::new(f64::NAN), Rank::ZERO);
    }

    #[test]
    fn repeated_bisection_never_panics() {
        let low = Rank::from(0);
        let mut high = Rank::from(1);
        for _ in 0..2000 {
            high = Rank::between(low, high);
        }
        assert!(high >= low);
    }
}
