//! Minimal set of changed index records produced by one reduction.

use crate::model::hash::{ContextHash, ValueHash};
use crate::model::lexeme::Lexeme;
use crate::model::parent::Parent;
use std::collections::BTreeMap;

/// Changed records keyed by hash. `None` means the record was deleted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexDelta {
    pub lexemes: BTreeMap<ValueHash, Option<Lexeme>>,
    pub parents: BTreeMap<ContextHash, Option<Parent>>,
}

impl IndexDelta {
    pub fn is_empty(&self) -> bool {
        self.lexemes.is_empty() && self.parents.is_empty()
    }

    /// Total number of changed records.
    pub fn len(&self) -> usize {
        self.lexemes.len() + self.parents.len()
    }

    /// Folds a later delta into this one; later entries win.
    pub fn merge(mut self, later: IndexDelta) -> IndexDelta {
        self.lexemes.extend(later.lexemes);
        self.parents.extend(later.parents);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::IndexDelta;
    use crate::model::hash::hash_thought;
    use crate::model::lexeme::Lexeme;

    #[test]
    fn merge_keeps_latest_record() {
        let key = hash_thought("a");
        let mut first = IndexDelta::default();
        first.lexemes.insert(key, Some(Lexeme::new("a", 1)));
        let mut second = IndexDelta::default();
        second.lexemes.insert(key, None);

        let merged = first.merge(second);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.lexemes.get(&key), Some(&None));
    }
}
