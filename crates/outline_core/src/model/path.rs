//! Contexts, paths and root tokens.
//!
//! # Responsibility
//! - Define the ambiguous (`Context`) and rank-qualified (`Path`) ways of
//!   locating a thought.
//! - Own the rules for deriving child contexts from a parent context.
//!
//! # Invariants
//! - Top-level thoughts live in `[ROOT]`; their child context is `[value]`,
//!   the home root token never prefixes deeper contexts.
//! - The absolute namespace keeps its token: children of `[ABSOLUTE]` have
//!   child contexts `[ABSOLUTE, value]`.

use crate::model::hash::{hash_context, normalize_value, ContextHash};
use crate::model::rank::Rank;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Home root token. Its parent record is the join point for top-level thoughts.
pub const ROOT_TOKEN: &str = "__ROOT__";
/// Absolute root token for the separate addressing namespace.
pub const ABSOLUTE_TOKEN: &str = "__ABSOLUTE__";
/// Meta attribute that collects archived thoughts of one context.
pub const ARCHIVE_TOKEN: &str = "=archive";

/// Returns whether a value is one of the two root tokens.
pub fn is_root_token(value: &str) -> bool {
    value == ROOT_TOKEN || value == ABSOLUTE_TOKEN
}

/// Returns whether a value is a meta attribute (`=` prefix).
pub fn is_meta_value(value: &str) -> bool {
    value.starts_with('=')
}

/// Ordered ancestor values of a node, excluding ranks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Vec<String>);

impl Context {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// Home root context `[ROOT]`.
    pub fn root() -> Self {
        Self(vec![ROOT_TOKEN.to_string()])
    }

    /// Absolute root context `[ABSOLUTE]`.
    pub fn absolute() -> Self {
        Self(vec![ABSOLUTE_TOKEN.to_string()])
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether this is exactly one of the two root contexts.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1 && is_root_token(&self.0[0])
    }

    /// Last value, if any.
    pub fn head(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Content-addressed key of this context.
    pub fn hash(&self) -> ContextHash {
        hash_context(&self.0)
    }

    /// Context of the children of `value` placed in this context.
    pub fn child(&self, value: &str) -> Context {
        if self.0.len() == 1 && self.0[0] == ROOT_TOKEN {
            return Context(vec![value.to_string()]);
        }
        let mut values = self.0.clone();
        values.push(value.to_string());
        Context(values)
    }

    /// Returns whether `self` starts with `prefix` under value normalization.
    pub fn starts_with(&self, prefix: &Context) -> bool {
        prefix.0.len() <= self.0.len()
            && prefix
                .0
                .iter()
                .zip(self.0.iter())
                .all(|(left, right)| normalize_value(left) == normalize_value(right))
    }

    /// Replaces a leading `old_prefix` with `new_prefix`.
    ///
    /// Callers must check `starts_with(old_prefix)` first.
    pub fn rebase(&self, old_prefix: &Context, new_prefix: &Context) -> Context {
        let mut values = new_prefix.0.clone();
        values.extend(self.0.iter().skip(old_prefix.0.len()).cloned());
        Context(values)
    }

    /// Normalized element-wise identity, used for collision checks.
    pub fn normalized(&self) -> Vec<String> {
        self.0.iter().map(|value| normalize_value(value)).collect()
    }

    /// Canonical form: a leading home root token is dropped from contexts
    /// longer than the root itself, an empty context becomes `[ROOT]`.
    pub fn canonical(&self) -> Context {
        if self.0.is_empty() {
            return Context::root();
        }
        if self.0.len() > 1 && self.0[0] == ROOT_TOKEN {
            return Context(self.0[1..].to_vec());
        }
        self.clone()
    }

    /// Every proper ancestor context from the root down, excluding `self`.
    ///
    /// `[a, b, c]` yields `[ROOT]`, `[a]`, `[a, b]`.
    pub fn ancestors(&self) -> Vec<Context> {
        let canonical = self.canonical();
        if canonical.is_root() {
            return Vec::new();
        }
        let (start, first) = if canonical.0[0] == ABSOLUTE_TOKEN {
            (1, Context::absolute())
        } else {
            (0, Context::root())
        };
        let mut result = vec![first];
        for end in (start + 1)..canonical.0.len() {
            result.push(Context(canonical.0[..end].to_vec()));
        }
        result
    }

    /// Context that contains the node this context belongs to.
    ///
    /// `[a, b]` → `[a]`, `[a]` → `[ROOT]`, `[ABSOLUTE, x]` → `[ABSOLUTE]`.
    /// Root contexts have no parent.
    pub fn parent(&self) -> Option<Context> {
        self.ancestors().pop()
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for Context {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// One step of a path: a value plus the rank that disambiguates siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    pub value: String,
    pub rank: Rank,
}

impl PathSegment {
    pub fn new(value: impl Into<String>, rank: impl Into<Rank>) -> Self {
        Self {
            value: value.into(),
            rank: rank.into(),
        }
    }
}

/// Rank-qualified route from the root to one node.
pub type Path = Vec<PathSegment>;

/// A path validated against the index (see `selectors::simplify_path`).
pub type SimplePath = Vec<PathSegment>;

/// Home root path `[{ROOT, 0}]`.
pub fn root_path() -> Path {
    vec![PathSegment::new(ROOT_TOKEN, Rank::ZERO)]
}

/// Absolute root path `[{ABSOLUTE, 0}]`.
pub fn absolute_path() -> Path {
    vec![PathSegment::new(ABSOLUTE_TOKEN, Rank::ZERO)]
}

/// Returns whether a path addresses one of the roots.
pub fn is_root_path(path: &[PathSegment]) -> bool {
    path.len() == 1 && is_root_token(&path[0].value)
}

/// Projects the values of a path, in order.
pub fn path_to_context(path: &[PathSegment]) -> Context {
    Context(path.iter().map(|segment| segment.value.clone()).collect())
}

/// Context that directly contains the last node of `path`.
///
/// `[a]` → `[ROOT]`, `[a, b]` → `[a]`, `[ABSOLUTE, x]` → `[ABSOLUTE]`.
/// Root paths and empty paths are contained by nothing.
pub fn parent_context(path: &[PathSegment]) -> Option<Context> {
    match path.len() {
        0 => None,
        1 if is_root_token(&path[0].value) => None,
        1 => Some(Context::root()),
        len => Some(path_to_context(&path[..len - 1])),
    }
}

/// Drops a leading home root segment from paths that go below the root.
pub fn without_home_token(path: &[PathSegment]) -> &[PathSegment] {
    if path.len() > 1 && path[0].value == ROOT_TOKEN {
        &path[1..]
    } else {
        path
    }
}

/// Head value of a path.
pub fn head_value(path: &[PathSegment]) -> Option<&str> {
    path.last().map(|segment| segment.value.as_str())
}

/// Returns whether `path` equals `prefix` or lies underneath it.
///
/// Values compare by normalized form, ranks exactly.
pub fn path_starts_with(path: &[PathSegment], prefix: &[PathSegment]) -> bool {
    prefix.len() <= path.len()
        && prefix.iter().zip(path.iter()).all(|(left, right)| {
            left.rank == right.rank && normalize_value(&left.value) == normalize_value(&right.value)
        })
}

#[cfg(test)]
mod tests {
    use super::{
        parent_context, path_starts_with, path_to_context, root_path, Context, PathSegment,
        ABSOLUTE_TOKEN, ROOT_TOKEN,
    };

    #[test]
    fn child_context_drops_home_token_only() {
        assert_eq!(Context::root().child("a"), Context::new(["a"]));
        assert_eq!(Context::new(["a"]).child("b"), Context::new(["a", "b"]));
        assert_eq!(
            Context::absolute().child("x"),
            Context::new([ABSOLUTE_TOKEN, "x"])
        );
    }

    #[test]
    fn ancestors_walk_from_root() {
        let context = Context::new(["a", "b", "c"]);
        assert_eq!(
            context.ancestors(),
            vec![
                Context::root(),
                Context::new(["a"]),
                Context::new(["a", "b"])
            ]
        );
        assert_eq!(Context::new(["a"]).parent(), Some(Context::root()));
        assert_eq!(
            Context::new([ABSOLUTE_TOKEN, "x"]).parent(),
            Some(Context::absolute())
        );
        assert!(Context::root().parent().is_none());
    }

    #[test]
    fn canonical_strips_leading_home_token() {
        assert_eq!(
            Context::new([ROOT_TOKEN, "a"]).canonical(),
            Context::new(["a"])
        );
        assert_eq!(Context::new(Vec::<String>::new()).canonical(), Context::root());
        assert_eq!(Context::root().canonical(), Context::root());
    }

    #[test]
    fn rebase_replaces_prefix() {
        let context = Context::new(["a", "b", "c"]);
        let rebased = context.rebase(&Context::new(["a"]), &Context::new(["x", "y"]));
        assert_eq!(rebased, Context::new(["x", "y", "b", "c"]));
        assert!(context.starts_with(&Context::new(["A", "b"])));
        assert!(!context.starts_with(&Context::new(["b"])));
    }

    #[test]
    fn parent_context_of_paths() {
        assert_eq!(parent_context(&root_path()), None);
        assert_eq!(
            parent_context(&[PathSegment::new("a", 0)]),
            Some(Context::root())
        );
        assert_eq!(
            parent_context(&[PathSegment::new("a", 0), PathSegment::new("b", 1)]),
            Some(Context::new(["a"]))
        );
        assert_eq!(path_to_context(&root_path()), Context::new([ROOT_TOKEN]));
    }

    #[test]
    fn path_prefix_requires_matching_ranks() {
        let path = vec![PathSegment::new("a", 0), PathSegment::new("b", 1)];
        assert!(path_starts_with(&path, &[PathSegment::new("A", 0)]));
        assert!(!path_starts_with(&path, &[PathSegment::new("a", 1)]));
    }
}
