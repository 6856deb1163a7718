//! Content-addressed keys for lexemes and parent records.
//!
//! # Responsibility
//! - Normalize thought values so equal-looking text shares one key.
//! - Derive fixed-size keys for values and for ordered contexts.
//!
//! # Invariants
//! - Hashing is pure and deterministic across processes and platforms.
//! - Value keys and context keys live in separate domains; a one-element
//!   context never shares a key with the value it contains.
//! - Display casing never influences a key.

use crate::model::path::is_root_token;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const VALUE_DOMAIN: &[u8] = b"outline.value.v1\0";
const CONTEXT_DOMAIN: &[u8] = b"outline.context.v1\0";
const CONTEXT_SEPARATOR: char = '\u{1f}';

/// Characters stripped from both ends of a value before hashing.
///
/// `=` and `#` are kept, so meta attributes like `=archive` never alias
/// plain words.
const OUTER_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '"', '\'', '(', ')', '[', ']', '{', '}', '*', '_', '~', '`',
];

/// Returns the normalized form used for value equality.
///
/// Rules: trim, lowercase, strip outer punctuation. A value made only of
/// punctuation keeps its trimmed lowercase form so it stays addressable.
/// Root tokens are returned verbatim so no user text can alias them.
pub fn normalize_value(value: &str) -> String {
    if is_root_token(value) {
        return value.to_string();
    }
    let lowered = value.trim().to_lowercase();
    let stripped = lowered
        .trim_matches(|c: char| OUTER_PUNCTUATION.contains(&c))
        .trim();
    if stripped.is_empty() && !lowered.is_empty() {
        return lowered;
    }
    stripped.to_string()
}

/// Returns whether two values normalize to the same text.
pub fn values_equal(left: &str, right: &str) -> bool {
    normalize_value(left) == normalize_value(right)
}

macro_rules! digest_key {
    ($name:ident, $label:literal) => {
        #[doc = concat!("32-byte BLAKE3 key addressing one ", $label, ".")]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name([u8; 32]);

        impl $name {
            /// Returns raw key bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Returns lowercase hex form used for storage keys.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parses a lowercase or uppercase hex key.
            pub fn from_hex(value: &str) -> Result<Self, String> {
                let bytes = hex::decode(value.trim())
                    .map_err(|err| format!("invalid {} hex `{value}`: {err}", $label))?;
                let array: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
                    format!("{} key must be 32 bytes, got {}", $label, bytes.len())
                })?;
                Ok(Self(array))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                // Short prefix keeps test failure output readable.
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..12])
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_hex(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_hex()
            }
        }
    };
}

digest_key!(ValueHash, "thought value");
digest_key!(ContextHash, "context");

/// Hashes one thought value after normalization.
pub fn hash_thought(value: &str) -> ValueHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(VALUE_DOMAIN);
    hasher.update(normalize_value(value).as_bytes());
    ValueHash(*hasher.finalize().as_bytes())
}

/// Hashes an ordered context; element order is significant.
pub fn hash_context<S: AsRef<str>>(context: &[S]) -> ContextHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(CONTEXT_DOMAIN);
    let mut buf = [0u8; 4];
    for (index, value) in context.iter().enumerate() {
        if index > 0 {
            hasher.update(CONTEXT_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(normalize_value(value.as_ref()).as_bytes());
    }
    ContextHash(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::{hash_context, hash_thought, normalize_value, ContextHash, ValueHash};

    #[test]
    fn normalize_trims_lowercases_and_strips_outer_punctuation() {
        assert_eq!(normalize_value("  Hello World! "), "hello world");
        assert_eq!(normalize_value("\"quoted\""), "quoted");
        assert_eq!(normalize_value("a.b"), "a.b");
    }

    #[test]
    fn normalize_keeps_meta_prefix_and_punctuation_only_values() {
        assert_eq!(normalize_value("=archive"), "=archive");
        assert_eq!(normalize_value("#Tag"), "#tag");
        assert_eq!(normalize_value("..."), "...");
        assert_eq!(normalize_value(""), "");
    }

    #[test]
    fn root_tokens_never_alias_user_text() {
        use crate::model::path::{ABSOLUTE_TOKEN, ROOT_TOKEN};
        assert_eq!(normalize_value(ROOT_TOKEN), ROOT_TOKEN);
        assert_ne!(hash_context(&[ROOT_TOKEN]), hash_context(&["root"]));
        assert_ne!(hash_context(&[ROOT_TOKEN]), hash_context(&["__root__"]));
        assert_ne!(hash_context(&[ABSOLUTE_TOKEN]), hash_context(&["absolute"]));
    }

    #[test]
    fn thought_hash_ignores_case_and_whitespace() {
        assert_eq!(hash_thought("Todo"), hash_thought(" todo "));
        assert_ne!(hash_thought("todo"), hash_thought("done"));
    }

    #[test]
    fn context_hash_is_order_sensitive() {
        assert_ne!(hash_context(&["a", "b"]), hash_context(&["b", "a"]));
        assert_eq!(hash_context(&["A", "b"]), hash_context(&["a", "B "]));
    }

    #[test]
    fn context_hash_separates_elements() {
        assert_ne!(hash_context(&["ab", "c"]), hash_context(&["a", "bc"]));
        assert_ne!(hash_context(&["a b"]), hash_context(&["a", "b"]));
    }

    #[test]
    fn value_and_context_domains_do_not_overlap() {
        assert_ne!(
            hash_thought("a").as_bytes(),
            hash_context(&["a"]).as_bytes()
        );
    }

    #[test]
    fn keys_round_trip_through_hex() {
        let value = hash_thought("a");
        assert_eq!(ValueHash::from_hex(&value.to_hex()).unwrap(), value);
        let context = hash_context(&["a", "b"]);
        assert_eq!(ContextHash::from_hex(&context.to_string()).unwrap(), context);
        assert!(ValueHash::from_hex("abcd").is_err());
    }
}
