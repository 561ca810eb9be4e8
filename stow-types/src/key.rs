//! Structural cache keys.
//!
//! A [`QueryKey`] is an ordered tuple of [`KeyPart`]s, for example
//! `["search", {animal: "dog", breed: "", location: "Seattle"}]`.
//! Equality and hashing are structural. Map parts keep their fields in a
//! `BTreeMap`, so two maps built in different insertion orders compare equal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One component of a [`QueryKey`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    /// Absent value (an unselected discriminator).
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Text value.
    Text(String),
    /// Ordered list of parts.
    List(Vec<KeyPart>),
    /// Named fields, canonically ordered by name.
    Map(BTreeMap<String, KeyPart>),
}

impl KeyPart {
    /// Build a map part from `(name, value)` pairs.
    pub fn map<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<KeyPart>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// True for `Null` and the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Borrow the text of a `Text` part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow a field of a `Map` part.
    pub fn field(&self, name: &str) -> Option<&KeyPart> {
        match self {
            Self::Map(fields) => fields.get(name),
            _ => None,
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<KeyPart>> From<Vec<T>> for KeyPart {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::List(parts) => {
                write!(f, "[")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", part)?;
                }
                write!(f, "]")
            }
            Self::Map(fields) => {
                write!(f, "{{")?;
                for (i, (name, part)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, part)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Debug for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Identity of a cached query result.
///
/// The first part is conventionally a text scope (`"breeds"`, `"search"`,
/// `"details"`); the remaining parts are the query's parameters.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    /// Create a key from its parts.
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Start a key with a text scope.
    pub fn scope(name: impl Into<String>) -> Self {
        Self(vec![KeyPart::Text(name.into())])
    }

    /// Append a part.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    /// All parts, in order.
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// The part at `index`, if any.
    pub fn part(&self, index: usize) -> Option<&KeyPart> {
        self.0.get(index)
    }

    /// The scope name, if the first part is text.
    pub fn scope_name(&self) -> Option<&str> {
        self.0.first().and_then(KeyPart::as_text)
    }

    /// True if any top-level parameter (every part after the scope) is blank.
    ///
    /// Queries for such keys short-circuit to an empty result.
    pub fn is_incomplete(&self) -> bool {
        self.0.iter().skip(1).any(KeyPart::is_blank)
    }

    /// True if `prefix`'s parts are a leading run of this key's parts.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", KeyPartsDisplay(&self.0))
    }
}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryKey{}", KeyPartsDisplay(&self.0))
    }
}

struct KeyPartsDisplay<'a>(&'a [KeyPart]);

impl fmt::Display for KeyPartsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}
