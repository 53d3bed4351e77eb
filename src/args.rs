//! Opaque construction arguments forwarded to component factories.
//!
//! This module primarily implements the [`Args`] key-value store.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error as ThisError;

/// A value of some argument type.
///
/// Sizes are universally defined so that saved configurations mean the same
/// thing everywhere; `usize`/`isize` are deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgValue {
    Bool(bool),
    U64(u64),
    I64(i64),
    Str(String),
}

impl ArgValue {
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Self::U64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::I64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Represents a variant of [`ArgValue`], minus the contained value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Bool,
    U64,
    I64,
    Str,
}

impl From<&ArgValue> for ArgKind {
    fn from(value: &ArgValue) -> Self {
        match value {
            ArgValue::Bool(_) => Self::Bool,
            ArgValue::U64(_) => Self::U64,
            ArgValue::I64(_) => Self::I64,
            ArgValue::Str(_) => Self::Str,
        }
    }
}

impl Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bool => "Bool",
            Self::U64 => "U64",
            Self::I64 => "I64",
            Self::Str => "Str",
        };
        write!(f, "{}", s)
    }
}

/// The family-defined arguments passed to a component factory.
///
/// The core never inspects the payload, it only forwards it; each family's
/// factory validates and decodes its own expected shape through the typed
/// getters here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(FxHashMap<String, ArgValue>);

impl Args {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Default::default()
    }

    /// A builder function that adds the given key-value pair.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds the given key-value pair.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Gets the value for the given key, if present.
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    /// Gets the value for the given key, failing when absent.
    pub fn ok_get(&self, key: &str) -> Result<&ArgValue, ArgError> {
        self.0.get(key).ok_or_else(|| ArgError::Missing {
            key: key.to_string(),
        })
    }

    /// Gets a string value, failing when absent or of another kind.
    pub fn ok_str(&self, key: &str) -> Result<&str, ArgError> {
        let value = self.ok_get(key)?;
        value.as_str().ok_or_else(|| ArgError::WrongKind {
            key: key.to_string(),
            expected: ArgKind::Str,
            actual: value.into(),
        })
    }

    /// Gets a `u64` value, failing when absent or of another kind.
    pub fn ok_u64(&self, key: &str) -> Result<u64, ArgError> {
        let value = self.ok_get(key)?;
        value.to_u64().ok_or_else(|| ArgError::WrongKind {
            key: key.to_string(),
            expected: ArgKind::U64,
            actual: value.into(),
        })
    }

    /// Gets an `i64` value, failing when absent or of another kind.
    pub fn ok_i64(&self, key: &str) -> Result<i64, ArgError> {
        let value = self.ok_get(key)?;
        value.to_i64().ok_or_else(|| ArgError::WrongKind {
            key: key.to_string(),
            expected: ArgKind::I64,
            actual: value.into(),
        })
    }

    /// Gets a `bool` value, failing when absent or of another kind.
    pub fn ok_bool(&self, key: &str) -> Result<bool, ArgError> {
        let value = self.ok_get(key)?;
        value.to_bool().ok_or_else(|| ArgError::WrongKind {
            key: key.to_string(),
            expected: ArgKind::Bool,
            actual: value.into(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An error caused by decoding [`Args`].
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("missing argument {key:?}")]
    Missing { key: String },
    #[error("argument {key:?}: expected {expected} but got {actual}")]
    WrongKind {
        key: String,
        expected: ArgKind,
        actual: ArgKind,
    },
}
