//! Path parameter extraction and storage.
//!
//! This module provides efficient storage for extracted path parameters
//! using a small-vector optimization to avoid heap allocations for
//! common cases (1-4 parameters).

use std::fmt;

use smallvec::SmallVec;

/// Maximum number of parameters stored inline (stack allocated).
const INLINE_PARAMS: usize = 4;

/// Declared type of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// One non-empty path segment (`{name}` or `{name:str}`).
    Str,
    /// Decimal digits, bound as an integer (`{name:int}`).
    Int,
    /// The remainder of the path, slashes included (`{name:path}`).
    Path,
}

impl ParamKind {
    /// Parses a placeholder type name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "" | "str" => Some(Self::Str),
            "int" => Some(Self::Int),
            "path" => Some(Self::Path),
            _ => None,
        }
    }

    /// Regular expression fragment recognised by this kind.
    pub(crate) fn pattern(self) -> &'static str {
        match self {
            Self::Str => "[^/]+",
            Self::Int => "[0-9]+",
            Self::Path => ".*",
        }
    }

    /// Converts raw matched text into a typed value.
    pub(crate) fn convert(self, raw: &str) -> Option<ParamValue> {
        match self {
            Self::Str => Some(ParamValue::Str(raw.to_string())),
            Self::Int => raw.parse().ok().map(ParamValue::Int),
            Self::Path => Some(ParamValue::Path(raw.to_string())),
        }
    }
}

/// A typed path parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Text from a single segment.
    Str(String),
    /// Integer from a digits-only segment.
    Int(i64),
    /// Raw path remainder.
    Path(String),
}

impl ParamValue {
    /// Returns the textual value for string and path parameters.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Path(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// Returns the integer value for integer parameters.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) | Self::Path(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

/// Extracted path parameters from a route match.
///
/// Parameters are stored as (name, value) pairs in template order.
///
/// # Example
///
/// ```rust
/// use guardette_router::{Params, ParamValue};
///
/// let mut params = Params::new();
/// params.push("id", ParamValue::Int(123));
/// params.push("name", ParamValue::Str("alice".into()));
///
/// assert_eq!(params.get("id"), Some(&ParamValue::Int(123)));
/// assert_eq!(params.get_str("name"), Some("alice"));
/// assert_eq!(params.get("unknown"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: SmallVec<[(String, ParamValue); INLINE_PARAMS]>,
}

impl Params {
    /// Creates a new empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a params set with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: SmallVec::with_capacity(capacity),
        }
    }

    /// Adds a parameter to the set.
    pub fn push(&mut self, name: impl Into<String>, value: ParamValue) {
        self.inner.push((name.into(), value));
    }

    /// Returns the value for a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.inner.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns the textual value for a string or path parameter.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns an iterator over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_push_and_get() {
        let mut params = Params::new();
        params.push("id", ParamValue::Int(7));
        params.push("name", ParamValue::Str("alice".to_string()));

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("id").and_then(ParamValue::as_int), Some(7));
        assert_eq!(params.get_str("name"), Some("alice"));
        assert_eq!(params.get_str("id"), None);
    }

    #[test]
    fn test_params_iter_keeps_order() {
        let params: Params = vec![
            ("a".to_string(), ParamValue::Str("1".to_string())),
            ("b".to_string(), ParamValue::Path("x/y".to_string())),
        ]
        .into_iter()
        .collect();

        let names: Vec<_> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_params_many_params() {
        let mut params = Params::with_capacity(2);
        for i in 0..10 {
            params.push(format!("key{i}"), ParamValue::Int(i));
        }

        assert_eq!(params.len(), 10);
        assert_eq!(params.get("key5"), Some(&ParamValue::Int(5)));
    }

    #[test]
    fn test_kind_conversion() {
        assert_eq!(ParamKind::from_name(""), Some(ParamKind::Str));
        assert_eq!(ParamKind::from_name("int"), Some(ParamKind::Int));
        assert_eq!(ParamKind::from_name("uuid"), None);

        assert_eq!(ParamKind::Int.convert("42"), Some(ParamValue::Int(42)));
        // Overflowing digit runs do not bind.
        assert_eq!(ParamKind::Int.convert("99999999999999999999"), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(ParamValue::Int(3).to_string(), "3");
        assert_eq!(ParamValue::Path("a/b".to_string()).to_string(), "a/b");
    }
}
