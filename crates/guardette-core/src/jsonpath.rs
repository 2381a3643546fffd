//! A small JSONPath evaluator with in-place mutation.
//!
//! Supported syntax:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `$` | document root (implied when omitted) |
//! | `.name`, `['name']`, `["name"]` | object member |
//! | `[n]` | array element, negative counts from the end |
//! | `.*`, `[*]` | every object value or array element |
//! | `..name`, `..*` | recursive descent |
//! | `[?(@.a.b)]` | children where `a.b` exists |
//! | `[?(@.a == 'x')]` | children where `a` compares to a literal (`== != < <= > >=`) |
//!
//! Evaluation yields [`Location`]s, paths of keys and indices from the
//! root. [`JsonPath::replace`], [`JsonPath::update_with`] and
//! [`JsonPath::remove`] apply uniformly over them. An expression matching
//! nothing leaves the document untouched.
//!
//! # Example
//!
//! ```rust
//! use guardette_core::jsonpath::JsonPath;
//! use serde_json::json;
//!
//! let path = JsonPath::parse("$.users[*].email").unwrap();
//! let mut doc = json!({"users": [{"email": "a@x.io"}, {"email": "b@x.io"}]});
//!
//! assert_eq!(path.replace(&mut doc, &json!(null)), 2);
//! assert_eq!(doc, json!({"users": [{"email": null}, {"email": null}]}));
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

/// A JSON path expression that failed to parse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid JSON path '{expression}': {reason}")]
pub struct JsonPathError {
    /// The expression.
    pub expression: String,
    /// Explanation.
    pub reason: String,
}

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Object member.
    Key(String),
    /// Array element.
    Index(usize),
}

/// Path from the document root to a matched value.
pub type Location = Vec<PathSegment>;

#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Child(String),
    Index(i64),
    Wildcard,
    Descendant(String),
    DescendantWildcard,
    Filter(Filter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    path: Vec<String>,
    comparison: Option<(CmpOp, Value)>,
}

/// A compiled JSON path expression.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    expression: String,
    selectors: Vec<Selector>,
}

impl JsonPath {
    /// Compiles an expression.
    pub fn parse(expression: &str) -> Result<Self, JsonPathError> {
        let selectors = Parser::new(expression).parse()?;
        Ok(Self {
            expression: expression.to_string(),
            selectors,
        })
    }

    /// The source expression.
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// Every location the expression matches, in document order.
    pub fn locate(&self, doc: &Value) -> Vec<Location> {
        let mut current: Vec<Location> = vec![Vec::new()];

        for selector in &self.selectors {
            let mut next = Vec::new();
            for location in &current {
                let Some(node) = get(doc, location) else {
                    continue;
                };
                select(selector, node, location, &mut next);
            }
            current = next;
        }

        current
    }

    /// Every value the expression matches.
    pub fn find<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        self.locate(doc)
            .iter()
            .filter_map(|location| get(doc, location))
            .collect()
    }

    /// Sets every match to `value`, returning the number of writes.
    pub fn replace(&self, doc: &mut Value, value: &Value) -> usize {
        self.update_with(doc, |_| Some(value.clone()))
    }

    /// Calls `f` on every match and stores the value it returns.
    ///
    /// Returning `None` leaves that location unchanged.
    pub fn update_with<F>(&self, doc: &mut Value, mut f: F) -> usize
    where
        F: FnMut(&Value) -> Option<Value>,
    {
        let mut updated = 0;
        for location in self.locate(doc) {
            if let Some(slot) = get_mut(doc, &location) {
                if let Some(new_value) = f(slot) {
                    *slot = new_value;
                    updated += 1;
                }
            }
        }
        updated
    }

    /// Deletes every match from its parent, returning the number removed.
    ///
    /// A match on the root itself is ignored.
    pub fn remove(&self, doc: &mut Value) -> usize {
        let mut locations = self.locate(doc);
        locations.sort();
        locations.dedup();

        let mut removed = 0;
        for location in locations.iter().rev() {
            let Some((last, parent)) = location.split_last() else {
                continue;
            };
            let Some(container) = get_mut(doc, parent) else {
                continue;
            };
            let did_remove = match (container, last) {
                (Value::Object(map), PathSegment::Key(key)) => map.remove(key).is_some(),
                (Value::Array(items), PathSegment::Index(index)) if *index < items.len() => {
                    items.remove(*index);
                    true
                }
                _ => false,
            };
            if did_remove {
                removed += 1;
            }
        }
        removed
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

static CACHE: OnceLock<RwLock<HashMap<String, Arc<JsonPath>>>> = OnceLock::new();

/// Compiles an expression through the process-wide cache.
pub fn compile(expression: &str) -> Result<Arc<JsonPath>, JsonPathError> {
    let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    if let Some(path) = cache.read().get(expression) {
        return Ok(Arc::clone(path));
    }

    let path = Arc::new(JsonPath::parse(expression)?);
    cache
        .write()
        .entry(expression.to_string())
        .or_insert_with(|| Arc::clone(&path));
    Ok(path)
}

/// Resolves a location.
pub fn get<'a>(doc: &'a Value, location: &[PathSegment]) -> Option<&'a Value> {
    location.iter().try_fold(doc, |node, segment| match (node, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        _ => None,
    })
}

/// Resolves a location for writing.
pub fn get_mut<'a>(doc: &'a mut Value, location: &[PathSegment]) -> Option<&'a mut Value> {
    location.iter().try_fold(doc, |node, segment| match (node, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
        (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
        _ => None,
    })
}

fn child(location: &Location, segment: PathSegment) -> Location {
    let mut next = Vec::with_capacity(location.len() + 1);
    next.extend_from_slice(location);
    next.push(segment);
    next
}

fn children<'a>(node: &'a Value, location: &Location) -> Vec<(Location, &'a Value)> {
    match node {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (child(location, PathSegment::Key(k.clone())), v))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (child(location, PathSegment::Index(i)), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn select(selector: &Selector, node: &Value, location: &Location, out: &mut Vec<Location>) {
    match selector {
        Selector::Child(name) => {
            if node.as_object().is_some_and(|map| map.contains_key(name)) {
                out.push(child(location, PathSegment::Key(name.clone())));
            }
        }
        Selector::Index(index) => {
            if let Value::Array(items) = node {
                let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
                let resolved = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&resolved) {
                    if let Ok(resolved) = usize::try_from(resolved) {
                        out.push(child(location, PathSegment::Index(resolved)));
                    }
                }
            }
        }
        Selector::Wildcard => {
            out.extend(children(node, location).into_iter().map(|(loc, _)| loc));
        }
        Selector::Descendant(name) => descend(node, location, &mut |value, loc| {
            if value.as_object().is_some_and(|map| map.contains_key(name)) {
                out.push(child(loc, PathSegment::Key(name.clone())));
            }
        }),
        Selector::DescendantWildcard => descend_children(node, location, out),
        Selector::Filter(filter) => {
            out.extend(
                children(node, location)
                    .into_iter()
                    .filter(|(_, value)| filter.matches(value))
                    .map(|(loc, _)| loc),
            );
        }
    }
}

fn descend_children(node: &Value, location: &Location, out: &mut Vec<Location>) {
    for (loc, value) in children(node, location) {
        out.push(loc.clone());
        descend_children(value, &loc, out);
    }
}

/// Visits `node` and every descendant in pre-order.
fn descend(node: &Value, location: &Location, visit: &mut dyn FnMut(&Value, &Location)) {
    visit(node, location);
    for (loc, value) in children(node, location) {
        descend(value, &loc, visit);
    }
}

impl Filter {
    fn matches(&self, candidate: &Value) -> bool {
        let target = self
            .path
            .iter()
            .try_fold(candidate, |node, key| node.as_object()?.get(key));

        match (&self.comparison, target) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some((op, literal)), Some(value)) => compare(*op, value, literal),
        }
    }
}

fn compare(op: CmpOp, value: &Value, literal: &Value) -> bool {
    let ordering = match (value, literal) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    };

    match op {
        CmpOp::Eq => ordering == Some(Ordering::Equal),
        CmpOp::Ne => ordering != Some(Ordering::Equal),
        CmpOp::Lt => ordering == Some(Ordering::Less),
        CmpOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => ordering == Some(Ordering::Greater),
        CmpOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

struct Parser<'a> {
    expression: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str) -> Self {
        let trimmed = expression.trim();
        let normalized = match trimmed.chars().next() {
            Some('$') => trimmed.to_string(),
            Some('.' | '[') => format!("${trimmed}"),
            _ => format!("$.{trimmed}"),
        };
        Self {
            expression,
            chars: normalized.chars().collect(),
            pos: 1,
        }
    }

    fn error(&self, reason: impl Into<String>) -> JsonPathError {
        JsonPathError {
            expression: self.expression.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), JsonPathError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}' at offset {}", self.pos)))
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse(mut self) -> Result<Vec<Selector>, JsonPathError> {
        if self.expression.trim().is_empty() {
            return Err(self.error("empty expression"));
        }

        let mut selectors = Vec::new();
        while let Some(c) = self.peek() {
            let selector = match c {
                '.' => {
                    self.pos += 1;
                    if self.eat('.') {
                        if self.eat('*') {
                            Selector::DescendantWildcard
                        } else {
                            Selector::Descendant(self.name()?)
                        }
                    } else if self.eat('*') {
                        Selector::Wildcard
                    } else {
                        Selector::Child(self.name()?)
                    }
                }
                '[' => {
                    self.pos += 1;
                    self.bracket()?
                }
                other => return Err(self.error(format!("unexpected '{other}' at offset {}", self.pos))),
            };
            selectors.push(selector);
        }
        Ok(selectors)
    }

    fn name(&mut self) -> Result<String, JsonPathError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c != '.' && c != '[' && !c.is_whitespace())
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!("expected a member name at offset {start}")));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn bracket(&mut self) -> Result<Selector, JsonPathError> {
        self.skip_whitespace();
        let selector = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Selector::Wildcard
            }
            Some(quote @ ('\'' | '"')) => Selector::Child(self.quoted(quote)?),
            Some('?') => {
                self.pos += 1;
                self.expect('(')?;
                let filter = self.filter()?;
                self.expect(')')?;
                Selector::Filter(filter)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => Selector::Index(self.integer()?),
            _ => return Err(self.error(format!("invalid bracket selector at offset {}", self.pos))),
        };
        self.skip_whitespace();
        self.expect(']')?;
        Ok(selector)
    }

    fn quoted(&mut self, quote: char) -> Result<String, JsonPathError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("unterminated string"))?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn integer(&mut self) -> Result<i64, JsonPathError> {
        let start = self.pos;
        self.eat('-');
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse()
            .map_err(|_| self.error(format!("invalid index '{text}'")))
    }

    fn filter(&mut self) -> Result<Filter, JsonPathError> {
        self.skip_whitespace();
        self.expect('@')?;

        let mut path = Vec::new();
        loop {
            if self.eat('.') {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
                {
                    self.pos += 1;
                }
                if start == self.pos {
                    return Err(self.error("expected a member name in filter"));
                }
                path.push(self.chars[start..self.pos].iter().collect());
            } else if self.peek() == Some('[') {
                self.pos += 1;
                self.skip_whitespace();
                let quote = self
                    .peek()
                    .filter(|c| *c == '\'' || *c == '"')
                    .ok_or_else(|| self.error("expected a quoted member name in filter"))?;
                path.push(self.quoted(quote)?);
                self.skip_whitespace();
                self.expect(']')?;
            } else {
                break;
            }
        }
        if path.is_empty() {
            return Err(self.error("filter must reference a member of '@'"));
        }

        self.skip_whitespace();
        if self.peek() == Some(')') {
            return Ok(Filter {
                path,
                comparison: None,
            });
        }

        let op = self.operator()?;
        self.skip_whitespace();
        let literal = self.literal()?;
        self.skip_whitespace();

        Ok(Filter {
            path,
            comparison: Some((op, literal)),
        })
    }

    fn operator(&mut self) -> Result<CmpOp, JsonPathError> {
        let first = self.peek();
        self.pos += 1;
        let has_eq = self.eat('=');
        match (first, has_eq) {
            (Some('='), true) => Ok(CmpOp::Eq),
            (Some('!'), true) => Ok(CmpOp::Ne),
            (Some('<'), true) => Ok(CmpOp::Le),
            (Some('<'), false) => Ok(CmpOp::Lt),
            (Some('>'), true) => Ok(CmpOp::Ge),
            (Some('>'), false) => Ok(CmpOp::Gt),
            _ => Err(self.error("expected a comparison operator in filter")),
        }
    }

    fn literal(&mut self) -> Result<Value, JsonPathError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => Ok(Value::String(self.quoted(quote)?)),
            Some(_) => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ')' && !c.is_whitespace()) {
                    self.pos += 1;
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                match text.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" => Ok(Value::Null),
                    number => serde_json::from_str::<serde_json::Number>(number)
                        .map(Value::Number)
                        .map_err(|_| self.error(format!("invalid literal '{number}'"))),
                }
            }
            None => Err(self.error("expected a literal in filter")),
        }
    }
}
