//! Application parameters forwarded to the remote API.
//!
//! Parameters arrive from the browser as a URL-encoded query string that may
//! use bracketed keys (`fileIds[]=1&fileIds[]=2`, `filter[name]=x`). They are
//! parsed into a nested [`ParameterSet`] and serialized back with the same
//! bracket convention when the request is signed.

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::Result;
use crate::error::Error;

const MAX_DEPTH: usize = 32;

/// A single parameter value: plain text, a list (`key[]`), or a nested map
/// (`key[child]`).
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterValue {
    Text(String),
    List(Vec<ParameterValue>),
    Map(BTreeMap<String, ParameterValue>),
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_owned())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

impl<V: Into<ParameterValue>> From<Vec<V>> for ParameterValue {
    fn from(values: Vec<V>) -> Self {
        ParameterValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Key/value payload sent to the remote API. Keys are kept sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterSet {
    entries: BTreeMap<String, ParameterValue>,
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a URL-encoded query string, honoring bracketed nesting.
    ///
    /// Fails when the same key is used with incompatible shapes, e.g.
    /// `a=1&a[]=2`.
    pub fn parse_query(query: &str) -> Result<Self> {
        let mut set = Self::new();
        for (name, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            normalize(&mut set.entries, &name, value.into_owned(), 0)?;
        }
        Ok(set)
    }

    /// Inserts a value, replacing any existing entry under `key`.
    pub fn insert<K: Into<String>, V: Into<ParameterValue>>(
        &mut self,
        key: K,
        value: V,
    ) -> Option<ParameterValue> {
        self.entries.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flattens the set into decoded `(key, value)` pairs using bracketed
    /// keys, in serialization order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (key, value) in &self.entries {
            flatten(value, key.clone(), &mut out);
        }
        out
    }

    /// Serializes the set as a form-encoded query string (no leading `?`).
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.pairs() {
            serializer.append_pair(&key, &value);
        }
        serializer.finish()
    }
}

fn flatten(value: &ParameterValue, key: String, out: &mut Vec<(String, String)>) {
    match value {
        ParameterValue::Text(text) => out.push((key, text.clone())),
        ParameterValue::List(items) => {
            let prefix = format!("{key}[]");
            if items.is_empty() {
                out.push((prefix, String::new()));
                return;
            }
            for item in items {
                flatten(item, prefix.clone(), out);
            }
        }
        ParameterValue::Map(map) => {
            if map.is_empty() {
                out.push((key, String::new()));
                return;
            }
            for (child, item) in map {
                flatten(item, format!("{key}[{child}]"), out);
            }
        }
    }
}

fn is_bracket(c: char) -> bool {
    c == '[' || c == ']'
}

/// Splits `name` into its leading key and the bracketed remainder.
fn split_name(name: &str) -> (&str, &str) {
    let trimmed = name.trim_start_matches(is_bracket);
    let end = trimmed.find(is_bracket).unwrap_or(trimmed.len());
    let (key, rest) = trimmed.split_at(end);
    (key, rest.trim_start_matches(']'))
}

fn normalize(
    params: &mut BTreeMap<String, ParameterValue>,
    name: &str,
    value: String,
    depth: usize,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::validation("http_parameters are nested too deeply"));
    }

    let (key, after) = split_name(name);
    if key.is_empty() {
        return Ok(());
    }

    if after.is_empty() {
        params.insert(key.to_owned(), ParameterValue::Text(value));
        return Ok(());
    }

    if after == "[" {
        params.insert(name.to_owned(), ParameterValue::Text(value));
        return Ok(());
    }

    if after == "[]" {
        let entry = params
            .entry(key.to_owned())
            .or_insert_with(|| ParameterValue::List(Vec::new()));
        let ParameterValue::List(items) = entry else {
            return Err(type_conflict(key, "an array"));
        };
        items.push(ParameterValue::Text(value));
        return Ok(());
    }

    if let Some(child) = after.strip_prefix("[]") {
        let entry = params
            .entry(key.to_owned())
            .or_insert_with(|| ParameterValue::List(Vec::new()));
        let ParameterValue::List(items) = entry else {
            return Err(type_conflict(key, "an array"));
        };
        if let Some(ParameterValue::Map(last)) = items.last_mut() {
            if !has_path(last, child) {
                return normalize(last, child, value, depth + 1);
            }
        }
        let mut fresh = BTreeMap::new();
        normalize(&mut fresh, child, value, depth + 1)?;
        items.push(ParameterValue::Map(fresh));
        return Ok(());
    }

    let entry = params
        .entry(key.to_owned())
        .or_insert_with(|| ParameterValue::Map(BTreeMap::new()));
    let ParameterValue::Map(inner) = entry else {
        return Err(type_conflict(key, "a hash"));
    };
    normalize(inner, after, value, depth + 1)
}

fn has_path(map: &BTreeMap<String, ParameterValue>, path: &str) -> bool {
    let mut segments = path.split(is_bracket).filter(|s| !s.is_empty()).peekable();
    let mut current = map;
    while let Some(segment) = segments.next() {
        match current.get(segment) {
            None => return false,
            Some(ParameterValue::Map(next)) if segments.peek().is_some() => current = next,
            Some(_) => return segments.peek().is_none(),
        }
    }
    false
}

fn type_conflict(key: &str, expected: &str) -> Error {
    Error::validation(format!(
        "http_parameters key `{key}` is used both as {expected} and as another type"
    ))
}
