//! Context path lookup.
//!
//! Value templates and `object-property` read nested values through a
//! [`PathResolver`]. The resolver is injected at compile time so hosts can
//! pick how a missing segment is handled.

use std::fmt;

use crate::value::Value;

/// Split a dotted path (`"foo.bar.0"`) into its segments.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(ToString::to_string).collect()
}

/// Capability used by value templates to read from a context.
pub trait PathResolver: fmt::Debug + Send + Sync {
    /// Resolve `path` against `root`, returning [`Value::Undefined`] when any
    /// segment is absent.
    fn resolve(&self, root: &Value, path: &[String]) -> Value;
}

/// Own-keys-only resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainResolver;

impl PathResolver for PlainResolver {
    fn resolve(&self, root: &Value, path: &[String]) -> Value {
        let mut current = root;
        for segment in path {
            match step(current, segment) {
                Some(next) => current = next,
                None => return Value::Undefined,
            }
        }
        current.clone()
    }
}

/// Resolution that walks an ancestor chain.
///
/// When a segment is missing on an object, the lookup retries on the object
/// stored under `parent_key`, then on its parent, and so on.
#[derive(Debug, Clone)]
pub struct InheritingResolver {
    parent_key: String,
}

impl InheritingResolver {
    pub fn new(parent_key: impl Into<String>) -> Self {
        Self {
            parent_key: parent_key.into(),
        }
    }

    pub fn parent_key(&self) -> &str {
        &self.parent_key
    }

    fn inherited_step<'v>(&self, mut current: &'v Value, segment: &str) -> Option<&'v Value> {
        loop {
            if let Some(found) = step(current, segment) {
                return Some(found);
            }
            current = current.as_object()?.get(&self.parent_key)?;
        }
    }
}

impl PathResolver for InheritingResolver {
    fn resolve(&self, root: &Value, path: &[String]) -> Value {
        let mut current = root;
        for segment in path {
            match self.inherited_step(current, segment) {
                Some(next) => current = next,
                None => return Value::Undefined,
            }
        }
        current.clone()
    }
}

/// One lookup step: object member or decimal array index.
pub(crate) fn step<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(entries) => entries.get(segment),
        Value::Array(items) => {
            let idx = segment.parse::<usize>().ok()?;
            items.get(idx)
        }
        _ => None,
    }
}
