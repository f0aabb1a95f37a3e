//! Keys and props of descriptor nodes.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::{Handler, Value};

/// Identity of a child within its sibling list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

impl Key {
    /// Keys can only be built from integers and strings.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Int(i) => Some(Key::Int(*i)),
            Value::Str(s) => Some(Key::Str(Rc::clone(s))),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i64::from(i))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(Rc::from(s))
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Int(i) => Value::Int(i),
            Key::Str(s) => Value::Str(s),
        }
    }
}

/// Prop name that carries the handler for `event`: `"click"` -> `"onClick"`.
pub fn handler_key(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_owned(),
    }
}

/// Ordered property map of a descriptor node.
#[derive(Clone, Default, PartialEq)]
pub struct Props(IndexMap<String, Value>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Builder-style handler for `event` (stored under `on` + capitalized name).
    pub fn on(self, event: &str, handler: impl Fn(&[Value]) + 'static) -> Self {
        self.with(handler_key(event), Handler::new(handler))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same key set and every value the [same](Value::same).
    pub fn same_as(&self, other: &Props) -> bool {
        self.len() == other.len()
            && self
                .0
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v.same(value)))
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_keys() {
        assert_eq!(handler_key("click"), "onClick");
        assert_eq!(handler_key("update:value"), "onUpdate:value");
    }

    #[test]
    fn keys_from_values() {
        assert_eq!(Key::from_value(&Value::from(3)), Some(Key::Int(3)));
        assert_eq!(Key::from_value(&Value::from("a")), Some(Key::from("a")));
        assert_eq!(Key::from_value(&Value::Null), None);
        assert_eq!(Key::from(7).to_string(), "7");
    }

    #[test]
    fn same_as_uses_shallow_identity() {
        let a = Props::new().with("id", "x").with("n", 1);
        let b = Props::new().with("n", 1).with("id", "x");
        assert!(a.same_as(&b));

        let c = Props::new().with("id", "x");
        assert!(!a.same_as(&c));

        let h = Props::new().on("click", |_| {});
        let h2 = Props::new().on("click", |_| {});
        assert!(!h.same_as(&h2));
        assert!(h.same_as(&h.clone()));
    }
}
