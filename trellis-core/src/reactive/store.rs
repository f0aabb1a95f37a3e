//! Reactive Wrapper
//!
//! A [`ReactiveObject`] is an observable view of a raw [`Object`]. Reads made
//! through it subscribe the running computation to the field read; writes
//! made through it notify the computations that read the field.
//!
//! # Identity
//!
//! Wrapping is idempotent: the same raw object always yields the same wrapper
//! (one per flavor, deep or shallow) for as long as any handle to that wrapper
//! is alive. The registry only holds wrappers weakly.
//!
//! # Nested objects
//!
//! Fields always store raw values. A deep wrapper wraps a nested object lazily
//! when it is read, so `state.get("user")` returns the (cached) wrapper of the
//! raw `user` object. A shallow wrapper returns nested objects as they are.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::{DepKey, Runtime};
use super::value::{Object, Value};
use super::ObjectId;

struct ReactiveInner {
    raw: Object,
    shallow: bool,
}

impl Drop for ReactiveInner {
    fn drop(&mut self) {
        let key = (self.raw.id(), self.shallow);
        let _ = REACTIVE_MAP.try_with(|map| {
            if let Ok(mut map) = map.try_borrow_mut() {
                if map.get(&key).is_some_and(|weak| weak.strong_count() == 0) {
                    map.remove(&key);
                }
            }
        });
    }
}

thread_local! {
    static REACTIVE_MAP: RefCell<HashMap<(ObjectId, bool), Weak<ReactiveInner>>> = RefCell::new(HashMap::new());
}

/// Observable handle to a raw object.
#[derive(Clone)]
pub struct ReactiveObject(Rc<ReactiveInner>);

impl ReactiveObject {
    fn wrap(raw: &Object, shallow: bool) -> Self {
        let key = (raw.id(), shallow);
        REACTIVE_MAP.with(|map| {
            let mut map = map.borrow_mut();
            if let Some(existing) = map.get(&key).and_then(Weak::upgrade) {
                return Self(existing);
            }

            let inner = Rc::new(ReactiveInner {
                raw: raw.clone(),
                shallow,
            });
            map.insert(key, Rc::downgrade(&inner));
            Self(inner)
        })
    }

    /// Identity of the underlying raw object.
    pub fn id(&self) -> ObjectId {
        self.0.raw.id()
    }

    /// The underlying raw object. Reads and writes on it are not observed.
    pub fn raw(&self) -> Object {
        self.0.raw.clone()
    }

    pub fn is_shallow(&self) -> bool {
        self.0.shallow
    }

    /// Read a field, subscribing the running computation to it.
    ///
    /// Missing fields read as [`Value::Null`].
    pub fn get(&self, key: &str) -> Value {
        Runtime::track(self.id(), DepKey::Field(key.to_owned()));
        self.get_untracked(key)
    }

    /// Read a field without subscribing.
    pub fn get_untracked(&self, key: &str) -> Value {
        let value = self.0.raw.get(key).unwrap_or_default();
        match value {
            Value::Object(nested) if !self.0.shallow => Value::Reactive(reactive_object(&nested)),
            other => other,
        }
    }

    /// Write a field.
    ///
    /// Adding a key notifies readers of that field and of the key set.
    /// Overwriting notifies only if the value is not the [same](Value::same)
    /// as before.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let value = if self.0.shallow { value } else { to_raw(&value) };

        match self.0.raw.insert(key.clone(), value.clone()) {
            None => {
                Runtime::trigger(self.id(), &DepKey::Field(key));
                Runtime::trigger(self.id(), &DepKey::Iterate);
            }
            Some(old) if !old.same(&value) => {
                Runtime::trigger(self.id(), &DepKey::Field(key));
            }
            Some(_) => {}
        }
    }

    /// Remove a field, returning its raw value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.0.raw.remove(key)?;
        Runtime::trigger(self.id(), &DepKey::Field(key.to_owned()));
        Runtime::trigger(self.id(), &DepKey::Iterate);
        Some(removed)
    }

    /// Whether the field exists. Tracks the key set.
    pub fn has(&self, key: &str) -> bool {
        Runtime::track(self.id(), DepKey::Iterate);
        self.0.raw.contains_key(key)
    }

    /// Field names in insertion order. Tracks the key set.
    pub fn keys(&self) -> Vec<String> {
        Runtime::track(self.id(), DepKey::Iterate);
        self.0.raw.keys()
    }

    /// Number of fields. Tracks the key set.
    pub fn len(&self) -> usize {
        Runtime::track(self.id(), DepKey::Iterate);
        self.0.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("raw", &self.0.raw)
            .field("shallow", &self.0.shallow)
            .finish()
    }
}

/// Wrap a value: objects become (deep) reactive, wrappers and scalars pass
/// through unchanged.
pub fn reactive(value: impl Into<Value>) -> Value {
    match value.into() {
        Value::Object(raw) => Value::Reactive(reactive_object(&raw)),
        other => other,
    }
}

/// Deep wrapper for `raw`.
pub fn reactive_object(raw: &Object) -> ReactiveObject {
    ReactiveObject::wrap(raw, false)
}

/// Shallow wrapper for `raw`: top-level fields are tracked, nested objects
/// are returned unwrapped.
pub fn shallow_reactive(raw: &Object) -> ReactiveObject {
    ReactiveObject::wrap(raw, true)
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

/// Unwrap a wrapper to its raw object; other values are returned as is.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Reactive(reactive) => Value::Object(reactive.raw()),
        other => other.clone(),
    }
}

/// Deep-wrap objects, leave everything else alone.
pub fn to_reactive(value: &Value) -> Value {
    reactive(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::reactive::effect;

    #[test]
    fn same_object_same_wrapper() {
        let raw = Object::new();
        let a = reactive_object(&raw);
        let b = reactive_object(&raw);
        assert!(a.ptr_eq(&b));

        let shallow = shallow_reactive(&raw);
        assert!(!shallow.ptr_eq(&a));
        assert_eq!(shallow.id(), a.id());
    }

    #[test]
    fn reactive_passes_through() {
        assert_eq!(reactive(1), Value::Int(1));

        let wrapped = reactive(Object::new());
        assert!(is_reactive(&wrapped));
        assert!(reactive(wrapped.clone()).same(&wrapped));
        assert!(matches!(to_raw(&wrapped), Value::Object(_)));
    }

    #[test]
    fn nested_objects_are_wrapped_on_read() {
        let inner = Object::new().with("name", "ada");
        let state = reactive_object(&Object::new().with("user", inner.clone()));

        let user = state.get("user");
        assert!(is_reactive(&user));
        assert!(user.as_reactive().unwrap().ptr_eq(&reactive_object(&inner)));

        let shallow = shallow_reactive(&state.raw());
        assert!(matches!(shallow.get("user"), Value::Object(_)));
    }

    #[test]
    fn writes_store_raw_values() {
        let state = reactive_object(&Object::new());
        let child = reactive_object(&Object::new());
        state.set("child", child.clone());

        assert!(matches!(state.raw().get("child"), Some(Value::Object(_))));
        assert!(state.get("child").same(&Value::Reactive(child)));
    }

    #[test]
    fn same_value_write_is_silent() {
        let state = reactive_object(&Object::new().with("n", 1));
        let runs = Rc::new(Cell::new(0));

        let (source, counter) = (state.clone(), runs.clone());
        let _runner = effect(move || {
            counter.set(counter.get() + 1);
            let _ = source.get("n");
        });

        state.set("n", 1);
        assert_eq!(runs.get(), 1);

        state.set("n", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn key_set_is_tracked() {
        let state = reactive_object(&Object::new().with("a", 1));
        let seen = Rc::new(Cell::new(0));

        let (source, sink) = (state.clone(), seen.clone());
        let _runner = effect(move || sink.set(source.len()));
        assert_eq!(seen.get(), 1);

        state.set("a", 5);
        assert_eq!(seen.get(), 1);

        state.set("b", 2);
        assert_eq!(seen.get(), 2);

        assert_eq!(state.remove("a"), Some(Value::Int(5)));
        assert_eq!(seen.get(), 1);

        assert_eq!(state.remove("missing"), None);
    }
}
