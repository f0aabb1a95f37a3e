//! Refs
//!
//! A [`Ref`] is a single boxed value with its own dependency set. Objects
//! stored in a (deep) ref are wrapped on the way in, so `r.get()` of an object
//! hands back a reactive wrapper.
//!
//! [`ObjectRef`] is a ref-shaped view of one field of a reactive object; it
//! owns no state of its own.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::context::untrack;
use super::dep::InlineDep;
use super::store::{to_raw, to_reactive, ReactiveObject};
use super::value::Value;

struct RefInner {
    raw: RefCell<Value>,
    value: RefCell<Value>,
    shallow: bool,
    dep: InlineDep,
}

/// A boxed reactive value.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{effect, Ref};
///
/// let count = Ref::new(0);
/// let reader = count.clone();
/// let runner = effect(move || {
///     let _ = reader.get();
/// });
///
/// count.set(1);
/// assert_eq!(runner.run_count(), 2);
///
/// count.set(1); // same value, nothing runs
/// assert_eq!(runner.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

impl Ref {
    /// Deep ref: stored objects are exposed through reactive wrappers.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::build(value.into(), false)
    }

    /// Shallow ref: the stored value is returned exactly as written.
    pub fn shallow(value: impl Into<Value>) -> Self {
        Self::build(value.into(), true)
    }

    fn build(value: Value, shallow: bool) -> Self {
        let (raw, value) = if shallow {
            (value.clone(), value)
        } else {
            (to_raw(&value), to_reactive(&value))
        };

        Self(Rc::new(RefInner {
            raw: RefCell::new(raw),
            value: RefCell::new(value),
            shallow,
            dep: InlineDep::default(),
        }))
    }

    /// Read the value, subscribing the running computation.
    pub fn get(&self) -> Value {
        self.0.dep.track();
        self.get_untracked()
    }

    pub fn get_untracked(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Replace the value; notifies only if the new raw value differs.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        let raw = if self.0.shallow {
            value.clone()
        } else {
            to_raw(&value)
        };

        if raw.same(&self.0.raw.borrow()) {
            return;
        }

        let exposed = if self.0.shallow {
            value
        } else {
            to_reactive(&value)
        };
        *self.0.raw.borrow_mut() = raw;
        *self.0.value.borrow_mut() = exposed;
        self.0.dep.trigger();
    }

    /// Set the value computed from the current one.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    /// Notify subscribers without changing the value.
    pub fn trigger(&self) {
        self.0.dep.trigger();
    }

    pub fn is_shallow(&self) -> bool {
        self.0.shallow
    }

    /// Number of computations currently reading this ref.
    pub fn subscriber_count(&self) -> usize {
        self.0.dep.subscriber_count()
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("value", &*self.0.value.borrow())
            .field("shallow", &self.0.shallow)
            .finish()
    }
}

/// A ref-shaped view of one field of a reactive object.
#[derive(Clone, Debug)]
pub struct ObjectRef {
    object: ReactiveObject,
    key: String,
    default: Option<Value>,
}

impl ObjectRef {
    /// Value to return while the field is missing or null.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Value {
        let value = self.object.get(&self.key);
        match (&value, &self.default) {
            (Value::Null, Some(default)) => default.clone(),
            _ => value,
        }
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.object.set(self.key.clone(), value);
    }
}

/// View one field of `object` as a ref.
pub fn to_ref(object: &ReactiveObject, key: impl Into<String>) -> ObjectRef {
    ObjectRef {
        object: object.clone(),
        key: key.into(),
        default: None,
    }
}

/// One [`ObjectRef`] per current field of `object`, in field order.
///
/// The key set is read untracked.
pub fn to_refs(object: &ReactiveObject) -> IndexMap<String, ObjectRef> {
    untrack(|| object.keys())
        .into_iter()
        .map(|key| (key.clone(), to_ref(object, key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::reactive::{effect, is_reactive, reactive_object, Object};

    #[test]
    fn deep_ref_wraps_objects() {
        let raw = Object::new();
        let r = Ref::new(raw.clone());
        assert!(is_reactive(&r.get()));

        let shallow = Ref::shallow(raw);
        assert!(matches!(shallow.get(), Value::Object(_)));
    }

    #[test]
    fn setting_the_same_raw_object_is_silent() {
        let raw = Object::new();
        let r = Ref::new(raw.clone());
        let runs = Rc::new(Cell::new(0));

        let (reader, counter) = (r.clone(), runs.clone());
        let _runner = effect(move || {
            counter.set(counter.get() + 1);
            let _ = reader.get();
        });

        r.set(reactive_object(&raw));
        assert_eq!(runs.get(), 1);

        r.set(Object::new());
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn subscriber_set_is_released() {
        let r = Ref::new(1);
        let reader = r.clone();
        let runner = effect(move || {
            let _ = reader.get();
        });
        assert_eq!(r.subscriber_count(), 1);

        runner.stop();
        assert_eq!(r.subscriber_count(), 0);
    }

    #[test]
    fn update_applies_function() {
        let r = Ref::new(2);
        r.update(|v| Value::from(v.as_int().unwrap_or(0) * 10));
        assert_eq!(r.get(), Value::Int(20));
    }

    #[test]
    fn object_refs_forward_to_the_field() {
        let state = reactive_object(&Object::new().with("a", 1).with("b", Value::Null));
        let refs = to_refs(&state);
        assert_eq!(refs.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        refs["a"].set(5);
        assert_eq!(state.get("a"), Value::Int(5));

        let b = to_ref(&state, "b").with_default("fallback");
        assert_eq!(b.get(), Value::from("fallback"));

        let seen = Rc::new(Cell::new(0));
        let (field, sink) = (refs["a"].clone(), seen.clone());
        let _runner = effect(move || sink.set(field.get().as_int().unwrap_or(0)));
        state.set("a", 9);
        assert_eq!(seen.get(), 9);
    }
}
