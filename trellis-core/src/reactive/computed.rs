//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when read
//! after one of its dependencies changed.
//!
//! # How Computeds Work
//!
//! 1. The getter is wrapped in a lazy effect. The effect never re-runs on its
//!    own; its scheduler just marks the computed dirty and notifies whoever
//!    read the computed.
//!
//! 2. `get()` subscribes the running computation to the computed's own
//!    dependency set, then recomputes only if dirty.
//!
//! 3. A computed that is never read after a change does no work at all.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::dep::InlineDep;
use super::effect::ReactiveEffect;
use crate::error::{Error, Result};

struct ComputedInner<T: Clone + 'static> {
    effect: ReactiveEffect<T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    dep: InlineDep,
    setter: Option<Box<dyn Fn(T)>>,
}

impl<T: Clone + 'static> ComputedInner<T> {
    /// Scheduler of the inner effect.
    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            self.dep.trigger();
        }
    }
}

/// A cached derived value.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Computed, Ref};
///
/// let count = Ref::new(2);
/// let source = count.clone();
/// let doubled = Computed::new(move || source.get().as_int().unwrap_or(0) * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: Clone + 'static>(Rc<ComputedInner<T>>);

impl<T: Clone + 'static> Computed<T> {
    /// Create a read-only computed. The getter does not run until first read.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(getter, None)
    }

    /// Create a writable computed; `set` forwards to `setter`.
    pub fn with_setter<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        Self::build(getter, Some(Box::new(setter)))
    }

    fn build<F>(getter: F, setter: Option<Box<dyn Fn(T)>>) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self(Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            ComputedInner {
                effect: ReactiveEffect::with_scheduler(getter, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.invalidate();
                    }
                }),
                value: RefCell::new(None),
                dirty: Cell::new(true),
                dep: InlineDep::default(),
                setter,
            }
        }))
    }

    /// Read the value, recomputing it if a dependency changed since the last
    /// read.
    pub fn get(&self) -> T {
        self.0.dep.track();

        let cached = if self.0.dirty.get() {
            None
        } else {
            self.0.value.borrow().clone()
        };

        match cached {
            Some(value) => value,
            None => {
                let value = self.0.effect.run();
                self.0.dirty.set(false);
                *self.0.value.borrow_mut() = Some(value.clone());
                value
            }
        }
    }

    /// Write through the setter.
    pub fn set(&self, value: T) -> Result<()> {
        match &self.0.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => Err(Error::ReadonlyComputed),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn is_readonly(&self) -> bool {
        self.0.setter.is_none()
    }

    /// Number of times the getter has run.
    pub fn compute_count(&self) -> usize {
        self.0.effect.run_count()
    }

    /// Detach from all dependencies; the cached value is kept.
    pub fn stop(&self) {
        self.0.effect.stop();
    }
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &*self.0.value.borrow())
            .field("dirty", &self.0.dirty.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use crate::reactive::{effect, reactive_object, Object, Ref, Value};

    #[test]
    fn computed_is_lazy_and_cached() {
        let count = Ref::new(1);
        let source = count.clone();
        let doubled = Computed::new(move || source.get().as_int().unwrap_or(0) * 2);
        assert_eq!(doubled.compute_count(), 0);

        assert_eq!(doubled.get(), 2);
        assert_eq!(doubled.get(), 2);
        assert_eq!(doubled.compute_count(), 1);

        count.set(4);
        assert!(doubled.is_dirty());
        assert_eq!(doubled.compute_count(), 1);

        assert_eq!(doubled.get(), 8);
        assert_eq!(doubled.compute_count(), 2);
    }

    #[test]
    fn several_writes_one_recompute() {
        let state = reactive_object(&Object::new().with("a", 1).with("b", 2));
        let source = state.clone();
        let sum = Computed::new(move || {
            source.get("a").as_int().unwrap_or(0) + source.get("b").as_int().unwrap_or(0)
        });
        assert_eq!(sum.get(), 3);

        state.set("a", 10);
        state.set("b", 20);
        state.set("a", 100);
        assert_eq!(sum.get(), 120);
        assert_eq!(sum.compute_count(), 2);
    }

    #[test]
    fn effects_follow_computeds() {
        let count = Ref::new(1);
        let source = count.clone();
        let doubled = Computed::new(move || source.get().as_int().unwrap_or(0) * 2);

        let seen = Rc::new(Cell::new(0));
        let (reader, sink) = (doubled.clone(), seen.clone());
        let runner = effect(move || sink.set(reader.get()));
        assert_eq!(seen.get(), 2);

        count.set(3);
        assert_eq!(seen.get(), 6);
        assert_eq!(runner.run_count(), 2);
    }

    #[test]
    fn chained_computeds() {
        let base = Ref::new(1);
        let source = base.clone();
        let plus_one = Computed::new(move || source.get().as_int().unwrap_or(0) + 1);
        let inner = plus_one.clone();
        let times_ten = Computed::new(move || inner.get() * 10);

        assert_eq!(times_ten.get(), 20);
        base.set(4);
        assert_eq!(times_ten.get(), 50);
    }

    #[test]
    fn readonly_computed_rejects_writes() {
        let constant = Computed::new(|| 1);
        assert!(constant.is_readonly());
        assert!(matches!(constant.set(2), Err(Error::ReadonlyComputed)));
    }

    #[test]
    fn writable_computed_forwards_to_setter() {
        let celsius = Ref::new(0.0);
        let (read, write) = (celsius.clone(), celsius.clone());
        let fahrenheit = Computed::with_setter(
            move || read.get().as_float().unwrap_or(0.0) * 9.0 / 5.0 + 32.0,
            move |f: f64| write.set(Value::Float((f - 32.0) * 5.0 / 9.0)),
        );

        assert_eq!(fahrenheit.get(), 32.0);
        fahrenheit.set(212.0).unwrap();
        assert_eq!(celsius.get(), Value::Float(100.0));
        assert_eq!(fahrenheit.get(), 212.0);
    }
}
