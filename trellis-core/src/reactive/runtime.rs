//! Reactive Runtime
//!
//! The runtime owns the side table that connects observed fields to their
//! dependency sets.
//!
//! # How It Works
//!
//! 1. When a reactive field is read inside an effect, the runtime looks up
//!    (or creates) the dependency set for `(object, field)` and subscribes the
//!    effect to it.
//!
//! 2. When a reactive field is written, the runtime finds that set (if any)
//!    and notifies it.
//!
//! 3. When a set loses its last subscriber, its cleanup removes it from the
//!    table. When a raw object is dropped, every set for it is forgotten.
//!
//! # Thread Safety
//!
//! The table is thread-local: every thread owns an independent reactive
//! runtime and values never cross threads.

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::trace;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::ObjectId;

/// Which part of an object a dependency set observes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DepKey {
    /// One named field.
    Field(String),
    /// The set of keys (additions and removals).
    Iterate,
}

thread_local! {
    static TARGET_MAP: RefCell<HashMap<ObjectId, HashMap<DepKey, Dep>>> = RefCell::new(HashMap::new());
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Subscribe the active computation to `key` of `object`.
    pub(crate) fn track(object: ObjectId, key: DepKey) {
        let Some(effect) = ReactiveContext::current() else {
            return;
        };

        let dep = TARGET_MAP.with(|map| {
            let mut map = map.borrow_mut();
            let deps = map.entry(object).or_default();
            deps.entry(key.clone())
                .or_insert_with(|| {
                    Dep::with_cleanup(move || Self::release(object, &key))
                })
                .clone()
        });

        effect.track(&dep);
    }

    /// Notify everything subscribed to `key` of `object`.
    pub(crate) fn trigger(object: ObjectId, key: &DepKey) {
        let dep = TARGET_MAP.with(|map| {
            map.borrow()
                .get(&object)
                .and_then(|deps| deps.get(key))
                .cloned()
        });

        if let Some(dep) = dep {
            trace!(%object, ?key, subscribers = dep.len(), "trigger");
            dep.trigger();
        }
    }

    /// Drop every dependency set belonging to `object`.
    pub(crate) fn forget_object(object: ObjectId) {
        let removed = TARGET_MAP.try_with(|map| {
            map.try_borrow_mut()
                .ok()
                .and_then(|mut map| map.remove(&object))
        });
        drop(removed);
    }

    fn release(object: ObjectId, key: &DepKey) {
        let _ = TARGET_MAP.try_with(|map| {
            let Ok(mut map) = map.try_borrow_mut() else {
                return;
            };
            if let Some(deps) = map.get_mut(&object) {
                deps.remove(key);
                if deps.is_empty() {
                    map.remove(&object);
                }
            }
        });
    }

    /// Whether a computation is currently collecting dependencies.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Number of live dependency sets for `object`.
    pub fn dependency_count(object: ObjectId) -> usize {
        TARGET_MAP.with(|map| map.borrow().get(&object).map_or(0, HashMap::len))
    }

    /// Number of computations subscribed to field `key` of `object`.
    pub fn subscriber_count(object: ObjectId, key: &str) -> usize {
        TARGET_MAP.with(|map| {
            map.borrow()
                .get(&object)
                .and_then(|deps| deps.get(&DepKey::Field(key.to_owned())))
                .map_or(0, Dep::len)
        })
    }

    /// Whether any computation observes field `key` of `object`.
    pub fn has_dependency(object: ObjectId, key: &str) -> bool {
        Self::subscriber_count(object, key) > 0
    }
}
