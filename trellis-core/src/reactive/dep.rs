//! Dependency Sets
//!
//! A dependency set is the subscriber list for one observed field (or for a
//! ref, or a computed value). Each subscription remembers the run generation
//! of the effect at which it was last confirmed; the effect uses that marker
//! after a run to tell which sets it no longer reads.
//!
//! Sets hold effects weakly. The owner of an effect (a handle, a component
//! instance, a watcher) keeps it alive; dropping the owner unsubscribes it.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::effect::EffectCore;
use super::SubscriberId;

struct Subscription {
    effect: Weak<EffectCore>,
    generation: u64,
}

struct DepInner {
    subscribers: RefCell<IndexMap<SubscriberId, Subscription>>,
    cleanup: RefCell<Option<Box<dyn FnOnce()>>>,
}

/// The set of computations subscribed to one observed value.
#[derive(Clone)]
pub(crate) struct Dep(Rc<DepInner>);

impl Dep {
    /// Create a set whose `cleanup` runs once, when its last subscriber leaves.
    pub(crate) fn with_cleanup(cleanup: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(DepInner {
            subscribers: RefCell::new(IndexMap::new()),
            cleanup: RefCell::new(Some(Box::new(cleanup))),
        }))
    }

    pub(crate) fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn has(&self, id: SubscriberId) -> bool {
        self.0.subscribers.borrow().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    /// Generation at which `id` last confirmed this set, if subscribed.
    pub(crate) fn generation_of(&self, id: SubscriberId) -> Option<u64> {
        self.0
            .subscribers
            .borrow()
            .get(&id)
            .map(|subscription| subscription.generation)
    }

    pub(crate) fn subscribe(&self, effect: &Rc<EffectCore>, generation: u64) {
        self.0.subscribers.borrow_mut().insert(
            effect.id(),
            Subscription {
                effect: Rc::downgrade(effect),
                generation,
            },
        );
    }

    pub(crate) fn confirm(&self, id: SubscriberId, generation: u64) {
        if let Some(subscription) = self.0.subscribers.borrow_mut().get_mut(&id) {
            subscription.generation = generation;
        }
    }

    /// Remove `id`; runs the cleanup callback if the set became empty.
    pub(crate) fn unsubscribe(&self, id: SubscriberId) {
        let now_empty = {
            let mut subscribers = self.0.subscribers.borrow_mut();
            subscribers.shift_remove(&id).is_some() && subscribers.is_empty()
        };

        if now_empty {
            let cleanup = self.0.cleanup.borrow_mut().take();
            if let Some(cleanup) = cleanup {
                cleanup();
            }
        }
    }

    /// Subscribe the active computation, if there is one.
    pub(crate) fn track(&self) {
        if let Some(effect) = ReactiveContext::current() {
            effect.track(self);
        }
    }

    /// Notify every live subscriber, in subscription order.
    pub(crate) fn trigger(&self) {
        let effects: SmallVec<[Rc<EffectCore>; 4]> = self
            .0
            .subscribers
            .borrow()
            .values()
            .filter_map(|subscription| subscription.effect.upgrade())
            .collect();

        for effect in effects {
            effect.trigger();
        }
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// A lazily created dependency set owned by a single value (refs, computeds).
///
/// The set exists only while something subscribes to it; once the last
/// subscriber leaves, the slot is emptied again.
#[derive(Default)]
pub(crate) struct InlineDep {
    slot: Rc<RefCell<Option<Dep>>>,
}

impl InlineDep {
    pub(crate) fn track(&self) {
        let Some(effect) = ReactiveContext::current() else {
            return;
        };

        let dep = {
            let mut slot = self.slot.borrow_mut();
            match slot.as_ref() {
                Some(dep) => dep.clone(),
                None => {
                    let weak_slot = Rc::downgrade(&self.slot);
                    let dep = Dep::with_cleanup(move || {
                        if let Some(slot) = weak_slot.upgrade() {
                            slot.borrow_mut().take();
                        }
                    });
                    *slot = Some(dep.clone());
                    dep
                }
            }
        };

        effect.track(&dep);
    }

    pub(crate) fn trigger(&self) {
        let dep = self.slot.borrow().clone();
        if let Some(dep) = dep {
            dep.trigger();
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.slot.borrow().as_ref().map_or(0, Dep::len)
    }
}
