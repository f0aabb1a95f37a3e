//! Effect Implementation
//!
//! An Effect is a re-runnable unit of work whose reads are tracked.
//!
//! # How Effects Work
//!
//! 1. `run()` makes the effect the active computation and bumps its run
//!    generation.
//!
//! 2. Every dependency set read during the run is subscribed (first read) or
//!    re-confirmed at the new generation (already held).
//!
//! 3. After the body returns, every held set whose marker is older than the
//!    current generation was not read this time; the effect leaves it, and a
//!    set left empty runs its cleanup.
//!
//! 4. When a held set notifies, the effect calls its scheduler if it has one,
//!    otherwise re-runs synchronously. An effect that is already running is
//!    never re-triggered, so reading and writing the same field in one body
//!    does not recurse.
//!
//! # Ownership
//!
//! Dependency sets only hold effects weakly. Dropping the last
//! [`ReactiveEffect`] handle unsubscribes the effect from everything.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::SubscriberId;

struct EffectState {
    active: bool,
    paused: bool,
    pending_trigger: bool,
    dirty: bool,
    generation: u64,
    running: u32,
    runs: usize,
    deps: SmallVec<[Dep; 4]>,
}

/// The type-erased part of an effect that dependency sets point at.
pub(crate) struct EffectCore {
    id: SubscriberId,
    scheduler: Option<Box<dyn Fn()>>,
    rerun: Box<dyn Fn()>,
    state: RefCell<EffectState>,
}

impl EffectCore {
    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    /// Record that the running effect read `dep`.
    pub(crate) fn track(self: &Rc<Self>, dep: &Dep) {
        let generation = self.state.borrow().generation;

        match dep.generation_of(self.id) {
            Some(seen) if seen == generation => {}
            Some(_) => dep.confirm(self.id, generation),
            None => {
                dep.subscribe(self, generation);
                self.state.borrow_mut().deps.push(dep.clone());
            }
        }
    }

    /// React to a notification from one of the held dependency sets.
    pub(crate) fn trigger(self: &Rc<Self>) {
        {
            let mut state = self.state.borrow_mut();
            if !state.active || state.running > 0 {
                return;
            }
            state.dirty = true;
            if state.paused {
                state.pending_trigger = true;
                return;
            }
        }

        trace!(effect = %self.id, "effect triggered");
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => (self.rerun)(),
        }
    }

    fn run_with<T>(self: &Rc<Self>, f: &dyn Fn() -> T) -> T {
        let active = {
            let mut state = self.state.borrow_mut();
            state.dirty = false;
            state.runs += 1;
            state.active
        };
        if !active {
            return f();
        }

        let _context = ReactiveContext::enter(Rc::clone(self));
        let _run = RunGuard::begin(self);
        f()
    }

    /// Leave every dependency set not confirmed during the last run.
    fn release_stale(&self) {
        let stale: SmallVec<[Dep; 4]> = {
            let mut state = self.state.borrow_mut();
            let generation = state.generation;
            let (kept, stale) = state
                .deps
                .drain(..)
                .partition(|dep| dep.generation_of(self.id) == Some(generation));
            state.deps = kept;
            stale
        };

        for dep in stale {
            dep.unsubscribe(self.id);
        }
    }

    fn release_all(&self) {
        let deps = std::mem::take(&mut self.state.borrow_mut().deps);
        for dep in deps {
            dep.unsubscribe(self.id);
        }
    }
}

impl Drop for EffectCore {
    fn drop(&mut self) {
        for dep in self.state.get_mut().deps.drain(..) {
            dep.unsubscribe(self.id);
        }
    }
}

/// Brackets one tracked run: bumps the generation on entry, releases stale
/// dependencies on every exit path.
struct RunGuard<'a> {
    effect: &'a EffectCore,
}

impl<'a> RunGuard<'a> {
    fn begin(effect: &'a EffectCore) -> Self {
        let mut state = effect.state.borrow_mut();
        state.running += 1;
        state.generation += 1;
        drop(state);
        Self { effect }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.effect.state.borrow_mut().running -= 1;
        self.effect.release_stale();
    }
}

/// A re-runnable computation with automatic dependency tracking.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{effect, reactive_object, Object};
///
/// let state = reactive_object(&Object::new());
/// state.set("count", 1);
///
/// let seen = state.clone();
/// let runner = effect(move || {
///     let _ = seen.get("count");
/// });
/// assert_eq!(runner.run_count(), 1);
///
/// state.set("count", 2); // re-runs synchronously
/// assert_eq!(runner.run_count(), 2);
/// ```
pub struct ReactiveEffect<T: 'static> {
    core: Rc<EffectCore>,
    f: Rc<dyn Fn() -> T>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect that re-runs synchronously when triggered.
    ///
    /// The effect does not run until [`run`](Self::run) is called.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(Rc::new(f), None)
    }

    /// Create an effect that calls `scheduler` instead of re-running when
    /// triggered.
    pub fn with_scheduler<F, S>(f: F, scheduler: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn() + 'static,
    {
        Self::build(Rc::new(f), Some(Box::new(scheduler)))
    }

    fn build(f: Rc<dyn Fn() -> T>, scheduler: Option<Box<dyn Fn()>>) -> Self {
        let body = Rc::clone(&f);
        let core = Rc::new_cyclic(|weak: &Weak<EffectCore>| {
            let weak = weak.clone();
            EffectCore {
                id: SubscriberId::next(),
                scheduler,
                rerun: Box::new(move || {
                    if let Some(core) = weak.upgrade() {
                        core.run_with(&*body);
                    }
                }),
                state: RefCell::new(EffectState {
                    active: true,
                    paused: false,
                    pending_trigger: false,
                    dirty: true,
                    generation: 0,
                    running: 0,
                    runs: 0,
                    deps: SmallVec::new(),
                }),
            }
        });

        Self { core, f }
    }

    /// Run the work function, collecting dependencies.
    ///
    /// A stopped effect still runs its function, but tracks nothing.
    pub fn run(&self) -> T {
        trace!(effect = %self.core.id, "effect run");
        self.core.run_with(&*self.f)
    }

    /// Unsubscribe from every dependency and deactivate permanently.
    pub fn stop(&self) {
        let was_active = std::mem::replace(&mut self.core.state.borrow_mut().active, false);
        if was_active {
            self.core.release_all();
        }
    }

    /// Hold triggers until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.core.state.borrow_mut().paused = true;
    }

    /// Stop holding triggers; replays one trigger if any arrived while paused.
    pub fn resume(&self) {
        let replay = {
            let mut state = self.core.state.borrow_mut();
            state.paused = false;
            std::mem::take(&mut state.pending_trigger)
        };
        if replay {
            self.core.trigger();
        }
    }

    /// The effect's identity.
    pub fn id(&self) -> SubscriberId {
        self.core.id
    }

    /// Whether the effect is still subscribed (has not been stopped).
    pub fn is_active(&self) -> bool {
        self.core.state.borrow().active
    }

    /// Whether a dependency changed since the last run.
    pub fn is_dirty(&self) -> bool {
        self.core.state.borrow().dirty
    }

    /// Whether the effect body is executing right now.
    pub fn is_running(&self) -> bool {
        self.core.state.borrow().running > 0
    }

    /// Whether triggers are currently held.
    pub fn is_paused(&self) -> bool {
        self.core.state.borrow().paused
    }

    /// Number of times the work function has been invoked.
    pub fn run_count(&self) -> usize {
        self.core.state.borrow().runs
    }

    /// Number of dependency sets currently held.
    pub fn dependency_count(&self) -> usize {
        self.core.state.borrow().deps.len()
    }

    pub(crate) fn core(&self) -> Rc<EffectCore> {
        Rc::clone(&self.core)
    }
}

impl<T: 'static> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
            f: Rc::clone(&self.f),
        }
    }
}

impl<T: 'static> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.core.id)
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Create an effect and run it once immediately.
#[must_use = "dropping the returned effect unsubscribes it"]
pub fn effect<F>(f: F) -> ReactiveEffect<()>
where
    F: Fn() + 'static,
{
    let effect = ReactiveEffect::new(f);
    effect.run();
    effect
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};

    use crate::reactive::{reactive_object, Object, Value};

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (runs, inner) = counter();
        let _effect = effect(move || inner.set(inner.get() + 1));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn new_effect_is_lazy() {
        let (runs, inner) = counter();
        let effect = ReactiveEffect::new(move || inner.set(inner.get() + 1));
        assert_eq!(runs.get(), 0);
        assert!(effect.is_dirty());

        effect.run();
        assert_eq!(runs.get(), 1);
        assert!(!effect.is_dirty());
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let state = reactive_object(&Object::new());
        state.set("count", 0);

        let seen = Rc::new(Cell::new(-1));
        let (source, sink) = (state.clone(), seen.clone());
        let _effect = effect(move || sink.set(source.get("count").as_int().unwrap_or(-1)));
        assert_eq!(seen.get(), 0);

        state.set("count", 5);
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn conditional_reads_are_dropped() {
        let state = reactive_object(&Object::new());
        state.set("flag", true);
        state.set("a", 1);
        state.set("b", 2);

        let (runs, inner) = counter();
        let source = state.clone();
        let effect = effect(move || {
            inner.set(inner.get() + 1);
            if source.get("flag").as_bool() == Some(true) {
                let _ = source.get("a");
            } else {
                let _ = source.get("b");
            }
        });
        assert_eq!(effect.dependency_count(), 2);

        state.set("b", 20);
        assert_eq!(runs.get(), 1);

        state.set("flag", false);
        assert_eq!(runs.get(), 2);

        state.set("a", 10);
        assert_eq!(runs.get(), 2);

        state.set("b", 30);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn effect_does_not_retrigger_itself() {
        let state = reactive_object(&Object::new());
        state.set("count", 0);

        let (runs, inner) = counter();
        let source = state.clone();
        let _effect = effect(move || {
            inner.set(inner.get() + 1);
            let next = source.get("count").as_int().unwrap_or(0) + 1;
            source.set("count", next);
        });

        assert_eq!(runs.get(), 1);
        assert_eq!(state.get_untracked("count"), Value::Int(1));
    }

    #[test]
    fn own_writes_leave_the_effect_clean() {
        let state = reactive_object(&Object::new());
        state.set("count", 0);

        let (scheduled, flag) = counter();
        let source = state.clone();
        let effect = ReactiveEffect::with_scheduler(
            move || {
                let next = source.get("count").as_int().unwrap_or(0) + 1;
                source.set("count", next);
            },
            move || flag.set(flag.get() + 1),
        );
        effect.run();

        assert!(!effect.is_dirty());
        assert_eq!(scheduled.get(), 0);
    }

    #[test]
    fn scheduler_replaces_rerun() {
        let state = reactive_object(&Object::new());
        state.set("count", 0);

        let (runs, inner) = counter();
        let (scheduled, flag) = counter();
        let source = state.clone();
        let effect = ReactiveEffect::with_scheduler(
            move || {
                inner.set(inner.get() + 1);
                let _ = source.get("count");
            },
            move || flag.set(flag.get() + 1),
        );
        effect.run();

        state.set("count", 1);
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 1);
        assert!(effect.is_dirty());
    }

    #[test]
    fn stopped_effect_ignores_triggers() {
        let state = reactive_object(&Object::new());
        state.set("count", 0);

        let (runs, inner) = counter();
        let source = state.clone();
        let effect = effect(move || {
            inner.set(inner.get() + 1);
            let _ = source.get("count");
        });

        effect.stop();
        assert!(!effect.is_active());
        assert_eq!(effect.dependency_count(), 0);

        state.set("count", 1);
        assert_eq!(runs.get(), 1);

        // Still callable by hand, untracked.
        effect.run();
        assert_eq!(runs.get(), 2);
        assert_eq!(effect.dependency_count(), 0);
    }

    #[test]
    fn paused_effect_replays_once_on_resume() {
        let state = reactive_object(&Object::new());
        state.set("count", 0);

        let (runs, inner) = counter();
        let source = state.clone();
        let effect = effect(move || {
            inner.set(inner.get() + 1);
            let _ = source.get("count");
        });

        effect.pause();
        state.set("count", 1);
        state.set("count", 2);
        assert_eq!(runs.get(), 1);

        effect.resume();
        assert_eq!(runs.get(), 2);

        effect.resume();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn panic_restores_active_computation() {
        let outer = ReactiveEffect::new(|| ());
        let _ctx = ReactiveContext::enter(outer.core());

        let failing = ReactiveEffect::new(|| panic!("boom"));
        let result = panic::catch_unwind(AssertUnwindSafe(|| failing.run()));
        assert!(result.is_err());

        assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));
        assert!(!failing.is_running());
    }

    #[test]
    fn dropping_effect_unsubscribes() {
        let state = reactive_object(&Object::new());
        state.set("count", 0);

        let (runs, inner) = counter();
        let source = state.clone();
        let effect = effect(move || {
            inner.set(inner.get() + 1);
            let _ = source.get("count");
        });
        drop(effect);

        state.set("count", 1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = effect(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.stop();
        assert!(!effect2.is_active());
    }
}
