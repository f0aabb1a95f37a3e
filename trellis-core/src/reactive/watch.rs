//! Watchers
//!
//! A watcher runs a callback with `(new, old)` whenever its source changes.
//! Sources are getters, reactive objects (traversed field by field) or refs.
//! Watchers flush synchronously: the callback runs inside the write that
//! changed the source.
//!
//! Callbacks run untracked, so reads inside a callback never subscribe the
//! watcher to anything.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::untrack;
use super::effect::ReactiveEffect;
use super::refs::Ref;
use super::store::ReactiveObject;
use super::value::Value;
use super::ObjectId;

/// What a watcher observes.
#[derive(Clone)]
pub enum WatchSource {
    Getter(Rc<dyn Fn() -> Value>),
    Reactive(ReactiveObject),
    Ref(Ref),
}

impl WatchSource {
    pub fn getter(f: impl Fn() -> Value + 'static) -> Self {
        WatchSource::Getter(Rc::new(f))
    }
}

impl From<ReactiveObject> for WatchSource {
    fn from(object: ReactiveObject) -> Self {
        WatchSource::Reactive(object)
    }
}

impl From<Ref> for WatchSource {
    fn from(r: Ref) -> Self {
        WatchSource::Ref(r)
    }
}

impl fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSource::Getter(_) => f.write_str("Getter"),
            WatchSource::Reactive(object) => f.debug_tuple("Reactive").field(object).finish(),
            WatchSource::Ref(r) => f.debug_tuple("Ref").field(r).finish(),
        }
    }
}

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Run the callback once right away, with a null old value.
    pub immediate: bool,
    /// Traverse the source value this many levels deep and fire on any nested
    /// change. Reactive-object sources are always traversed (fully, unless a
    /// depth is given).
    pub deep: Option<usize>,
}

impl WatchOptions {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    pub fn deep() -> Self {
        Self {
            deep: Some(usize::MAX),
            ..Self::default()
        }
    }
}

/// Registers a cleanup to run before the next callback and on stop.
#[derive(Clone, Default)]
pub struct OnCleanup(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl OnCleanup {
    /// Replace the pending cleanup with `f`.
    pub fn register(&self, f: impl FnOnce() + 'static) {
        *self.0.borrow_mut() = Some(Box::new(f));
    }

    fn run(&self) {
        let pending = self.0.borrow_mut().take();
        if let Some(cleanup) = pending {
            cleanup();
        }
    }
}

type Callback = Box<dyn FnMut(&Value, &Value, &OnCleanup)>;

struct WatchState {
    effect: RefCell<Option<ReactiveEffect<Value>>>,
    old: RefCell<Value>,
    callback: RefCell<Callback>,
    cleanup: OnCleanup,
    force: bool,
}

impl WatchState {
    fn job(&self) {
        let Some(effect) = self.effect.borrow().clone() else {
            return;
        };
        if !effect.is_active() {
            return;
        }

        let new = effect.run();
        if !self.force && new.same(&self.old.borrow()) {
            return;
        }

        self.cleanup.run();
        let old = self.old.replace(new.clone());
        untrack(|| {
            // A callback that writes its own source does not recurse.
            if let Ok(mut callback) = self.callback.try_borrow_mut() {
                callback(&new, &old, &self.cleanup);
            }
        });
    }
}

/// Handle to a running watcher. Dropping it stops the watcher.
#[must_use = "dropping the handle stops the watcher"]
pub struct WatchHandle {
    effect: ReactiveEffect<Value>,
    cleanup: OnCleanup,
    _state: Option<Rc<WatchState>>,
}

impl WatchHandle {
    /// Dispose the watcher and run any pending cleanup.
    pub fn stop(&self) {
        if self.effect.is_active() {
            self.effect.stop();
            self.cleanup.run();
        }
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }

    /// Hold source changes until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.effect.pause();
    }

    pub fn resume(&self) {
        self.effect.resume();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("effect", &self.effect)
            .finish()
    }
}

/// Call `callback(new, old, on_cleanup)` whenever `source` changes.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use trellis_core::reactive::{watch, Ref, Value, WatchOptions};
///
/// let count = Ref::new(0);
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let sink = log.clone();
///
/// let _handle = watch(count.clone(), move |new, old, _| {
///     sink.borrow_mut().push((new.clone(), old.clone()));
/// }, WatchOptions::default());
///
/// count.set(1);
/// assert_eq!(*log.borrow(), vec![(Value::Int(1), Value::Int(0))]);
/// ```
pub fn watch<F>(source: impl Into<WatchSource>, callback: F, options: WatchOptions) -> WatchHandle
where
    F: FnMut(&Value, &Value, &OnCleanup) + 'static,
{
    let (getter, force): (Rc<dyn Fn() -> Value>, bool) = match source.into() {
        WatchSource::Reactive(object) => {
            let depth = options.deep.unwrap_or(usize::MAX);
            let getter: Rc<dyn Fn() -> Value> = Rc::new(move || {
                let value = Value::Reactive(object.clone());
                traverse(&value, depth, &mut HashSet::new());
                value
            });
            (getter, true)
        }
        WatchSource::Ref(r) => {
            let getter: Rc<dyn Fn() -> Value> = Rc::new(move || r.get());
            (getter, false)
        }
        WatchSource::Getter(f) => (f, false),
    };

    let (getter, force): (Rc<dyn Fn() -> Value>, bool) = match options.deep {
        Some(depth) if !force => {
            let deep: Rc<dyn Fn() -> Value> = Rc::new(move || {
                let value = getter();
                traverse(&value, depth, &mut HashSet::new());
                value
            });
            (deep, true)
        }
        _ => (getter, force),
    };

    let cleanup = OnCleanup::default();
    let state = Rc::new(WatchState {
        effect: RefCell::new(None),
        old: RefCell::new(Value::Null),
        callback: RefCell::new(Box::new(callback)),
        cleanup: cleanup.clone(),
        force,
    });

    let weak: Weak<WatchState> = Rc::downgrade(&state);
    let effect = ReactiveEffect::with_scheduler(
        move || getter(),
        move || {
            if let Some(state) = weak.upgrade() {
                state.job();
            }
        },
    );
    *state.effect.borrow_mut() = Some(effect.clone());

    if options.immediate {
        state.job();
    } else {
        *state.old.borrow_mut() = effect.run();
    }

    WatchHandle {
        effect,
        cleanup,
        _state: Some(state),
    }
}

/// Run `f` now and again whenever anything it reads changes.
///
/// The cleanup registered through the [`OnCleanup`] argument runs before each
/// re-run and when the watcher stops.
pub fn watch_effect<F>(f: F) -> WatchHandle
where
    F: Fn(&OnCleanup) + 'static,
{
    let cleanup = OnCleanup::default();
    let registrar = cleanup.clone();
    let effect = ReactiveEffect::new(move || {
        registrar.run();
        f(&registrar);
        Value::Null
    });
    effect.run();

    WatchHandle {
        effect,
        cleanup,
        _state: None,
    }
}

/// Read every field reachable from `value`, up to `depth` levels, so the
/// running computation subscribes to all of them.
fn traverse(value: &Value, depth: usize, seen: &mut HashSet<ObjectId>) {
    if depth == 0 {
        return;
    }

    match value {
        Value::Reactive(object) => {
            if !seen.insert(object.id()) {
                return;
            }
            for key in object.keys() {
                traverse(&object.get(&key), depth - 1, seen);
            }
        }
        Value::List(items) => {
            for item in items.iter() {
                traverse(item, depth - 1, seen);
            }
        }
        _ => {}
    }
}
