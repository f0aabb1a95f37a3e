//! Reactive Primitives
//!
//! This module implements the reactive system: observable objects, refs,
//! effects, computeds and watchers. These primitives decide which
//! computations depend on which pieces of state, and re-run only those.
//!
//! # Concepts
//!
//! ## Reactive objects
//!
//! A [`ReactiveObject`] wraps a raw [`Object`]. Reading a field through the
//! wrapper inside a running effect subscribes that effect to the field;
//! writing a field notifies the subscribed effects.
//!
//! ## Refs
//!
//! A [`Ref`] is a single observable value.
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] is a computation that re-runs (or hands itself to a
//! scheduler) whenever something it read during its last run changes.
//! Dependencies are re-collected on every run, so a branch that stops reading
//! a field also stops being notified about it.
//!
//! ## Computeds
//!
//! A [`Computed`] is a lazily evaluated, cached derived value.
//!
//! # Implementation Notes
//!
//! The active computation lives on a thread-local stack (see
//! [`ReactiveContext`]). Dependency sets are kept in a thread-local side table
//! keyed by object identity (see [`Runtime`]); entries disappear when their
//! last subscriber leaves or the object is dropped.

mod computed;
mod context;
mod dep;
mod effect;
mod ids;
mod refs;
mod runtime;
mod store;
mod value;
mod watch;

pub use computed::Computed;
pub use context::{untrack, ReactiveContext};
pub use effect::{effect, ReactiveEffect};
pub use ids::{ObjectId, SubscriberId};
pub use refs::{to_ref, to_refs, ObjectRef, Ref};
pub use runtime::Runtime;
pub use store::{
    is_reactive, reactive, reactive_object, shallow_reactive, to_raw, to_reactive,
    ReactiveObject,
};
pub use value::{Handler, Object, Value};
pub use watch::{watch, watch_effect, OnCleanup, WatchHandle, WatchOptions, WatchSource};
