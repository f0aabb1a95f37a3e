//! Trellis Core
//!
//! This crate provides the runtime of the Trellis UI framework. It implements:
//!
//! - Fine-grained reactivity (reactive objects, refs, computed values,
//!   effects and watchers)
//! - A deduplicating job queue that batches re-renders
//! - A descriptor tree and a keyed reconciler that patches a host tree with
//!   the fewest moves
//! - Stateful components with props, attrs, data, setup and events
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive state and automatic dependency tracking
//! - `scheduler`: Job queue flushed once per turn
//! - `vnode`: Descriptor nodes, props and keys
//! - `host`: The adapter trait the reconciler drives, plus an in-memory host
//! - `component`: Component definitions and instances
//! - `renderer`: Mounting, patching and the keyed children diff
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use trellis_core::component::ComponentDef;
//! use trellis_core::host::MemoryHost;
//! use trellis_core::reactive::Object;
//! use trellis_core::renderer::Renderer;
//! use trellis_core::scheduler::flush_jobs;
//! use trellis_core::vnode::{h, Props};
//!
//! let counter = ComponentDef::new("Counter")
//!     .data(|| Object::new().with("count", 0))
//!     .render(|ctx| h("span", Props::new(), ctx.get("count").to_string()))
//!     .build();
//!
//! let host = Rc::new(MemoryHost::new());
//! let root = host.create_root();
//! let renderer = Renderer::new(Rc::clone(&host));
//! renderer.render(Some(h(&counter, Props::new(), ())), root)?;
//! assert_eq!(host.serialize(root), "<span>0</span>");
//!
//! // Writes are batched until the queue is flushed.
//! let instance = renderer.root(root).and_then(|vnode| vnode.component()).unwrap();
//! instance.data().unwrap().set("count", 1);
//! instance.data().unwrap().set("count", 2);
//! assert_eq!(flush_jobs(), 1);
//! assert_eq!(host.serialize(root), "<span>2</span>");
//! # Ok::<(), trellis_core::Error>(())
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod host;
pub mod reactive;
pub mod renderer;
pub mod scheduler;
pub mod vnode;

pub use config::{DuplicateKeyPolicy, RendererConfig};
pub use error::{Error, Result};
