//! Host Adapter
//!
//! The reconciler never touches a concrete render surface. Every mutation
//! goes through a [`HostAdapter`], which owns the real nodes and hands out
//! opaque [`HostNode`] handles for them.
//!
//! [`MemoryHost`] is an in-memory adapter that records every call; it backs
//! the tests and benchmarks and is a reference for writing real adapters.

mod memory;

use std::fmt;

use crate::reactive::Value;

pub use memory::{HostOp, MemoryHost};

/// Opaque handle to a node owned by a [`HostAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostNode(u64);

impl HostNode {
    /// Wrap an adapter-defined identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Operations the reconciler needs from a render surface.
///
/// Methods take `&self`; adapters use interior mutability. Calls are made
/// from a single thread and may re-enter the adapter from event handlers.
pub trait HostAdapter {
    /// Create a detached element.
    fn create_element(&self, tag: &str) -> HostNode;

    /// Create a detached text node.
    fn create_text(&self, content: &str) -> HostNode;

    /// Replace the content of a text node.
    fn set_text(&self, node: HostNode, content: &str);

    /// Replace all children of an element with the given text.
    fn set_element_text(&self, node: HostNode, content: &str);

    /// Insert `child` into `parent` before `anchor` (at the end when `None`).
    /// A child that is already attached somewhere is moved.
    fn insert(&self, child: HostNode, parent: HostNode, anchor: Option<HostNode>);

    /// Detach `node` from its parent.
    fn remove(&self, node: HostNode);

    /// Apply a property change; `None` means absent.
    fn patch_prop(&self, node: HostNode, key: &str, old: Option<&Value>, new: Option<&Value>);

    fn parent_of(&self, node: HostNode) -> Option<HostNode>;

    fn next_sibling_of(&self, node: HostNode) -> Option<HostNode>;
}

impl<A: HostAdapter + ?Sized> HostAdapter for std::rc::Rc<A> {
    fn create_element(&self, tag: &str) -> HostNode {
        (**self).create_element(tag)
    }

    fn create_text(&self, content: &str) -> HostNode {
        (**self).create_text(content)
    }

    fn set_text(&self, node: HostNode, content: &str) {
        (**self).set_text(node, content)
    }

    fn set_element_text(&self, node: HostNode, content: &str) {
        (**self).set_element_text(node, content)
    }

    fn insert(&self, child: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        (**self).insert(child, parent, anchor)
    }

    fn remove(&self, node: HostNode) {
        (**self).remove(node)
    }

    fn patch_prop(&self, node: HostNode, key: &str, old: Option<&Value>, new: Option<&Value>) {
        (**self).patch_prop(node, key, old, new)
    }

    fn parent_of(&self, node: HostNode) -> Option<HostNode> {
        (**self).parent_of(node)
    }

    fn next_sibling_of(&self, node: HostNode) -> Option<HostNode> {
        (**self).next_sibling_of(node)
    }
}
