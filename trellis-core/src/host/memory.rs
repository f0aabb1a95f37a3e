//! In-memory host.
//!
//! Keeps an arena of nodes, records every adapter call as a [`HostOp`] and
//! renders any subtree to an HTML-like string.

use std::cell::RefCell;
use std::fmt::Write as _;

use indexmap::IndexMap;

use super::{HostAdapter, HostNode};
use crate::reactive::{Handler, Value};
use crate::vnode::handler_key;

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement {
        node: HostNode,
        tag: String,
    },
    CreateText {
        node: HostNode,
        content: String,
    },
    SetText {
        node: HostNode,
        content: String,
    },
    SetElementText {
        node: HostNode,
        content: String,
    },
    Insert {
        node: HostNode,
        parent: HostNode,
        anchor: Option<HostNode>,
        /// The node was already attached, so this insert is a move.
        moved: bool,
    },
    Remove {
        node: HostNode,
    },
    PatchProp {
        node: HostNode,
        key: String,
        old: Option<Value>,
        new: Option<Value>,
    },
}

impl HostOp {
    pub fn is_create(&self) -> bool {
        matches!(self, HostOp::CreateElement { .. } | HostOp::CreateText { .. })
    }

    pub fn is_move(&self) -> bool {
        matches!(self, HostOp::Insert { moved: true, .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, HostOp::Remove { .. })
    }
}

#[derive(Debug)]
enum NodeKind {
    Root,
    Element {
        tag: String,
        props: IndexMap<String, Value>,
        text: String,
    },
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
}

#[derive(Default)]
struct Arena {
    nodes: Vec<NodeData>,
    ops: Vec<HostOp>,
}

impl Arena {
    fn alloc(&mut self, kind: NodeKind) -> HostNode {
        let node = HostNode::new(self.nodes.len() as u64);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        node
    }

    fn get(&self, node: HostNode) -> Option<&NodeData> {
        self.nodes.get(node.raw() as usize)
    }

    fn get_mut(&mut self, node: HostNode) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.raw() as usize)
    }

    fn detach(&mut self, node: HostNode) -> bool {
        let Some(parent) = self.get_mut(node).and_then(|data| data.parent.take()) else {
            return false;
        };
        if let Some(parent) = self.get_mut(parent) {
            parent.children.retain(|child| *child != node);
        }
        true
    }
}

/// An in-memory [`HostAdapter`].
#[derive(Default)]
pub struct MemoryHost {
    arena: RefCell<Arena>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container to render into.
    pub fn create_root(&self) -> HostNode {
        self.arena.borrow_mut().alloc(NodeKind::Root)
    }

    /// Every call recorded so far.
    pub fn ops(&self) -> Vec<HostOp> {
        self.arena.borrow().ops.clone()
    }

    /// Drain the recorded calls.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.arena.borrow_mut().ops)
    }

    pub fn children_of(&self, node: HostNode) -> Vec<HostNode> {
        self.arena
            .borrow()
            .get(node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    /// Tag of an element node.
    pub fn tag_of(&self, node: HostNode) -> Option<String> {
        match &self.arena.borrow().get(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    /// Current value of a property on an element node.
    pub fn prop_of(&self, node: HostNode, key: &str) -> Option<Value> {
        match &self.arena.borrow().get(node)?.kind {
            NodeKind::Element { props, .. } => props.get(key).cloned(),
            _ => None,
        }
    }

    /// Text content of a subtree.
    pub fn text_of(&self, node: HostNode) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        collect_text(&arena, node, &mut out);
        out
    }

    /// Render the children of `node` (or the node itself, for non-roots) as
    /// markup.
    pub fn serialize(&self, node: HostNode) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        write_node(&arena, node, &mut out);
        out
    }

    /// Call the handler stored for `event` on `node`. Returns whether one was
    /// found.
    pub fn dispatch(&self, node: HostNode, event: &str, args: &[Value]) -> bool {
        let handler: Option<Handler> = self
            .prop_of(node, &handler_key(event))
            .and_then(|value| value.as_handler().cloned());

        match handler {
            Some(handler) => {
                handler.call(args);
                true
            }
            None => false,
        }
    }

    /// Find the first element with the given tag under `root`, depth first.
    pub fn find(&self, root: HostNode, tag: &str) -> Option<HostNode> {
        let arena = self.arena.borrow();
        find_tag(&arena, root, tag)
    }

    fn record(&self, op: HostOp) {
        self.arena.borrow_mut().ops.push(op);
    }
}

fn collect_text(arena: &Arena, node: HostNode, out: &mut String) {
    let Some(data) = arena.get(node) else {
        return;
    };
    match &data.kind {
        NodeKind::Text(content) => out.push_str(content),
        NodeKind::Element { text, .. } => out.push_str(text),
        NodeKind::Root => {}
    }
    for child in &data.children {
        collect_text(arena, *child, out);
    }
}

fn find_tag(arena: &Arena, node: HostNode, wanted: &str) -> Option<HostNode> {
    let data = arena.get(node)?;
    if let NodeKind::Element { tag, .. } = &data.kind {
        if tag == wanted {
            return Some(node);
        }
    }
    data.children
        .iter()
        .find_map(|child| find_tag(arena, *child, wanted))
}

fn write_node(arena: &Arena, node: HostNode, out: &mut String) {
    let Some(data) = arena.get(node) else {
        return;
    };

    match &data.kind {
        NodeKind::Root => {
            for child in &data.children {
                write_node(arena, *child, out);
            }
        }
        NodeKind::Text(content) => out.push_str(content),
        NodeKind::Element { tag, props, text } => {
            let _ = write!(out, "<{tag}");
            for (key, value) in props {
                if matches!(value, Value::Handler(_)) {
                    continue;
                }
                let _ = write!(out, " {key}=\"{value}\"");
            }
            out.push('>');
            out.push_str(text);
            for child in &data.children {
                write_node(arena, *child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

impl HostAdapter for MemoryHost {
    fn create_element(&self, tag: &str) -> HostNode {
        let node = self.arena.borrow_mut().alloc(NodeKind::Element {
            tag: tag.to_owned(),
            props: IndexMap::new(),
            text: String::new(),
        });
        self.record(HostOp::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        node
    }

    fn create_text(&self, content: &str) -> HostNode {
        let node = self
            .arena
            .borrow_mut()
            .alloc(NodeKind::Text(content.to_owned()));
        self.record(HostOp::CreateText {
            node,
            content: content.to_owned(),
        });
        node
    }

    fn set_text(&self, node: HostNode, content: &str) {
        if let Some(NodeData {
            kind: NodeKind::Text(current),
            ..
        }) = self.arena.borrow_mut().get_mut(node)
        {
            *current = content.to_owned();
        }
        self.record(HostOp::SetText {
            node,
            content: content.to_owned(),
        });
    }

    fn set_element_text(&self, node: HostNode, content: &str) {
        {
            let mut arena = self.arena.borrow_mut();
            let children = arena
                .get_mut(node)
                .map(|data| std::mem::take(&mut data.children))
                .unwrap_or_default();
            for child in children {
                if let Some(data) = arena.get_mut(child) {
                    data.parent = None;
                }
            }
            if let Some(NodeData {
                kind: NodeKind::Element { text, .. },
                ..
            }) = arena.get_mut(node)
            {
                *text = content.to_owned();
            }
        }
        self.record(HostOp::SetElementText {
            node,
            content: content.to_owned(),
        });
    }

    fn insert(&self, child: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        // Inserting a node before itself leaves it where it is.
        let anchor = match anchor {
            Some(anchor) if anchor == child => self.next_sibling_of(child),
            other => other,
        };

        let moved = {
            let mut arena = self.arena.borrow_mut();
            let moved = arena.detach(child);

            if let Some(data) = arena.get_mut(parent) {
                let position = anchor
                    .and_then(|anchor| data.children.iter().position(|c| *c == anchor))
                    .unwrap_or(data.children.len());
                data.children.insert(position, child);
            }
            if let Some(data) = arena.get_mut(child) {
                data.parent = Some(parent);
            }
            moved
        };

        self.record(HostOp::Insert {
            node: child,
            parent,
            anchor,
            moved,
        });
    }

    fn remove(&self, node: HostNode) {
        self.arena.borrow_mut().detach(node);
        self.record(HostOp::Remove { node });
    }

    fn patch_prop(&self, node: HostNode, key: &str, old: Option<&Value>, new: Option<&Value>) {
        if let Some(NodeData {
            kind: NodeKind::Element { props, .. },
            ..
        }) = self.arena.borrow_mut().get_mut(node)
        {
            match new {
                Some(value) => {
                    props.insert(key.to_owned(), value.clone());
                }
                None => {
                    props.shift_remove(key);
                }
            }
        }
        self.record(HostOp::PatchProp {
            node,
            key: key.to_owned(),
            old: old.cloned(),
            new: new.cloned(),
        });
    }

    fn parent_of(&self, node: HostNode) -> Option<HostNode> {
        self.arena.borrow().get(node)?.parent
    }

    fn next_sibling_of(&self, node: HostNode) -> Option<HostNode> {
        let arena = self.arena.borrow();
        let parent = arena.get(node)?.parent?;
        let siblings = &arena.get(parent)?.children;
        let position = siblings.iter().position(|c| *c == node)?;
        siblings.get(position + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_serializes_a_tree() {
        let host = MemoryHost::new();
        let root = host.create_root();

        let list = host.create_element("ul");
        host.patch_prop(list, "class", None, Some(&Value::from("items")));
        let b = host.create_text("b");
        let a = host.create_text("a");
        host.insert(list, root, None);
        host.insert(b, list, None);
        host.insert(a, list, Some(b));

        assert_eq!(host.serialize(root), r#"<ul class="items">ab</ul>"#);
        assert_eq!(host.next_sibling_of(a), Some(b));
        assert_eq!(host.parent_of(a), Some(list));
        assert_eq!(host.find(root, "ul"), Some(list));
    }

    #[test]
    fn reinserting_is_recorded_as_a_move() {
        let host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_text("a");
        let b = host.create_text("b");
        host.insert(a, root, None);
        host.insert(b, root, None);
        host.take_ops();

        host.insert(b, root, Some(a));
        let ops = host.take_ops();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].is_move());
        assert_eq!(host.serialize(root), "ba");
    }

    #[test]
    fn element_text_replaces_children() {
        let host = MemoryHost::new();
        let root = host.create_root();
        let p = host.create_element("p");
        let child = host.create_text("old");
        host.insert(p, root, None);
        host.insert(child, p, None);

        host.set_element_text(p, "new");
        assert_eq!(host.serialize(root), "<p>new</p>");
        assert_eq!(host.parent_of(child), None);
    }

    #[test]
    fn dispatch_calls_handlers() {
        use std::cell::Cell;
        use std::rc::Rc;

        let host = MemoryHost::new();
        let button = host.create_element("button");
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let handler = Value::from(Handler::new(move |_| counter.set(counter.get() + 1)));
        host.patch_prop(button, "onClick", None, Some(&handler));

        assert!(host.dispatch(button, "click", &[]));
        assert!(!host.dispatch(button, "hover", &[]));
        assert_eq!(clicks.get(), 1);
    }
}
