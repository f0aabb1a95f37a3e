//! Descriptor Tree
//!
//! A [`VNode`] describes one node of the target tree for a single render:
//! an element, a text node, a fragment (a list of siblings without a wrapper)
//! or a component. Render functions build a fresh tree on every run; the
//! reconciler diffs it against the previous one.
//!
//! Descriptors are immutable apart from the bookkeeping the reconciler
//! attaches while mounting: the host node they produced and, for components,
//! the live component instance.

mod props;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::component::{Component, ComponentInstance};
use crate::host::HostNode;

pub use props::{handler_key, Key, Props};

bitflags! {
    /// Classification of a descriptor and of its children.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShapeFlags: u16 {
        const ELEMENT        = 0b0000_0001;
        const COMPONENT      = 0b0000_0010;
        const TEXT_CHILDREN  = 0b0000_0100;
        const ARRAY_CHILDREN = 0b0000_1000;
    }
}

/// What a descriptor stands for.
#[derive(Clone)]
pub enum VNodeType {
    Element(Rc<str>),
    Text,
    Fragment,
    Component(Component),
}

impl VNodeType {
    fn same(&self, other: &VNodeType) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Text, VNodeType::Text) => true,
            (VNodeType::Fragment, VNodeType::Fragment) => true,
            (VNodeType::Component(a), VNodeType::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "<{tag}>"),
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Component(component) => write!(f, "Component({})", component.name()),
        }
    }
}

impl From<&str> for VNodeType {
    fn from(tag: &str) -> Self {
        VNodeType::Element(Rc::from(tag))
    }
}

impl From<Component> for VNodeType {
    fn from(component: Component) -> Self {
        VNodeType::Component(component)
    }
}

impl From<&Component> for VNodeType {
    fn from(component: &Component) -> Self {
        VNodeType::Component(component.clone())
    }
}

/// Content of a descriptor.
#[derive(Clone, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    Nodes(Vec<VNode>),
}

impl Children {
    pub fn is_none(&self) -> bool {
        matches!(self, Children::None)
    }

    pub fn as_nodes(&self) -> &[VNode] {
        match self {
            Children::Nodes(nodes) => nodes,
            _ => &[],
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    fn shape(&self) -> ShapeFlags {
        match self {
            Children::None => ShapeFlags::empty(),
            Children::Text(_) => ShapeFlags::TEXT_CHILDREN,
            Children::Nodes(_) => ShapeFlags::ARRAY_CHILDREN,
        }
    }
}

impl fmt::Debug for Children {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Children::None => f.write_str("None"),
            Children::Text(text) => write!(f, "{text:?}"),
            Children::Nodes(nodes) => f.debug_list().entries(nodes).finish(),
        }
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(Rc::from(text))
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(Rc::from(text))
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children::Nodes(nodes)
    }
}

impl From<VNode> for Children {
    fn from(node: VNode) -> Self {
        Children::Nodes(vec![node])
    }
}

struct VNodeInner {
    ty: VNodeType,
    props: Props,
    children: Children,
    key: Option<Key>,
    shape: ShapeFlags,
    el: Cell<Option<HostNode>>,
    anchor: Cell<Option<HostNode>>,
    component: RefCell<Option<Rc<ComponentInstance>>>,
}

/// One node of a descriptor tree. Cloning shares the node.
#[derive(Clone)]
pub struct VNode(Rc<VNodeInner>);

impl VNode {
    /// Build a descriptor; a `key` prop becomes the node key and is not
    /// forwarded to the host.
    pub fn new(ty: VNodeType, mut props: Props, children: Children) -> Self {
        let key = props.remove("key").as_ref().and_then(Key::from_value);

        // Fragments always hold a node list.
        let children = match (&ty, children) {
            (VNodeType::Fragment, Children::Text(content)) => {
                Children::Nodes(vec![text(content.as_ref())])
            }
            (_, children) => children,
        };

        let shape = match &ty {
            VNodeType::Element(_) => ShapeFlags::ELEMENT,
            VNodeType::Component(_) => ShapeFlags::COMPONENT,
            VNodeType::Text | VNodeType::Fragment => ShapeFlags::empty(),
        } | children.shape();

        Self(Rc::new(VNodeInner {
            ty,
            props,
            children,
            key,
            shape,
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: RefCell::new(None),
        }))
    }

    pub fn ty(&self) -> &VNodeType {
        &self.0.ty
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn children(&self) -> &Children {
        &self.0.children
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn shape(&self) -> ShapeFlags {
        self.0.shape
    }

    /// Host node produced by mounting: the element or text node, the start
    /// anchor of a fragment, or the root of a component's subtree.
    pub fn el(&self) -> Option<HostNode> {
        self.0.el.get()
    }

    /// End anchor of a mounted fragment.
    pub fn anchor(&self) -> Option<HostNode> {
        self.0.anchor.get()
    }

    /// Live instance of a mounted component descriptor.
    pub fn component(&self) -> Option<Rc<ComponentInstance>> {
        self.0.component.borrow().clone()
    }

    pub(crate) fn set_el(&self, el: Option<HostNode>) {
        self.0.el.set(el);
    }

    pub(crate) fn set_anchor(&self, anchor: Option<HostNode>) {
        self.0.anchor.set(anchor);
    }

    pub(crate) fn set_component(&self, instance: Option<Rc<ComponentInstance>>) {
        *self.0.component.borrow_mut() = instance;
    }

    /// Same type and same key: the reconciler may patch one into the other.
    pub fn is_same_vnode(&self, other: &VNode) -> bool {
        self.0.ty.same(&other.0.ty) && self.0.key == other.0.key
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("VNode");
        debug.field("type", &self.0.ty);
        if let Some(key) = &self.0.key {
            debug.field("key", key);
        }
        if !self.0.props.is_empty() {
            debug.field("props", &self.0.props);
        }
        if !self.0.children.is_none() {
            debug.field("children", &self.0.children);
        }
        debug.finish()
    }
}

/// Build an element or component descriptor.
///
/// ```rust
/// use trellis_core::vnode::{h, text, Props, ShapeFlags};
///
/// let list = h("ul", Props::new().with("class", "items"), vec![
///     h("li", Props::new().with("key", 1), "one"),
///     h("li", Props::new().with("key", 2), "two"),
/// ]);
/// assert!(list.shape().contains(ShapeFlags::ELEMENT | ShapeFlags::ARRAY_CHILDREN));
/// assert!(list.children().as_nodes()[0].key().is_some());
/// # let _ = text("");
/// ```
pub fn h(ty: impl Into<VNodeType>, props: Props, children: impl Into<Children>) -> VNode {
    VNode::new(ty.into(), props, children.into())
}

/// Build a text descriptor.
pub fn text(content: impl Into<Rc<str>>) -> VNode {
    VNode::new(VNodeType::Text, Props::new(), Children::Text(content.into()))
}

/// Build a fragment descriptor.
pub fn fragment(children: Vec<VNode>) -> VNode {
    VNode::new(VNodeType::Fragment, Props::new(), Children::Nodes(children))
}

/// Build a keyed fragment descriptor.
pub fn keyed_fragment(key: impl Into<Key>, children: Vec<VNode>) -> VNode {
    let key: Key = key.into();
    let props = Props::new().with("key", key);
    VNode::new(VNodeType::Fragment, props, Children::Nodes(children))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_extracted_from_props() {
        let node = h("li", Props::new().with("key", "a").with("class", "x"), ());
        assert_eq!(node.key(), Some(&Key::from("a")));
        assert!(!node.props().contains_key("key"));
        assert!(node.props().contains_key("class"));
    }

    #[test]
    fn shape_flags() {
        let el = h("p", Props::new(), "hi");
        assert_eq!(el.shape(), ShapeFlags::ELEMENT | ShapeFlags::TEXT_CHILDREN);

        let empty = h("br", Props::new(), ());
        assert_eq!(empty.shape(), ShapeFlags::ELEMENT);

        assert!(text("x").shape().is_empty());

        let component = crate::component::ComponentDef::new("C").build();
        assert_eq!(h(&component, Props::new(), ()).shape(), ShapeFlags::COMPONENT);
    }

    #[test]
    fn fragments_normalize_text_children() {
        let node = h(VNodeType::Fragment, Props::new(), "hello");
        let children = node.children().as_nodes();
        assert_eq!(children.len(), 1);
        assert!(matches!(children[0].ty(), VNodeType::Text));
        assert_eq!(children[0].children().as_text(), Some("hello"));
    }

    #[test]
    fn same_vnode_compares_type_and_key() {
        let a = h("li", Props::new().with("key", 1), ());
        let b = h("li", Props::new().with("key", 1), "changed");
        let c = h("li", Props::new().with("key", 2), ());
        let d = h("div", Props::new().with("key", 1), ());

        assert!(a.is_same_vnode(&b));
        assert!(!a.is_same_vnode(&c));
        assert!(!a.is_same_vnode(&d));
        assert!(fragment(vec![]).is_same_vnode(&fragment(vec![text("x")])));
        assert!(!keyed_fragment(1, vec![]).is_same_vnode(&keyed_fragment(2, vec![])));
    }
}
