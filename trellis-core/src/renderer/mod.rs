//! Reconciler
//!
//! The renderer turns descriptor trees into host mutations. The first render
//! into a container mounts the tree; every later render diffs the new tree
//! against the previous one and issues only the calls needed to make the host
//! match.
//!
//! # Patching
//!
//! 1. Descriptors of different type or key are never diffed: the old subtree
//!    is unmounted and the new one mounted at the same position.
//! 2. Elements diff their props (set new and changed, clear removed), then
//!    their children.
//! 3. Child lists are diffed by key (see `keyed.rs`), moving only the
//!    children that fall outside the longest run already in order.
//! 4. Components are re-rendered through their render effect when their props
//!    or children changed.

mod component;
mod keyed;
mod sequence;

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::config::{DuplicateKeyPolicy, RendererConfig};
use crate::error::{Error, Result};
use crate::host::{HostAdapter, HostNode};
use crate::vnode::{Children, Props, VNode, VNodeType};

pub use sequence::longest_increasing_subsequence;

struct RendererInner<A> {
    host: A,
    config: RendererConfig,
    roots: RefCell<HashMap<HostNode, VNode>>,
}

/// Renders descriptor trees into a host. Cloning shares the renderer.
pub struct Renderer<A: HostAdapter + 'static>(Rc<RendererInner<A>>);

impl<A: HostAdapter + 'static> Clone for Renderer<A> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<A: HostAdapter + 'static> Renderer<A> {
    pub fn new(host: A) -> Self {
        Self::with_config(host, RendererConfig::default())
    }

    pub fn with_config(host: A, config: RendererConfig) -> Self {
        Self(Rc::new(RendererInner {
            host,
            config,
            roots: RefCell::new(HashMap::new()),
        }))
    }

    pub fn host(&self) -> &A {
        &self.0.host
    }

    pub fn config(&self) -> &RendererConfig {
        &self.0.config
    }

    /// Render `vnode` into `container`, diffing against whatever was rendered
    /// there before. `None` unmounts the previous tree.
    pub fn render(&self, vnode: Option<VNode>, container: HostNode) -> Result<()> {
        let previous = self.0.roots.borrow().get(&container).cloned();

        match vnode {
            None => {
                if let Some(previous) = previous {
                    debug!(%container, "unmounting root");
                    self.unmount(&previous, true);
                }
                self.0.roots.borrow_mut().remove(&container);
            }
            Some(vnode) => {
                self.validate_tree(&vnode)?;
                self.patch(previous.as_ref(), &vnode, container, None)?;
                self.0.roots.borrow_mut().insert(container, vnode);
            }
        }
        Ok(())
    }

    /// The tree last rendered into `container`.
    pub fn root(&self, container: HostNode) -> Option<VNode> {
        self.0.roots.borrow().get(&container).cloned()
    }

    fn downgrade(&self) -> Weak<RendererInner<A>> {
        Rc::downgrade(&self.0)
    }

    fn upgrade(weak: &Weak<RendererInner<A>>) -> Option<Self> {
        weak.upgrade().map(Self)
    }

    /// Bring the host in line with `n2`, given that `n1` is what is mounted.
    pub(crate) fn patch(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<()> {
        let mut anchor = anchor;
        let n1 = match n1 {
            Some(old) if old.ptr_eq(n2) => return Ok(()),
            Some(old) if !old.is_same_vnode(n2) => {
                anchor = self.next_host_node(old);
                self.unmount(old, true);
                None
            }
            other => other,
        };

        match n2.ty() {
            VNodeType::Text => {
                self.process_text(n1, n2, container, anchor);
                Ok(())
            }
            VNodeType::Element(_) => self.process_element(n1, n2, container, anchor),
            VNodeType::Fragment => self.process_fragment(n1, n2, container, anchor),
            VNodeType::Component(_) => self.process_component(n1, n2, container, anchor),
        }
    }

    fn process_text(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let content = n2.children().as_text().unwrap_or_default();
        match n1 {
            None => {
                let el = self.0.host.create_text(content);
                n2.set_el(Some(el));
                self.0.host.insert(el, container, anchor);
            }
            Some(old) => {
                n2.set_el(old.el());
                if old.children().as_text() != Some(content) {
                    if let Some(el) = old.el() {
                        self.0.host.set_text(el, content);
                    }
                }
            }
        }
    }

    fn process_element(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<()> {
        match n1.and_then(|old| old.el().map(|el| (old, el))) {
            None => self.mount_element(n2, container, anchor),
            Some((old, el)) => {
                n2.set_el(Some(el));
                self.patch_props(el, old.props(), n2.props());
                self.patch_children(old, n2, el, None)
            }
        }
    }

    fn mount_element(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) -> Result<()> {
        let VNodeType::Element(tag) = vnode.ty() else {
            return Ok(());
        };

        let host = &self.0.host;
        let el = host.create_element(tag);
        vnode.set_el(Some(el));

        for (key, value) in vnode.props().iter() {
            host.patch_prop(el, key, None, Some(value));
        }

        match vnode.children() {
            Children::Text(content) => host.set_element_text(el, content),
            Children::Nodes(children) => self.mount_children(children, el, None)?,
            Children::None => {}
        }

        host.insert(el, container, anchor);
        Ok(())
    }

    fn process_fragment(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<()> {
        let host = &self.0.host;
        match n1 {
            None => {
                let start = host.create_text("");
                let end = host.create_text("");
                n2.set_el(Some(start));
                n2.set_anchor(Some(end));
                host.insert(start, container, anchor);
                host.insert(end, container, anchor);
                self.mount_children(n2.children().as_nodes(), container, Some(end))
            }
            Some(old) => {
                n2.set_el(old.el());
                n2.set_anchor(old.anchor());
                self.patch_children(old, n2, container, old.anchor())
            }
        }
    }

    pub(crate) fn mount_children(
        &self,
        children: &[VNode],
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<()> {
        for child in children {
            self.patch(None, child, container, anchor)?;
        }
        Ok(())
    }

    fn patch_props(&self, el: HostNode, old: &Props, new: &Props) {
        let host = &self.0.host;
        for (key, value) in new.iter() {
            let previous = old.get(key);
            if previous.is_some_and(|previous| previous.same(value)) {
                continue;
            }
            host.patch_prop(el, key, previous, Some(value));
        }
        for (key, value) in old.iter() {
            if !new.contains_key(key) {
                host.patch_prop(el, key, Some(value), None);
            }
        }
    }

    fn patch_children(
        &self,
        n1: &VNode,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<()> {
        let host = &self.0.host;
        match (n1.children(), n2.children()) {
            (old, Children::Text(content)) => {
                if let Children::Nodes(children) = old {
                    self.unmount_children(children);
                }
                if old.as_text() != Some(content.as_ref()) {
                    host.set_element_text(container, content);
                }
            }
            (Children::Nodes(old), Children::Nodes(new)) => {
                self.patch_keyed_children(old, new, container, anchor)?;
            }
            (old, Children::Nodes(new)) => {
                if old.as_text().is_some() {
                    host.set_element_text(container, "");
                }
                self.mount_children(new, container, anchor)?;
            }
            (Children::Nodes(old), Children::None) => self.unmount_children(old),
            (Children::Text(_), Children::None) => host.set_element_text(container, ""),
            (Children::None, Children::None) => {}
        }
        Ok(())
    }

    fn unmount_children(&self, children: &[VNode]) {
        for child in children {
            self.unmount(child, true);
        }
    }

    /// Tear down `vnode`: stop component effects and, if `do_remove`, detach
    /// its host nodes.
    ///
    /// Descendants of a removed element are only disposed, since removing the
    /// element takes them off the host.
    pub(crate) fn unmount(&self, vnode: &VNode, do_remove: bool) {
        let host = &self.0.host;
        match vnode.ty() {
            VNodeType::Component(_) => {
                if let Some(instance) = vnode.component() {
                    self.unmount_component(&instance, do_remove);
                }
            }
            VNodeType::Fragment => {
                for child in vnode.children().as_nodes() {
                    self.unmount(child, do_remove);
                }
                if do_remove {
                    for node in [vnode.el(), vnode.anchor()].into_iter().flatten() {
                        host.remove(node);
                    }
                }
            }
            VNodeType::Element(_) => {
                for child in vnode.children().as_nodes() {
                    self.unmount(child, false);
                }
                if do_remove {
                    if let Some(el) = vnode.el() {
                        host.remove(el);
                    }
                }
            }
            VNodeType::Text => {
                if do_remove {
                    if let Some(el) = vnode.el() {
                        host.remove(el);
                    }
                }
            }
        }
    }

    /// Move the host nodes of a mounted `vnode` before `anchor`.
    pub(crate) fn move_vnode(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let host = &self.0.host;
        match vnode.ty() {
            VNodeType::Component(_) => {
                if let Some(sub_tree) = vnode.component().and_then(|instance| instance.sub_tree()) {
                    self.move_vnode(&sub_tree, container, anchor);
                }
            }
            VNodeType::Fragment => {
                if let Some(start) = vnode.el() {
                    host.insert(start, container, anchor);
                }
                for child in vnode.children().as_nodes() {
                    self.move_vnode(child, container, anchor);
                }
                if let Some(end) = vnode.anchor() {
                    host.insert(end, container, anchor);
                }
            }
            VNodeType::Element(_) | VNodeType::Text => {
                if let Some(el) = vnode.el() {
                    host.insert(el, container, anchor);
                }
            }
        }
    }

    /// The first host node `vnode` mounted.
    ///
    /// Components resolve through their current subtree, so a component
    /// whose nested root was replaced by a later render still reports the
    /// live node.
    pub(crate) fn first_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match vnode.ty() {
            VNodeType::Component(_) => vnode
                .component()
                .and_then(|instance| instance.sub_tree())
                .and_then(|sub_tree| self.first_host_node(&sub_tree)),
            VNodeType::Element(_) | VNodeType::Text | VNodeType::Fragment => vnode.el(),
        }
    }

    /// The host node right after everything `vnode` mounted.
    pub(crate) fn next_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match vnode.ty() {
            VNodeType::Component(_) => vnode
                .component()
                .and_then(|instance| instance.sub_tree())
                .and_then(|sub_tree| self.next_host_node(&sub_tree)),
            VNodeType::Fragment => vnode
                .anchor()
                .and_then(|end| self.0.host.next_sibling_of(end)),
            VNodeType::Element(_) | VNodeType::Text => {
                vnode.el().and_then(|el| self.0.host.next_sibling_of(el))
            }
        }
    }

    /// Apply the duplicate-key policy to every children list of a tree before
    /// any of it touches the host.
    ///
    /// Component descriptors are not entered; their subtrees are checked when
    /// they render.
    pub(crate) fn validate_tree(&self, vnode: &VNode) -> Result<()> {
        if matches!(vnode.ty(), VNodeType::Component(_)) {
            return Ok(());
        }
        let children = vnode.children().as_nodes();
        self.check_keys(children)?;
        children.iter().try_for_each(|child| self.validate_tree(child))
    }

    /// Apply the duplicate-key policy to a children list.
    fn check_keys(&self, children: &[VNode]) -> Result<()> {
        let policy = self.0.config.duplicate_keys;
        if policy == DuplicateKeyPolicy::Allow || children.len() < 2 {
            return Ok(());
        }

        let mut seen = HashMap::with_capacity(children.len());
        for (index, key) in children
            .iter()
            .enumerate()
            .filter_map(|(index, child)| child.key().map(|key| (index, key)))
        {
            match seen.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
                Entry::Occupied(first) => match policy {
                    DuplicateKeyPolicy::Reject => {
                        return Err(Error::DuplicateKey { key: key.clone() });
                    }
                    DuplicateKeyPolicy::Warn => {
                        warn!(%key, first = *first.get(), index, "duplicate key in children list");
                    }
                    DuplicateKeyPolicy::Allow => {}
                },
            }
        }
        Ok(())
    }
}

impl<A> Drop for RendererInner<A> {
    fn drop(&mut self) {
        // Stop render effects of components still mounted.
        let roots: Vec<VNode> = self.roots.get_mut().drain().map(|(_, vnode)| vnode).collect();
        for root in roots {
            dispose(&root);
        }
    }
}

/// Stop every component effect in a tree without touching the host.
fn dispose(vnode: &VNode) {
    if let Some(instance) = vnode.component() {
        if let Some(effect) = instance.effect.borrow().as_ref() {
            effect.stop();
        }
        if let Some(sub_tree) = instance.sub_tree() {
            dispose(&sub_tree);
        }
        instance.release();
    }
    for child in vnode.children().as_nodes() {
        dispose(child);
    }
}
