//! Mounting, updating and unmounting components.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, warn};

use super::Renderer;
use crate::component::{has_props_changed, ComponentInstance};
use crate::error::Result;
use crate::host::{HostAdapter, HostNode};
use crate::reactive::ReactiveEffect;
use crate::scheduler::{invalidate_job, queue_job};
use crate::vnode::{VNode, VNodeType};

impl<A: HostAdapter + 'static> Renderer<A> {
    pub(super) fn process_component(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<()> {
        match n1 {
            None => self.mount_component(n2, container, anchor),
            Some(old) => self.update_component(old, n2, container, anchor),
        }
    }

    /// Create the instance and its render effect, then run the first render.
    ///
    /// Later runs of the effect are not immediate: a dependency change queues
    /// the instance's job, so several writes in one turn re-render once.
    fn mount_component(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) -> Result<()> {
        let VNodeType::Component(component) = vnode.ty() else {
            return Ok(());
        };

        let instance = ComponentInstance::create(component, vnode)?;
        vnode.set_component(Some(Rc::clone(&instance)));

        let renderer = self.downgrade();
        let weak = Rc::downgrade(&instance);
        let initial = Cell::new(Some((container, anchor)));
        let scheduled = Rc::downgrade(&instance);

        let effect = ReactiveEffect::with_scheduler(
            move || {
                let (Some(renderer), Some(instance)) = (Renderer::upgrade(&renderer), weak.upgrade())
                else {
                    return Ok(());
                };
                renderer.render_component(&instance, initial.take())
            },
            move || {
                if let Some(instance) = scheduled.upgrade() {
                    queue_job(instance.job());
                }
            },
        );

        *instance.effect.borrow_mut() = Some(effect.clone());
        if let Err(err) = effect.run() {
            self.unmount_component(&instance, true);
            return Err(err);
        }
        Ok(())
    }

    fn update_component(
        &self,
        n1: &VNode,
        n2: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<()> {
        let Some(instance) = n1.component() else {
            return self.mount_component(n2, container, anchor);
        };

        if should_update_component(n1, n2) {
            *instance.next.borrow_mut() = Some(n2.clone());
            // The update below covers any re-render already queued.
            invalidate_job(instance.job().id());
            instance.update()
        } else {
            n2.set_el(n1.el());
            instance.apply_next(n2.clone());
            Ok(())
        }
    }

    /// Body of a component's render effect.
    fn render_component(
        &self,
        instance: &Rc<ComponentInstance>,
        initial: Option<(HostNode, Option<HostNode>)>,
    ) -> Result<()> {
        if !instance.is_mounted() {
            let Some((container, anchor)) = initial else {
                return Ok(());
            };
            let tree = instance.render_tree();
            self.validate_tree(&tree)?;
            if let Err(err) = self.patch(None, &tree, container, anchor) {
                self.unmount(&tree, true);
                return Err(err);
            }
            instance.vnode().set_el(self.first_host_node(&tree));
            *instance.sub_tree.borrow_mut() = Some(tree);
            instance.mounted.set(true);
            debug!(component = instance.name(), "component mounted");
            return Ok(());
        }

        let next = instance.next.borrow_mut().take();
        if let Some(next) = next {
            instance.apply_next(next);
        }

        let tree = instance.render_tree();
        self.validate_tree(&tree)?;
        let Some(prev) = instance.sub_tree() else {
            return Ok(());
        };
        let container = self
            .first_host_node(&prev)
            .and_then(|el| self.host().parent_of(el));
        let Some(container) = container else {
            warn!(component = instance.name(), "mounted subtree has no host parent");
            return Ok(());
        };
        let anchor = self.next_host_node(&prev);

        self.patch(Some(&prev), &tree, container, anchor)?;
        instance.vnode().set_el(self.first_host_node(&tree));
        *instance.sub_tree.borrow_mut() = Some(tree);
        debug!(component = instance.name(), renders = instance.render_count(), "component updated");
        Ok(())
    }

    pub(super) fn unmount_component(&self, instance: &Rc<ComponentInstance>, do_remove: bool) {
        let effect = instance.effect.borrow().clone();
        if let Some(effect) = effect {
            effect.stop();
        }
        invalidate_job(instance.job().id());

        if let Some(sub_tree) = instance.sub_tree() {
            self.unmount(&sub_tree, do_remove);
        }
        instance.mounted.set(false);
        instance.release();
        debug!(component = instance.name(), "component unmounted");
    }
}

/// A component re-renders when its props changed or it has slot content.
fn should_update_component(prev: &VNode, next: &VNode) -> bool {
    has_props_changed(prev.props(), next.props())
        || !prev.children().is_none()
        || !next.children().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::component::{ComponentDef, SetupResult};
    use crate::host::MemoryHost;
    use crate::reactive::{Handler, Object, Ref, Value};
    use crate::scheduler::{flush_jobs, pending_jobs};
    use crate::vnode::{h, text, Props};

    fn setup() -> (Renderer<Rc<MemoryHost>>, Rc<MemoryHost>, HostNode) {
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root();
        (Renderer::new(Rc::clone(&host)), host, root)
    }

    #[test]
    fn state_changes_rerender_on_flush() {
        let (renderer, host, root) = setup();
        let count = Ref::new(0);
        let source = count.clone();
        let counter = ComponentDef::new("Counter")
            .render(move |_| h("span", Props::new(), source.get().to_string()))
            .build();

        renderer.render(Some(h(&counter, Props::new(), ())), root).unwrap();
        assert_eq!(host.serialize(root), "<span>0</span>");

        count.set(1);
        count.set(2);
        assert_eq!(pending_jobs(), 1);
        assert_eq!(host.serialize(root), "<span>0</span>");

        assert_eq!(flush_jobs(), 1);
        assert_eq!(host.serialize(root), "<span>2</span>");

        let instance = renderer.root(root).and_then(|vnode| vnode.component()).unwrap();
        assert_eq!(instance.render_count(), 2);
    }

    #[test]
    fn parent_passes_new_props() {
        let (renderer, host, root) = setup();
        let label = ComponentDef::new("Label")
            .props(["title"])
            .render(|ctx| h("b", Props::new(), ctx.get("title").to_string()))
            .build();
        let tree = |title: &str| h("div", Props::new(), vec![h(&label, Props::new().with("title", title), ())]);

        renderer.render(Some(tree("a")), root).unwrap();
        renderer.render(Some(tree("b")), root).unwrap();
        assert_eq!(host.serialize(root), "<div><b>b</b></div>");
        assert_eq!(pending_jobs(), 0);
    }

    #[test]
    fn unchanged_props_skip_the_child_render() {
        let (renderer, _, root) = setup();
        let renders = Rc::new(Cell::new(0));
        let counter = renders.clone();
        let child = ComponentDef::new("Child")
            .props(["n"])
            .render(move |ctx| {
                counter.set(counter.get() + 1);
                text(ctx.get("n").to_string())
            })
            .build();

        let tree = || h("div", Props::new(), vec![h(&child, Props::new().with("n", 1), ())]);
        renderer.render(Some(tree()), root).unwrap();
        renderer.render(Some(tree()), root).unwrap();
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn emit_reaches_the_parent_handler() {
        let (renderer, host, root) = setup();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();

        let button = ComponentDef::new("Button")
            .setup(|_, ctx| {
                let ctx_attrs = ctx.attrs();
                assert!(ctx_attrs.contains_key("onPress"));
                SetupResult::render(|ctx| {
                    ctx.emit("press", &[Value::from("hi")]);
                    h("button", Props::new(), "ok")
                })
            })
            .build();

        let props = Props::new().with(
            "onPress",
            Handler::new(move |args| sink.borrow_mut().push(args[0].clone())),
        );
        renderer.render(Some(h(&button, props, ())), root).unwrap();

        assert_eq!(*received.borrow(), vec![Value::from("hi")]);
        assert_eq!(host.serialize(root), "<button>ok</button>");
    }

    #[test]
    fn unmount_stops_the_render_effect() {
        let (renderer, host, root) = setup();
        let count = Ref::new(0);
        let source = count.clone();
        let item = ComponentDef::new("Item")
            .data(Object::new)
            .render(move |_| text(source.get().to_string()))
            .build();

        renderer.render(Some(h(&item, Props::new(), ())), root).unwrap();
        let instance = renderer.root(root).and_then(|vnode| vnode.component()).unwrap();
        assert_eq!(count.subscriber_count(), 1);

        renderer.render(None, root).unwrap();
        assert!(!instance.is_mounted());
        assert_eq!(count.subscriber_count(), 0);
        assert_eq!(host.serialize(root), "");

        count.set(1);
        assert_eq!(pending_jobs(), 0);
    }

    #[test]
    fn nested_child_swapping_its_root_stays_reachable() {
        let (renderer, host, root) = setup();
        let count = Ref::new(0);
        let flip = Ref::new(false);

        let toggled = flip.clone();
        let leaf = ComponentDef::new("Leaf")
            .props(["n"])
            .render(move |ctx| {
                let tag = if toggled.get().truthy() { "div" } else { "span" };
                h(tag, Props::new(), ctx.get("n").to_string())
            })
            .build();
        let middle = ComponentDef::new("Middle")
            .props(["n"])
            .render(move |ctx| h(&leaf, Props::new().with("n", ctx.get("n")), ()))
            .build();
        let source = count.clone();
        let outer = ComponentDef::new("Outer")
            .render(move |_| h(&middle, Props::new().with("n", source.get()), ()))
            .build();

        renderer.render(Some(h(&outer, Props::new(), ())), root).unwrap();
        assert_eq!(host.serialize(root), "<span>0</span>");

        flip.set(true);
        flush_jobs();
        assert_eq!(host.serialize(root), "<div>0</div>");

        count.set(1);
        flush_jobs();
        assert_eq!(host.serialize(root), "<div>1</div>");
    }

    #[test]
    fn child_updated_by_parent_skips_its_queued_render() {
        let (renderer, host, root) = setup();
        let shared = Ref::new(0);
        let renders = Rc::new(Cell::new(0));

        let counter = renders.clone();
        let seen = shared.clone();
        let child = ComponentDef::new("Child")
            .props(["value"])
            .render(move |ctx| {
                counter.set(counter.get() + 1);
                text(format!("{}/{}", ctx.get("value"), seen.get()))
            })
            .build();
        let source = shared.clone();
        let parent = ComponentDef::new("Parent")
            .render(move |_| h("p", Props::new(), vec![h(&child, Props::new().with("value", source.get()), ())]))
            .build();

        renderer.render(Some(h(&parent, Props::new(), ())), root).unwrap();
        assert_eq!(renders.get(), 1);

        shared.set(1);
        flush_jobs();
        assert_eq!(host.serialize(root), "<p>1/1</p>");
        assert_eq!(renders.get(), 2);
        assert_eq!(pending_jobs(), 0);
    }

    #[test]
    fn failed_first_render_releases_the_component() {
        let (renderer, host, root) = setup();
        let count = Ref::new(0);
        let source = count.clone();
        let broken = ComponentDef::new("Broken")
            .render(move |_| {
                let label = source.get().to_string();
                h(
                    "ul",
                    Props::new(),
                    vec![
                        h("li", Props::new().with("key", 1), label.clone()),
                        h("li", Props::new().with("key", 1), label),
                    ],
                )
            })
            .build();

        let err = renderer.render(Some(h(&broken, Props::new(), ())), root).unwrap_err();
        assert!(matches!(err, crate::Error::DuplicateKey { .. }));
        assert_eq!(host.serialize(root), "");
        assert!(renderer.root(root).is_none());
        assert_eq!(count.subscriber_count(), 0);

        count.set(1);
        assert_eq!(pending_jobs(), 0);
    }
}
