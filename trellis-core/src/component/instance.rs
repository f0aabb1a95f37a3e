//! Component instances and the render context.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{error, warn};

use super::{emit, Component, RenderFn, SetupContext, SetupResult};
use crate::error::{Error, Result};
use crate::reactive::{
    reactive_object, shallow_reactive, untrack, Object, ReactiveEffect, ReactiveObject, Value,
};
use crate::scheduler::Job;
use crate::vnode::{text, Children, Props, VNode};

/// Live state of one mounted component.
pub struct ComponentInstance {
    def: Component,
    vnode: Rc<RefCell<VNode>>,
    pub(crate) next: RefCell<Option<VNode>>,
    props: ReactiveObject,
    attrs: RefCell<Object>,
    data: Option<ReactiveObject>,
    setup_state: Option<ReactiveObject>,
    render: RenderFn,
    pub(crate) sub_tree: RefCell<Option<VNode>>,
    pub(crate) mounted: Cell<bool>,
    pub(crate) effect: RefCell<Option<ReactiveEffect<Result<()>>>>,
    job: Job,
}

impl ComponentInstance {
    /// Resolve props, state and the render function for a component
    /// descriptor.
    pub(crate) fn create(component: &Component, vnode: &VNode) -> Result<Rc<Self>> {
        let def = component.def();
        let (props, attrs) = split_props(component, vnode.props());
        let props = shallow_reactive(&props);
        let vnode_cell = Rc::new(RefCell::new(vnode.clone()));

        // Neither data() nor setup() subscribe the parent's render to anything.
        let data = def
            .data
            .as_ref()
            .map(|data| untrack(|| reactive_object(&data())));

        let setup_result = match &def.setup {
            Some(setup) => {
                let ctx = SetupContext::new(Rc::clone(&vnode_cell), attrs.clone());
                untrack(|| setup(&props, &ctx))
            }
            None => SetupResult::None,
        };

        let (render, setup_state) = match setup_result {
            SetupResult::Render(render) => (Some(render), None),
            SetupResult::State(state) => (def.render.clone(), Some(reactive_object(&state))),
            SetupResult::None => (def.render.clone(), None),
        };
        let render = render.ok_or_else(|| Error::MissingRender {
            component: component.name().to_owned(),
        })?;

        Ok(Rc::new_cyclic(|weak: &Weak<ComponentInstance>| {
            let weak = weak.clone();
            ComponentInstance {
                def: component.clone(),
                vnode: vnode_cell,
                next: RefCell::new(None),
                props,
                attrs: RefCell::new(attrs),
                data,
                setup_state,
                render,
                sub_tree: RefCell::new(None),
                mounted: Cell::new(false),
                effect: RefCell::new(None),
                job: Job::new(move || {
                    // Already re-rendered by its parent earlier in this flush.
                    let Some(instance) = weak.upgrade().filter(|i| i.needs_update()) else {
                        return;
                    };
                    if let Err(err) = instance.update() {
                        error!(component = instance.name(), %err, "deferred component update failed");
                    }
                }),
            }
        }))
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn component(&self) -> &Component {
        &self.def
    }

    /// Declared props, as a shallow reactive object.
    pub fn props(&self) -> &ReactiveObject {
        &self.props
    }

    pub fn attrs(&self) -> Object {
        self.attrs.borrow().clone()
    }

    pub fn data(&self) -> Option<&ReactiveObject> {
        self.data.as_ref()
    }

    pub fn setup_state(&self) -> Option<&ReactiveObject> {
        self.setup_state.as_ref()
    }

    /// The descriptor this instance currently renders for.
    pub fn vnode(&self) -> VNode {
        self.vnode.borrow().clone()
    }

    /// The tree produced by the last render.
    pub fn sub_tree(&self) -> Option<VNode> {
        self.sub_tree.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    /// Number of completed render-effect runs.
    pub fn render_count(&self) -> usize {
        self.effect
            .borrow()
            .as_ref()
            .map_or(0, ReactiveEffect::run_count)
    }

    pub(crate) fn job(&self) -> &Job {
        &self.job
    }

    /// Whether something the last render read has changed since.
    pub(crate) fn needs_update(&self) -> bool {
        self.effect
            .borrow()
            .as_ref()
            .is_some_and(|effect| effect.is_active() && effect.is_dirty())
    }

    /// Re-run the render effect now.
    pub(crate) fn update(&self) -> Result<()> {
        let effect = self.effect.borrow().clone();
        match effect {
            Some(effect) if effect.is_active() => effect.run(),
            _ => Ok(()),
        }
    }

    /// Call the render function.
    pub(crate) fn render_tree(&self) -> VNode {
        let ctx = RenderContext { instance: self };
        (self.render)(&ctx)
    }

    /// Switch to the next descriptor and copy its props in, before a
    /// re-render.
    pub(crate) fn apply_next(self: &Rc<Self>, next: VNode) {
        next.set_component(Some(Rc::clone(self)));
        let previous = self.vnode.replace(next.clone());
        // Let the stale descriptor release the instance.
        previous.set_component(None);

        let (props, attrs) = split_props(&self.def, next.props());
        update_props(&self.props, &props);
        *self.attrs.borrow_mut() = attrs;
    }

    /// Break the descriptor <-> instance cycle after unmount.
    pub(crate) fn release(&self) {
        self.vnode.borrow().set_component(None);
        self.sub_tree.borrow_mut().take();
        self.next.borrow_mut().take();
        self.effect.borrow_mut().take();
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.name())
            .field("mounted", &self.mounted.get())
            .finish()
    }
}

/// Split descriptor props into declared props and attrs.
fn split_props(component: &Component, raw: &Props) -> (Object, Object) {
    let props = Object::new();
    let attrs = Object::new();
    for (key, value) in raw.iter() {
        if component.declares_prop(key) {
            props.insert(key, value.clone());
        } else {
            attrs.insert(key, value.clone());
        }
    }
    (props, attrs)
}

/// Whether two descriptor prop maps differ by shallow identity.
pub fn has_props_changed(prev: &Props, next: &Props) -> bool {
    !prev.same_as(next)
}

/// Write changed props into the reactive props object and drop missing ones.
fn update_props(props: &ReactiveObject, next: &Object) {
    for (key, value) in next.entries() {
        props.set(key, value);
    }
    for key in props.raw().keys() {
        if !next.contains_key(&key) {
            props.remove(&key);
        }
    }
}

/// What a render function sees.
pub struct RenderContext<'a> {
    instance: &'a ComponentInstance,
}

impl RenderContext<'_> {
    /// Look a name up in data, then props, then setup state.
    ///
    /// Unknown names read as [`Value::Null`] and subscribe the render to the
    /// prop of that name.
    pub fn get(&self, key: &str) -> Value {
        let instance = self.instance;
        if let Some(data) = instance.data.as_ref().filter(|d| d.raw().contains_key(key)) {
            return data.get(key);
        }
        if instance.props.raw().contains_key(key) {
            return instance.props.get(key);
        }
        if let Some(state) = instance
            .setup_state
            .as_ref()
            .filter(|s| s.raw().contains_key(key))
        {
            return state.get(key);
        }
        instance.props.get(key)
    }

    /// Write a name in data or setup state. Props are readonly.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let instance = self.instance;
        if let Some(data) = instance.data.as_ref().filter(|d| d.raw().contains_key(key)) {
            data.set(key, value);
            return Ok(());
        }
        if instance.props.raw().contains_key(key) || instance.def.declares_prop(key) {
            return Err(Error::ReadonlyProp {
                key: key.to_owned(),
            });
        }
        if let Some(state) = instance
            .setup_state
            .as_ref()
            .filter(|s| s.raw().contains_key(key))
        {
            state.set(key, value);
            return Ok(());
        }

        warn!(component = instance.name(), key, "write to unknown name ignored");
        Ok(())
    }

    pub fn props(&self) -> &ReactiveObject {
        &self.instance.props
    }

    pub fn attrs(&self) -> Object {
        self.instance.attrs()
    }

    pub fn data(&self) -> Option<&ReactiveObject> {
        self.instance.data.as_ref()
    }

    pub fn setup_state(&self) -> Option<&ReactiveObject> {
        self.instance.setup_state.as_ref()
    }

    /// Content passed as children of the component descriptor.
    pub fn children(&self) -> Vec<VNode> {
        match self.instance.vnode().children() {
            Children::None => Vec::new(),
            Children::Text(content) => vec![text(content.as_ref())],
            Children::Nodes(nodes) => nodes.clone(),
        }
    }

    /// Call the parent's handler for `event`.
    pub fn emit(&self, event: &str, args: &[Value]) {
        emit(&self.instance.vnode(), event, args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentDef;
    use crate::vnode::h;

    fn instance(def: &Component, props: Props) -> Result<Rc<ComponentInstance>> {
        let vnode = h(def, props, ());
        ComponentInstance::create(def, &vnode)
    }

    #[test]
    fn props_and_attrs_are_split() {
        let def = ComponentDef::new("Item")
            .props(["title"])
            .render(|_| text(""))
            .build();
        let instance = instance(&def, Props::new().with("title", "a").with("class", "x")).unwrap();

        assert_eq!(instance.props().get_untracked("title"), Value::from("a"));
        assert!(!instance.props().raw().contains_key("class"));
        assert_eq!(instance.attrs().get("class"), Some(Value::from("x")));
        assert!(instance.props().is_shallow());
    }

    #[test]
    fn missing_render_is_an_error() {
        let def = ComponentDef::new("Broken").build();
        let err = instance(&def, Props::new()).unwrap_err();
        assert!(matches!(err, Error::MissingRender { component } if component == "Broken"));
    }

    #[test]
    fn setup_render_wins_over_render_option() {
        let def = ComponentDef::new("Both")
            .setup(|_, _| SetupResult::render(|_| text("from setup")))
            .render(|_| text("from option"))
            .build();
        let instance = instance(&def, Props::new()).unwrap();
        let tree = instance.render_tree();
        assert_eq!(tree.children().as_text(), Some("from setup"));
    }

    #[test]
    fn lookup_order_is_data_props_setup() {
        let def = ComponentDef::new("Lookup")
            .props(["shared", "title"])
            .data(|| Object::new().with("shared", "data"))
            .setup(|_, _| {
                SetupResult::state(Object::new().with("title", "setup").with("extra", "setup"))
            })
            .render(|ctx| text(format!("{}|{}|{}", ctx.get("shared"), ctx.get("title"), ctx.get("extra"))))
            .build();
        let instance = instance(
            &def,
            Props::new().with("shared", "prop").with("title", "prop"),
        )
        .unwrap();

        let tree = instance.render_tree();
        assert_eq!(tree.children().as_text(), Some("data|prop|setup"));
    }

    #[test]
    fn props_are_readonly_through_the_context() {
        let def = ComponentDef::new("Writer")
            .props(["title"])
            .data(|| Object::new().with("count", 0))
            .render(|ctx| {
                assert!(matches!(ctx.set("title", "x"), Err(Error::ReadonlyProp { .. })));
                ctx.set("count", 1).unwrap();
                text("")
            })
            .build();
        let instance = instance(&def, Props::new().with("title", "t")).unwrap();
        instance.render_tree();

        assert_eq!(instance.data().unwrap().get_untracked("count"), Value::Int(1));
    }

    #[test]
    fn prop_changes_are_detected_shallowly() {
        let a = Props::new().with("n", 1);
        assert!(!has_props_changed(&a, &Props::new().with("n", 1)));
        assert!(has_props_changed(&a, &Props::new().with("n", 2)));
        assert!(has_props_changed(&a, &Props::new()));
    }
}
