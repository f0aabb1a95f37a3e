//! Components
//!
//! A component is a reusable piece of UI with its own reactive state. It is
//! described by a [`ComponentDef`] and instantiated by the reconciler once per
//! mounted component descriptor.
//!
//! # Resolution
//!
//! 1. Props passed on the descriptor are split: names declared in
//!    [`ComponentDef::props`] go into a shallow reactive `props` object,
//!    everything else into `attrs`.
//! 2. `data`, if given, produces the initial state object, which is made
//!    reactive.
//! 3. `setup`, if given, runs once with the props and a [`SetupContext`]. It
//!    either returns the render function or a state object.
//! 4. The render function is the one returned by `setup`, else `render`.
//!    A component with neither fails to mount.
//!
//! The render function receives a [`RenderContext`] whose `get` looks up a
//! name in data, then props, then setup state.

mod instance;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::reactive::{Object, ReactiveObject, Value};
use crate::vnode::{handler_key, VNode};

pub use instance::{has_props_changed, ComponentInstance, RenderContext};

pub type RenderFn = Rc<dyn Fn(&RenderContext<'_>) -> VNode>;
pub type SetupFn = Rc<dyn Fn(&ReactiveObject, &SetupContext) -> SetupResult>;
pub type DataFn = Rc<dyn Fn() -> Object>;

/// What `setup` hands back.
pub enum SetupResult {
    /// The component's render function.
    Render(RenderFn),
    /// State exposed to the render function through [`RenderContext::get`].
    State(Object),
    None,
}

impl SetupResult {
    pub fn render(f: impl Fn(&RenderContext<'_>) -> VNode + 'static) -> Self {
        SetupResult::Render(Rc::new(f))
    }

    pub fn state(state: Object) -> Self {
        SetupResult::State(state)
    }
}

impl fmt::Debug for SetupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupResult::Render(_) => f.write_str("Render"),
            SetupResult::State(state) => f.debug_tuple("State").field(state).finish(),
            SetupResult::None => f.write_str("None"),
        }
    }
}

/// Builder for a component definition.
///
/// # Example
///
/// ```rust
/// use trellis_core::component::ComponentDef;
/// use trellis_core::reactive::Object;
/// use trellis_core::vnode::{h, Props};
///
/// let counter = ComponentDef::new("Counter")
///     .props(["label"])
///     .data(|| Object::new().with("count", 0))
///     .render(|ctx| {
///         let label = format!("{}: {}", ctx.get("label"), ctx.get("count"));
///         h("span", Props::new(), label)
///     })
///     .build();
///
/// assert_eq!(counter.name(), "Counter");
/// ```
#[derive(Default)]
pub struct ComponentDef {
    name: String,
    props: Vec<String>,
    data: Option<DataFn>,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
}

impl ComponentDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declare the prop names this component accepts.
    pub fn props<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.props = names.into_iter().map(Into::into).collect();
        self
    }

    /// Initial state, made reactive per instance.
    pub fn data(mut self, f: impl Fn() -> Object + 'static) -> Self {
        self.data = Some(Rc::new(f));
        self
    }

    pub fn setup(
        mut self,
        f: impl Fn(&ReactiveObject, &SetupContext) -> SetupResult + 'static,
    ) -> Self {
        self.setup = Some(Rc::new(f));
        self
    }

    pub fn render(mut self, f: impl Fn(&RenderContext<'_>) -> VNode + 'static) -> Self {
        self.render = Some(Rc::new(f));
        self
    }

    pub fn build(self) -> Component {
        Component(Rc::new(self))
    }
}

/// A built component definition. Descriptors compare components by identity.
#[derive(Clone)]
pub struct Component(Rc<ComponentDef>);

impl Component {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn declares_prop(&self, name: &str) -> bool {
        self.0.props.iter().any(|prop| prop == name)
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn def(&self) -> &ComponentDef {
        &self.0
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.0.name)
            .field("props", &self.0.props)
            .finish()
    }
}

/// Second argument of `setup`. Clones share the component's current
/// descriptor, so a clone kept in an event handler emits to the latest
/// parent handler.
#[derive(Clone)]
pub struct SetupContext {
    vnode: Rc<RefCell<VNode>>,
    attrs: Object,
}

impl SetupContext {
    pub(crate) fn new(vnode: Rc<RefCell<VNode>>, attrs: Object) -> Self {
        Self { vnode, attrs }
    }

    /// Props passed on the descriptor that the component does not declare.
    pub fn attrs(&self) -> Object {
        self.attrs.clone()
    }

    /// Call the parent's handler for `event` (`"change"` -> `onChange`).
    pub fn emit(&self, event: &str, args: &[Value]) {
        let vnode = self.vnode.borrow().clone();
        emit(&vnode, event, args);
    }
}

/// Call the handler for `event` found on the current descriptor of a
/// component.
pub(crate) fn emit(vnode: &VNode, event: &str, args: &[Value]) {
    let key = handler_key(event);
    let handler = vnode
        .props()
        .get(&key)
        .and_then(|value| value.as_handler().cloned());

    match handler {
        Some(handler) => handler.call(args),
        None => warn!(event, handler = %key, "emitted event has no handler"),
    }
}
