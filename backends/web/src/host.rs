use wasm_bindgen::{JsCast, JsValue, closure::Closure};
use waterdom_core::{ClosureRegistry, Event, HostDom, HostError, HostResult, ListenerHandle};
use web_sys::{Document, Element, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, Node};

/// A browser listener registration.
///
/// Owns the JavaScript closure; dropping the token invalidates the closure, so the
/// patcher keeps it until the listener has been removed from the node.
#[derive(Debug)]
pub struct WebListener {
    event: String,
    closure: Closure<dyn Fn(web_sys::Event)>,
}

impl WebListener {
    /// The DOM event type this closure is registered for.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    fn function(&self) -> &js_sys::Function {
        self.closure.as_ref().unchecked_ref()
    }
}

/// [`HostDom`] over the real DOM of a [`Document`].
///
/// DOM events are translated into [`Event`]s and delivered through the
/// [`ClosureRegistry`] the host was created with, which must be the registry the
/// renderer acquires listeners from.
#[derive(Debug, Clone)]
pub struct WebHost {
    document: Document,
    registry: ClosureRegistry,
}

impl WebHost {
    /// Creates a host building nodes in `document`.
    #[must_use]
    pub const fn new(document: Document, registry: ClosureRegistry) -> Self {
        Self { document, registry }
    }

    /// The document nodes are created in.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// The registry events are dispatched through.
    #[must_use]
    pub const fn registry(&self) -> &ClosureRegistry {
        &self.registry
    }
}

fn failed(operation: &'static str) -> impl FnOnce(JsValue) -> HostError {
    move |value| {
        let message = value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}"));
        HostError::new(operation, message)
    }
}

fn as_element<'a>(operation: &'static str, node: &'a Node) -> HostResult<&'a Element> {
    node.dyn_ref::<Element>()
        .ok_or_else(|| HostError::new(operation, "not an element"))
}

/// Builds the engine-side event, carrying the current value of form controls.
fn translate(event: &web_sys::Event) -> Event {
    let translated = Event::new(event.type_());
    let Some(target) = event.target() else {
        return translated;
    };
    let value = if let Some(input) = target.dyn_ref::<HtmlInputElement>() {
        Some(input.value())
    } else if let Some(area) = target.dyn_ref::<HtmlTextAreaElement>() {
        Some(area.value())
    } else {
        target.dyn_ref::<HtmlSelectElement>().map(HtmlSelectElement::value)
    };
    match value {
        Some(value) => translated.with_value(value),
        None => translated,
    }
}

impl HostDom for WebHost {
    type Handle = Node;
    type Token = WebListener;

    fn create_element(&mut self, tag: &str) -> HostResult<Node> {
        self.document
            .create_element(tag)
            .map(Node::from)
            .map_err(failed("create_element"))
    }

    fn create_text(&mut self, content: &str) -> HostResult<Node> {
        Ok(self.document.create_text_node(content).into())
    }

    fn create_comment(&mut self, content: &str) -> HostResult<Node> {
        Ok(self.document.create_comment(content).into())
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> HostResult {
        as_element("set_attribute", node)?
            .set_attribute(name, value)
            .map_err(failed("set_attribute"))?;
        // The attribute only seeds the control; keep the live value in step.
        if name == "value" {
            if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
                input.set_value(value);
            }
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: &Node, name: &str) -> HostResult {
        as_element("remove_attribute", node)?
            .remove_attribute(name)
            .map_err(failed("remove_attribute"))
    }

    fn set_text(&mut self, node: &Node, content: &str) -> HostResult {
        match node.node_type() {
            Node::TEXT_NODE | Node::COMMENT_NODE => {
                node.set_text_content(Some(content));
                Ok(())
            }
            _ => Err(HostError::new("set_text", "not a character data node")),
        }
    }

    fn append_child(&mut self, parent: &Node, child: &Node) -> HostResult {
        parent
            .append_child(child)
            .map(drop)
            .map_err(failed("append_child"))
    }

    fn insert_before(&mut self, parent: &Node, child: &Node, anchor: &Node) -> HostResult {
        parent
            .insert_before(child, Some(anchor))
            .map(drop)
            .map_err(failed("insert_before"))
    }

    fn remove_child(&mut self, parent: &Node, child: &Node) -> HostResult {
        parent
            .remove_child(child)
            .map(drop)
            .map_err(failed("remove_child"))
    }

    fn add_event_listener(
        &mut self,
        node: &Node,
        event: &str,
        listener: ListenerHandle,
    ) -> HostResult<WebListener> {
        let registry = self.registry.clone();
        let closure = Closure::<dyn Fn(web_sys::Event)>::new(move |event: web_sys::Event| {
            if let Err(error) = registry.dispatch(listener, &translate(&event)) {
                tracing::warn!(%error, "DOM delivered an event to a released listener");
            }
        });
        let token = WebListener {
            event: event.to_owned(),
            closure,
        };
        node.add_event_listener_with_callback(event, token.function())
            .map_err(failed("add_event_listener"))?;
        Ok(token)
    }

    fn remove_event_listener(&mut self, node: &Node, token: &WebListener) -> HostResult {
        node.remove_event_listener_with_callback(&token.event, token.function())
            .map_err(failed("remove_event_listener"))
    }
}
