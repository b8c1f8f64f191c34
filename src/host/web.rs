use super::TreeHost;
use crate::{
	events::{web::extract, Dispatcher},
	HostError, ListenerId,
};
use core::fmt::{self, Debug, Formatter};
use js_sys::Function;
use std::rc::Rc;
use tracing::{instrument, trace_span, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{CharacterData, Document, Element, Node};

/// Listener IDs are passed through JavaScript as numbers, which are exact up to this.
const MAX_EXACT_LISTENER_ID: u64 = 1 << 53;

fn host_error(operation: &'static str) -> impl Fn(JsValue) -> HostError {
	move |error| HostError::new(operation, format!("{:?}", error))
}

/// Drives a [***Document***](https://developer.mozilla.org/en-US/docs/Web/API/Document).
///
/// Placeholders are comment nodes.
/// Every native handler is the same closure, bound to its [`ListenerId`], which reports to the [`Dispatcher`] it was created for.
pub struct WebTree {
	document: Document,
	common_handler: Option<(Rc<Dispatcher>, Closure<dyn Fn(JsValue, web_sys::Event)>)>,
	/// Closures for earlier dispatchers. Handlers bound to them may still be attached somewhere.
	retired: Vec<Closure<dyn Fn(JsValue, web_sys::Event)>>,
}
impl Debug for WebTree {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("WebTree")
			.field("document", &self.document)
			.field("has_common_handler", &self.common_handler.is_some())
			.field("retired", &self.retired.len())
			.finish()
	}
}
impl WebTree {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self {
			document,
			common_handler: None,
			retired: Vec::new(),
		}
	}

	/// Uses the global `window`'s document.
	///
	/// # Errors
	///
	/// Iff there is no global `window` or it has no document.
	pub fn from_window() -> Result<Self, HostError> {
		web_sys::window()
			.and_then(|window| window.document())
			.map(Self::new)
			.ok_or_else(|| HostError::new("document", "There is no global `window.document`."))
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	fn common_handler(&mut self, dispatcher: &Rc<Dispatcher>) -> &Function {
		if !matches!(&self.common_handler, Some((current, _)) if Rc::ptr_eq(current, dispatcher)) {
			if let Some((_, closure)) = self.common_handler.take() {
				self.retired.push(closure);
			}
		}
		let (_, closure) = self.common_handler.get_or_insert_with(|| (Rc::clone(dispatcher), Self::new_common_handler(Rc::clone(dispatcher))));
		closure.as_ref().unchecked_ref::<Function>()
	}

	fn new_common_handler(dispatcher: Rc<Dispatcher>) -> Closure<dyn Fn(JsValue, web_sys::Event)> {
		Closure::<dyn Fn(JsValue, web_sys::Event)>::new(move |listener: JsValue, event: web_sys::Event| {
			let span = trace_span!("common_handler", ?listener, event = %event.type_());
			let _enter = span.enter();

			#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
			let listener = match listener.as_f64() {
				Some(listener) => ListenerId(listener as u64),
				None => {
					warn!("Native handler called without a listener ID.");
					return;
				}
			};
			dispatcher.deliver(listener, extract(&event));
		})
	}

	fn parent_of(operation: &'static str, node: &Node) -> Result<Node, HostError> {
		node.parent_node().ok_or_else(|| HostError::new(operation, "The reference node is detached."))
	}
}

fn element<'a>(operation: &'static str, node: &'a Node) -> Result<&'a Element, HostError> {
	node.dyn_ref::<Element>().ok_or_else(|| HostError::new(operation, "The node is not an element."))
}

impl TreeHost for WebTree {
	type Node = Node;
	type Handler = Function;

	fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> Result<Node, HostError> {
		match namespace {
			Some(namespace) => self.document.create_element_ns(Some(namespace), tag).map_err(host_error("createElementNS")),
			None => self.document.create_element(tag).map_err(host_error("createElement")),
		}
		.map(Into::into)
	}

	fn create_text_node(&mut self, text: &str) -> Node {
		self.document.create_text_node(text).into()
	}

	fn create_placeholder(&mut self) -> Node {
		self.document.create_comment("placeholder").into()
	}

	fn append_child(&mut self, parent: &Node, child: &Node) -> Result<(), HostError> {
		parent.append_child(child).map(drop).map_err(host_error("appendChild"))
	}

	fn insert_before(&mut self, reference: &Node, node: &Node) -> Result<(), HostError> {
		if reference == node {
			return Ok(());
		}
		Self::parent_of("insertBefore", reference)?
			.insert_before(node, Some(reference))
			.map(drop)
			.map_err(host_error("insertBefore"))
	}

	fn insert_after(&mut self, reference: &Node, node: &Node) -> Result<(), HostError> {
		if reference == node {
			return Ok(());
		}
		Self::parent_of("insertBefore", reference)?
			.insert_before(node, reference.next_sibling().as_ref())
			.map(drop)
			.map_err(host_error("insertBefore"))
	}

	fn replace_with(&mut self, old: &Node, replacements: &[Node]) -> Result<(), HostError> {
		let parent = Self::parent_of("replaceWith", old)?;
		for replacement in replacements.iter().filter(|&replacement| replacement != old) {
			parent.insert_before(replacement, Some(old)).map_err(host_error("replaceWith"))?;
		}
		if replacements.contains(old) {
			Ok(())
		} else {
			parent.remove_child(old).map(drop).map_err(host_error("replaceWith"))
		}
	}

	fn remove(&mut self, node: &Node) -> Result<(), HostError> {
		match node.parent_node() {
			Some(parent) => parent.remove_child(node).map(drop).map_err(host_error("removeChild")),
			None => Ok(()),
		}
	}

	fn set_text(&mut self, node: &Node, text: &str) -> Result<(), HostError> {
		match node.dyn_ref::<CharacterData>() {
			Some(character_data) => character_data.set_data(text),
			None => node.set_text_content(Some(text)),
		}
		Ok(())
	}

	fn set_attribute(&mut self, node: &Node, name: &str, value: &str, namespace: Option<&str>) -> Result<(), HostError> {
		let element = element("setAttribute", node)?;
		match namespace {
			Some(namespace) => element.set_attribute_ns(Some(namespace), name, value).map_err(host_error("setAttributeNS")),
			None => element.set_attribute(name, value).map_err(host_error("setAttribute")),
		}
	}

	fn remove_attribute(&mut self, node: &Node, name: &str, namespace: Option<&str>) -> Result<(), HostError> {
		let element = element("removeAttribute", node)?;
		match namespace {
			Some(namespace) => element.remove_attribute_ns(Some(namespace), name).map_err(host_error("removeAttributeNS")),
			None => element.remove_attribute(name).map_err(host_error("removeAttribute")),
		}
	}

	fn parent(&self, node: &Node) -> Option<Node> {
		node.parent_node()
	}

	fn children(&self, node: &Node) -> Vec<Node> {
		let child_nodes = node.child_nodes();
		(0..child_nodes.length()).filter_map(|index| child_nodes.get(index)).collect()
	}

	fn deep_clone(&mut self, node: &Node) -> Result<Node, HostError> {
		node.clone_node_with_deep(true).map_err(host_error("cloneNode"))
	}

	#[instrument(skip(self, dispatcher))]
	fn create_handler(&mut self, listener: ListenerId, dispatcher: &Rc<Dispatcher>) -> Function {
		if listener.0 > MAX_EXACT_LISTENER_ID {
			warn!("Listener ID is too large to be passed through JavaScript exactly. Events may be reported under another ID.");
		}
		#[allow(clippy::cast_precision_loss)]
		let bound = JsValue::from_f64(listener.0 as f64);
		self.common_handler(dispatcher).bind1(&JsValue::UNDEFINED, &bound)
	}

	fn add_listener(&mut self, node: &Node, event: &str, handler: &Function) -> Result<(), HostError> {
		node.add_event_listener_with_callback(event, handler).map_err(host_error("addEventListener"))
	}

	fn remove_listener(&mut self, node: &Node, event: &str, handler: &Function) -> Result<(), HostError> {
		node.remove_event_listener_with_callback(event, handler).map_err(host_error("removeEventListener"))
	}
}
