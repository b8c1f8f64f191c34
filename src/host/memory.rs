use super::TreeHost;
use crate::{
	events::{self, Dispatcher, EventData},
	shown, HostError, ListenerId,
};
use core::fmt::{self, Debug, Formatter};
use std::{
	cell::RefCell,
	rc::{Rc, Weak},
};
use tracing::{instrument, trace, trace_span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAttribute {
	pub name: String,
	pub namespace: Option<String>,
	pub value: String,
}

enum Content {
	Element { tag: String, namespace: Option<String>, attributes: Vec<MemoryAttribute> },
	Text(String),
	Comment(String),
}

struct Data {
	content: Content,
	parent: Weak<RefCell<Data>>,
	children: Vec<MemoryNode>,
	listeners: Vec<(String, MemoryHandler)>,
}

/// A reference-counted node of a [`MemoryTree`]. Equality is node identity.
///
/// A node is released once neither its parent nor any handle refers to it anymore.
#[derive(Clone)]
pub struct MemoryNode(Rc<RefCell<Data>>);
impl PartialEq for MemoryNode {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Eq for MemoryNode {}
impl Debug for MemoryNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match &self.0.borrow().content {
			Content::Element { tag, .. } => write!(f, "MemoryNode(<{}>)", tag),
			Content::Text(text) => write!(f, "MemoryNode({:?})", shown(text)),
			Content::Comment(comment) => write!(f, "MemoryNode(<!--{}-->)", shown(comment)),
		}
	}
}
impl MemoryNode {
	fn new(content: Content) -> Self {
		Self(Rc::new(RefCell::new(Data {
			content,
			parent: Weak::new(),
			children: Vec::new(),
			listeners: Vec::new(),
		})))
	}

	#[must_use]
	pub fn tag(&self) -> Option<String> {
		match &self.0.borrow().content {
			Content::Element { tag, .. } => Some(tag.clone()),
			Content::Text(_) | Content::Comment(_) => None,
		}
	}

	#[must_use]
	pub fn namespace(&self) -> Option<String> {
		match &self.0.borrow().content {
			Content::Element { namespace, .. } => namespace.clone(),
			Content::Text(_) | Content::Comment(_) => None,
		}
	}

	/// The data of a text node.
	#[must_use]
	pub fn text(&self) -> Option<String> {
		match &self.0.borrow().content {
			Content::Text(text) => Some(text.clone()),
			Content::Element { .. } | Content::Comment(_) => None,
		}
	}

	#[must_use]
	pub fn is_element(&self) -> bool {
		matches!(self.0.borrow().content, Content::Element { .. })
	}

	#[must_use]
	pub fn is_placeholder(&self) -> bool {
		matches!(self.0.borrow().content, Content::Comment(_))
	}

	/// The value of the attribute `name` without namespace.
	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<String> {
		self.attribute_ns(name, None)
	}

	#[must_use]
	pub fn attribute_ns(&self, name: &str, namespace: Option<&str>) -> Option<String> {
		match &self.0.borrow().content {
			Content::Element { attributes, .. } => attributes
				.iter()
				.find(|attribute| attribute.name == name && attribute.namespace.as_deref() == namespace)
				.map(|attribute| attribute.value.clone()),
			Content::Text(_) | Content::Comment(_) => None,
		}
	}

	#[must_use]
	pub fn attributes(&self) -> Vec<MemoryAttribute> {
		match &self.0.borrow().content {
			Content::Element { attributes, .. } => attributes.clone(),
			Content::Text(_) | Content::Comment(_) => Vec::new(),
		}
	}

	#[must_use]
	pub fn children(&self) -> Vec<MemoryNode> {
		self.0.borrow().children.clone()
	}

	#[must_use]
	pub fn parent(&self) -> Option<MemoryNode> {
		self.0.borrow().parent.upgrade().map(MemoryNode)
	}

	/// The `(event, listener)` pairs attached to this node, in attachment order.
	#[must_use]
	pub fn listeners(&self) -> Vec<(String, ListenerId)> {
		self.0.borrow().listeners.iter().map(|(event, handler)| (event.clone(), handler.listener)).collect()
	}

	/// Concatenated text of this node and its descendants. Comments are skipped.
	#[must_use]
	pub fn text_content(&self) -> String {
		let data = self.0.borrow();
		match &data.content {
			Content::Text(text) => text.clone(),
			Content::Comment(_) => String::new(),
			Content::Element { .. } => data.children.iter().map(MemoryNode::text_content).collect(),
		}
	}

	/// Serializes this node and its descendants. Placeholders appear as comments.
	#[must_use]
	pub fn to_html(&self) -> String {
		let mut html = String::new();
		self.write_html(&mut html);
		html
	}

	fn write_html(&self, html: &mut String) {
		let data = self.0.borrow();
		match &data.content {
			Content::Element { tag, attributes, .. } => {
				html.push('<');
				html.push_str(tag);
				for attribute in attributes {
					html.push(' ');
					html.push_str(&attribute.name);
					html.push_str("=\"");
					escape_into(html, &attribute.value, true);
					html.push('"');
				}
				html.push('>');
				for child in &data.children {
					child.write_html(html);
				}
				html.push_str("</");
				html.push_str(tag);
				html.push('>');
			}
			Content::Text(text) => escape_into(html, text, false),
			Content::Comment(comment) => {
				html.push_str("<!--");
				html.push_str(comment);
				html.push_str("-->");
			}
		}
	}

	/// Whether `other` is this node or one of its descendants.
	fn contains(&self, other: &MemoryNode) -> bool {
		let mut current = Some(other.clone());
		while let Some(node) = current {
			if node == *self {
				return true;
			}
			current = node.parent();
		}
		false
	}

	fn detach(&self) {
		let parent = self.0.borrow().parent.upgrade();
		if let Some(parent) = parent {
			parent.borrow_mut().children.retain(|child| child != self);
		}
		self.0.borrow_mut().parent = Weak::new();
	}

	fn deep_clone(&self) -> MemoryNode {
		let data = self.0.borrow();
		let content = match &data.content {
			Content::Element { tag, namespace, attributes } => Content::Element {
				tag: tag.clone(),
				namespace: namespace.clone(),
				attributes: attributes.clone(),
			},
			Content::Text(text) => Content::Text(text.clone()),
			Content::Comment(comment) => Content::Comment(comment.clone()),
		};
		let clone = MemoryNode::new(content);
		for child in &data.children {
			let child = child.deep_clone();
			child.0.borrow_mut().parent = Rc::downgrade(&clone.0);
			clone.0.borrow_mut().children.push(child);
		}
		clone
	}
}

fn escape_into(html: &mut String, text: &str, in_attribute: bool) {
	for c in text.chars() {
		match c {
			'&' => html.push_str("&amp;"),
			'<' => html.push_str("&lt;"),
			'>' => html.push_str("&gt;"),
			'"' if in_attribute => html.push_str("&quot;"),
			c => html.push(c),
		}
	}
}

/// A native handler of the [`MemoryTree`], reporting to its [`Dispatcher`] as one [`ListenerId`].
#[derive(Clone)]
pub struct MemoryHandler {
	listener: ListenerId,
	dispatcher: Rc<Dispatcher>,
}
impl MemoryHandler {
	#[must_use]
	pub fn listener(&self) -> ListenerId {
		self.listener
	}
}
impl Debug for MemoryHandler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("MemoryHandler").field(&self.listener).finish()
	}
}

/// An in-process live tree.
///
/// It validates names and hierarchy roughly like a browser would,
/// and dispatches synthetic events through [`MemoryTree::dispatch_event`].
#[derive(Debug, Default)]
pub struct MemoryTree {
	created: usize,
}
impl MemoryTree {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// How many nodes this tree has created, not counting clones.
	#[must_use]
	pub fn created(&self) -> usize {
		self.created
	}

	/// Fires `event` at `target`, then at its ancestors if the event type bubbles.
	///
	/// Returns how many listeners the event was delivered to.
	///
	/// This doesn't borrow the tree, so listener callbacks are free to apply batches to it.
	#[instrument(skip(data))]
	pub fn dispatch_event(target: &MemoryNode, event: &str, data: &EventData) -> usize {
		let bubbles = events::bubbles(event);
		let mut delivered = 0;
		let mut current = Some(target.clone());
		while let Some(node) = current {
			let handlers: Vec<MemoryHandler> = node
				.0
				.borrow()
				.listeners
				.iter()
				.filter(|(name, _)| name == event)
				.map(|(_, handler)| handler.clone())
				.collect();
			for handler in handlers {
				let still_attached = node.0.borrow().listeners.iter().any(|(name, attached)| name == event && attached.listener == handler.listener);
				if !still_attached {
					trace!(listener = %handler.listener, "Skipping a listener that was removed during dispatch.");
					continue;
				}
				let span = trace_span!("Delivering", listener = %handler.listener, ?node);
				let _enter = span.enter();
				if handler.dispatcher.deliver(handler.listener, data.clone()) {
					delivered += 1;
				}
			}

			if !bubbles {
				break;
			}
			current = node.parent();
		}
		delivered
	}

	fn insertion_parent(operation: &'static str, reference: &MemoryNode, node: &MemoryNode) -> Result<MemoryNode, HostError> {
		let parent = reference.parent().ok_or_else(|| HostError::new(operation, "The reference node is detached."))?;
		check_hierarchy(operation, &parent, node)?;
		Ok(parent)
	}
}

fn check_name(operation: &'static str, name: &str) -> Result<(), HostError> {
	if name.is_empty() || name.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '/' | '"' | '\'' | '=')) {
		return Err(HostError::new(operation, format!("InvalidCharacterError: {:?} is not a valid name.", name)));
	}
	Ok(())
}

fn check_namespace(operation: &'static str, namespace: Option<&str>) -> Result<(), HostError> {
	if namespace == Some("") {
		return Err(HostError::new(operation, "NamespaceError: The namespace must not be empty."));
	}
	Ok(())
}

fn check_hierarchy(operation: &'static str, parent: &MemoryNode, child: &MemoryNode) -> Result<(), HostError> {
	if !parent.is_element() {
		return Err(HostError::new(operation, "HierarchyRequestError: Only elements can have children."));
	}
	if child.contains(parent) {
		return Err(HostError::new(operation, "HierarchyRequestError: The new child is an ancestor of the parent."));
	}
	Ok(())
}

fn position(parent: &MemoryNode, child: &MemoryNode, operation: &'static str) -> Result<usize, HostError> {
	parent
		.0
		.borrow()
		.children
		.iter()
		.position(|sibling| sibling == child)
		.ok_or_else(|| HostError::new(operation, "NotFoundError: The node is not a child of its parent."))
}

impl TreeHost for MemoryTree {
	type Node = MemoryNode;
	type Handler = MemoryHandler;

	fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> Result<MemoryNode, HostError> {
		check_name("createElement", tag)?;
		check_namespace("createElementNS", namespace)?;
		self.created += 1;
		Ok(MemoryNode::new(Content::Element {
			tag: tag.to_owned(),
			namespace: namespace.map(str::to_owned),
			attributes: Vec::new(),
		}))
	}

	fn create_text_node(&mut self, text: &str) -> MemoryNode {
		self.created += 1;
		MemoryNode::new(Content::Text(text.to_owned()))
	}

	fn create_placeholder(&mut self) -> MemoryNode {
		self.created += 1;
		MemoryNode::new(Content::Comment("placeholder".to_owned()))
	}

	fn append_child(&mut self, parent: &MemoryNode, child: &MemoryNode) -> Result<(), HostError> {
		check_hierarchy("appendChild", parent, child)?;
		child.detach();
		child.0.borrow_mut().parent = Rc::downgrade(&parent.0);
		parent.0.borrow_mut().children.push(child.clone());
		Ok(())
	}

	fn insert_before(&mut self, reference: &MemoryNode, node: &MemoryNode) -> Result<(), HostError> {
		if reference == node {
			return Ok(());
		}
		let parent = Self::insertion_parent("insertBefore", reference, node)?;
		node.detach();
		let index = position(&parent, reference, "insertBefore")?;
		parent.0.borrow_mut().children.insert(index, node.clone());
		node.0.borrow_mut().parent = Rc::downgrade(&parent.0);
		Ok(())
	}

	fn insert_after(&mut self, reference: &MemoryNode, node: &MemoryNode) -> Result<(), HostError> {
		if reference == node {
			return Ok(());
		}
		let parent = Self::insertion_parent("after", reference, node)?;
		node.detach();
		let index = position(&parent, reference, "after")?;
		parent.0.borrow_mut().children.insert(index + 1, node.clone());
		node.0.borrow_mut().parent = Rc::downgrade(&parent.0);
		Ok(())
	}

	fn replace_with(&mut self, old: &MemoryNode, replacements: &[MemoryNode]) -> Result<(), HostError> {
		let parent = old.parent().ok_or_else(|| HostError::new("replaceWith", "The replaced node is detached."))?;
		for node in replacements {
			check_hierarchy("replaceWith", &parent, node)?;
		}
		for node in replacements.iter().filter(|node| *node != old) {
			node.detach();
		}
		let index = position(&parent, old, "replaceWith")?;
		parent.0.borrow_mut().children.splice(index..=index, replacements.iter().cloned());
		if !replacements.contains(old) {
			old.0.borrow_mut().parent = Weak::new();
		}
		for node in replacements {
			node.0.borrow_mut().parent = Rc::downgrade(&parent.0);
		}
		Ok(())
	}

	fn remove(&mut self, node: &MemoryNode) -> Result<(), HostError> {
		node.detach();
		Ok(())
	}

	fn set_text(&mut self, node: &MemoryNode, text: &str) -> Result<(), HostError> {
		let mut data = node.0.borrow_mut();
		match &mut data.content {
			Content::Text(data) | Content::Comment(data) => {
				*data = text.to_owned();
				return Ok(());
			}
			Content::Element { .. } => (),
		}

		trace!("Replacing element children with a text node.");
		for child in data.children.drain(..) {
			child.0.borrow_mut().parent = Weak::new();
		}
		let text = MemoryNode::new(Content::Text(text.to_owned()));
		text.0.borrow_mut().parent = Rc::downgrade(&node.0);
		data.children.push(text);
		Ok(())
	}

	fn set_attribute(&mut self, node: &MemoryNode, name: &str, value: &str, namespace: Option<&str>) -> Result<(), HostError> {
		check_name("setAttribute", name)?;
		check_namespace("setAttributeNS", namespace)?;
		match &mut node.0.borrow_mut().content {
			Content::Element { attributes, .. } => {
				match attributes.iter_mut().find(|attribute| attribute.name == name && attribute.namespace.as_deref() == namespace) {
					Some(attribute) => value.clone_into(&mut attribute.value),
					None => attributes.push(MemoryAttribute {
						name: name.to_owned(),
						namespace: namespace.map(str::to_owned),
						value: value.to_owned(),
					}),
				}
				Ok(())
			}
			Content::Text(_) | Content::Comment(_) => Err(HostError::new("setAttribute", "Only elements have attributes.")),
		}
	}

	fn remove_attribute(&mut self, node: &MemoryNode, name: &str, namespace: Option<&str>) -> Result<(), HostError> {
		check_namespace("removeAttributeNS", namespace)?;
		match &mut node.0.borrow_mut().content {
			Content::Element { attributes, .. } => {
				attributes.retain(|attribute| !(attribute.name == name && attribute.namespace.as_deref() == namespace));
				Ok(())
			}
			Content::Text(_) | Content::Comment(_) => Err(HostError::new("removeAttribute", "Only elements have attributes.")),
		}
	}

	fn parent(&self, node: &MemoryNode) -> Option<MemoryNode> {
		node.parent()
	}

	fn children(&self, node: &MemoryNode) -> Vec<MemoryNode> {
		node.children()
	}

	fn deep_clone(&mut self, node: &MemoryNode) -> Result<MemoryNode, HostError> {
		Ok(node.deep_clone())
	}

	fn create_handler(&mut self, listener: ListenerId, dispatcher: &Rc<Dispatcher>) -> MemoryHandler {
		MemoryHandler {
			listener,
			dispatcher: Rc::clone(dispatcher),
		}
	}

	fn add_listener(&mut self, node: &MemoryNode, event: &str, handler: &MemoryHandler) -> Result<(), HostError> {
		check_name("addEventListener", event)?;
		node.0.borrow_mut().listeners.push((event.to_owned(), handler.clone()));
		Ok(())
	}

	fn remove_listener(&mut self, node: &MemoryNode, event: &str, handler: &MemoryHandler) -> Result<(), HostError> {
		let mut data = node.0.borrow_mut();
		if let Some(index) = data.listeners.iter().position(|(name, attached)| name == event && attached.listener == handler.listener) {
			data.listeners.remove(index);
		}
		Ok(())
	}
}
