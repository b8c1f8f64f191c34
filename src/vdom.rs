//! Virtual nodes, as compared by [`diff`](`crate::diff`).
//!
//! Each virtual node remembers the [`NodeId`] it is mounted under once it has been diffed.
//! Keep the previous tree around unchanged to diff the next one against it.

use crate::{AttributeValue, ListenerId, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
	Element(VElement),
	Text(VText),
	/// Holds a place among siblings, for example for content that is currently absent.
	Placeholder(VPlaceholder),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VElement {
	pub tag: String,
	pub namespace: Option<String>,
	/// Siblings are matched by key instead of position if all of them have one.
	pub key: Option<String>,
	pub attributes: Vec<VAttribute>,
	pub listeners: Vec<VListener>,
	pub children: Vec<VNode>,
	pub id: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VText {
	pub text: String,
	pub id: Option<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VPlaceholder {
	pub id: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VAttribute {
	pub name: String,
	pub namespace: Option<String>,
	pub value: AttributeValue,
}

/// At most one listener per event type is supported on each element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VListener {
	pub event: String,
	pub listener: ListenerId,
}

impl VNode {
	#[must_use]
	pub fn element(tag: impl Into<String>) -> VElement {
		VElement {
			tag: tag.into(),
			namespace: None,
			key: None,
			attributes: Vec::new(),
			listeners: Vec::new(),
			children: Vec::new(),
			id: None,
		}
	}

	#[must_use]
	pub fn text(text: impl Into<String>) -> Self {
		Self::Text(VText { text: text.into(), id: None })
	}

	#[must_use]
	pub fn placeholder() -> Self {
		Self::Placeholder(VPlaceholder::default())
	}

	/// The ID this node is mounted under, if it has been diffed.
	#[must_use]
	pub fn id(&self) -> Option<NodeId> {
		match self {
			VNode::Element(element) => element.id,
			VNode::Text(text) => text.id,
			VNode::Placeholder(placeholder) => placeholder.id,
		}
	}

	pub(crate) fn set_id(&mut self, id: NodeId) {
		match self {
			VNode::Element(element) => element.id = Some(id),
			VNode::Text(text) => text.id = Some(id),
			VNode::Placeholder(placeholder) => placeholder.id = Some(id),
		}
	}

	#[must_use]
	pub fn key(&self) -> Option<&str> {
		match self {
			VNode::Element(element) => element.key.as_deref(),
			VNode::Text(_) | VNode::Placeholder(_) => None,
		}
	}

	#[must_use]
	pub fn children(&self) -> &[VNode] {
		match self {
			VNode::Element(element) => &element.children,
			VNode::Text(_) | VNode::Placeholder(_) => &[],
		}
	}

	/// A short description for logging and errors.
	#[must_use]
	pub fn kind(&self) -> &'static str {
		match self {
			VNode::Element(_) => "element",
			VNode::Text(_) => "text",
			VNode::Placeholder(_) => "placeholder",
		}
	}
}

impl VElement {
	#[must_use]
	pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = Some(namespace.into());
		self
	}

	#[must_use]
	pub fn key(mut self, key: impl Into<String>) -> Self {
		self.key = Some(key.into());
		self
	}

	#[must_use]
	pub fn attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
		self.attributes.push(VAttribute {
			name: name.into(),
			namespace: None,
			value: value.into(),
		});
		self
	}

	#[must_use]
	pub fn attribute_ns(mut self, namespace: impl Into<String>, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
		self.attributes.push(VAttribute {
			name: name.into(),
			namespace: Some(namespace.into()),
			value: value.into(),
		});
		self
	}

	#[must_use]
	pub fn listener(mut self, event: impl Into<String>, listener: impl Into<ListenerId>) -> Self {
		self.listeners.push(VListener {
			event: event.into(),
			listener: listener.into(),
		});
		self
	}

	#[must_use]
	pub fn child(mut self, child: impl Into<VNode>) -> Self {
		self.children.push(child.into());
		self
	}

	#[must_use]
	pub fn children<I: IntoIterator>(mut self, children: I) -> Self
	where
		I::Item: Into<VNode>,
	{
		self.children.extend(children.into_iter().map(Into::into));
		self
	}
}

impl From<VElement> for VNode {
	fn from(element: VElement) -> Self {
		Self::Element(element)
	}
}
impl From<VText> for VNode {
	fn from(text: VText) -> Self {
		Self::Text(text)
	}
}
impl From<VPlaceholder> for VNode {
	fn from(placeholder: VPlaceholder) -> Self {
		Self::Placeholder(placeholder)
	}
}
impl From<&str> for VNode {
	fn from(text: &str) -> Self {
		Self::text(text)
	}
}
impl From<String> for VNode {
	fn from(text: String) -> Self {
		Self::text(text)
	}
}
