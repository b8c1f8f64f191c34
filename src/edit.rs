use crate::{ListenerId, NodeId};
use std::borrow::Cow;

/// One operation of a mutation batch.
///
/// Batches are applied strictly in order by the [`Interpreter`](`crate::Interpreter`).
/// Operations that take a `count` pop that many nodes off its stack and use them **in push order**.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
	/// Pushes the node registered under `id`.
	PushRoot { id: NodeId },
	/// Pops and discards the top of the stack.
	PopRoot,
	/// Pops `count` nodes and appends them to the node that is then on top of the stack, which stays there.
	AppendChildren { count: usize },
	/// Pops `count` nodes and puts them where `id` was. `id` is unregistered.
	ReplaceWith { id: NodeId, count: usize },
	/// Pops `count` nodes and inserts them right after `id`.
	InsertAfter { id: NodeId, count: usize },
	/// Pops `count` nodes and inserts them right before `id`.
	InsertBefore { id: NodeId, count: usize },
	/// Detaches and unregisters `id`. Descendant IDs stay registered.
	Remove { id: NodeId },
	CreateElement { tag: String, id: NodeId },
	CreateElementNs { tag: String, id: NodeId, namespace: String },
	CreateTextNode { text: String, id: NodeId },
	/// Creates a comment marker that holds a place in the tree.
	CreatePlaceholder { id: NodeId },
	SetText { id: NodeId, text: String },
	/// [`AttributeValue::None`] removes the attribute.
	SetAttribute {
		id: NodeId,
		name: String,
		value: AttributeValue,
		namespace: Option<String>,
	},
	RemoveAttribute { id: NodeId, name: String, namespace: Option<String> },
	NewEventListener { id: NodeId, event: String, listener: ListenerId },
	RemoveEventListener { id: NodeId, event: String },
	/// Clones a saved template, registers its root under `id` and pushes it.
	LoadTemplate { name: String, index: u32, id: NodeId },
}
impl Edit {
	/// The operation's name, for logging.
	#[must_use]
	pub fn name(&self) -> &'static str {
		match self {
			Edit::PushRoot { .. } => "PushRoot",
			Edit::PopRoot => "PopRoot",
			Edit::AppendChildren { .. } => "AppendChildren",
			Edit::ReplaceWith { .. } => "ReplaceWith",
			Edit::InsertAfter { .. } => "InsertAfter",
			Edit::InsertBefore { .. } => "InsertBefore",
			Edit::Remove { .. } => "Remove",
			Edit::CreateElement { .. } => "CreateElement",
			Edit::CreateElementNs { .. } => "CreateElementNs",
			Edit::CreateTextNode { .. } => "CreateTextNode",
			Edit::CreatePlaceholder { .. } => "CreatePlaceholder",
			Edit::SetText { .. } => "SetText",
			Edit::SetAttribute { .. } => "SetAttribute",
			Edit::RemoveAttribute { .. } => "RemoveAttribute",
			Edit::NewEventListener { .. } => "NewEventListener",
			Edit::RemoveEventListener { .. } => "RemoveEventListener",
			Edit::LoadTemplate { .. } => "LoadTemplate",
		}
	}

	/// The node this operation addresses by ID, if any.
	#[must_use]
	pub fn target(&self) -> Option<NodeId> {
		match *self {
			Edit::PopRoot | Edit::AppendChildren { .. } => None,
			Edit::PushRoot { id }
			| Edit::ReplaceWith { id, .. }
			| Edit::InsertAfter { id, .. }
			| Edit::InsertBefore { id, .. }
			| Edit::Remove { id }
			| Edit::CreateElement { id, .. }
			| Edit::CreateElementNs { id, .. }
			| Edit::CreateTextNode { id, .. }
			| Edit::CreatePlaceholder { id }
			| Edit::SetText { id, .. }
			| Edit::SetAttribute { id, .. }
			| Edit::RemoveAttribute { id, .. }
			| Edit::NewEventListener { id, .. }
			| Edit::RemoveEventListener { id, .. }
			| Edit::LoadTemplate { id, .. } => Some(id),
		}
	}
}

/// Attribute values as produced by the application layer.
///
/// `None` is the removal sentinel. `Bool` follows HTML boolean attributes:
/// `true` sets an empty attribute and `false` removes it.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
	Text(String),
	Int(i64),
	Float(f64),
	Bool(bool),
	None,
}
impl AttributeValue {
	/// The string to set, or [`None`](`Option::None`) if the attribute should be removed.
	#[must_use]
	pub fn to_attribute_string(&self) -> Option<Cow<'_, str>> {
		match self {
			AttributeValue::Text(text) => Some(Cow::Borrowed(text)),
			AttributeValue::Int(int) => Some(Cow::Owned(int.to_string())),
			AttributeValue::Float(float) => Some(Cow::Owned(float.to_string())),
			AttributeValue::Bool(true) => Some(Cow::Borrowed("")),
			AttributeValue::Bool(false) | AttributeValue::None => None,
		}
	}
}
impl From<&str> for AttributeValue {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}
impl From<String> for AttributeValue {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}
impl From<i64> for AttributeValue {
	fn from(int: i64) -> Self {
		Self::Int(int)
	}
}
impl From<f64> for AttributeValue {
	fn from(float: f64) -> Self {
		Self::Float(float)
	}
}
impl From<bool> for AttributeValue {
	fn from(bool: bool) -> Self {
		Self::Bool(bool)
	}
}
impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::None, Into::into)
	}
}
