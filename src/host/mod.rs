//! The live tree the [`Interpreter`](`crate::Interpreter`) mutates.
//!
//! [`MemoryTree`] is an in-process tree, for native use and for tests.
//! `WebTree` (`wasm32` only) drives a [***Document***](https://developer.mozilla.org/en-US/docs/Web/API/Document) through `web-sys`.

use crate::{events::Dispatcher, HostError, ListenerId};
use core::fmt::Debug;
use std::rc::Rc;

mod memory;
pub use memory::{MemoryAttribute, MemoryHandler, MemoryNode, MemoryTree};

#[cfg(target_arch = "wasm32")]
mod web;
#[cfg(target_arch = "wasm32")]
pub use web::WebTree;

/// Capabilities the runtime needs from a live tree.
///
/// Handles are cheap to clone and compare by node identity.
/// Moving a node that is already attached somewhere (by appending or inserting it) detaches it first.
pub trait TreeHost {
	type Node: Clone + PartialEq + Debug;

	/// A native event handler reporting to a [`Dispatcher`] under one [`ListenerId`].
	type Handler;

	/// # Errors
	///
	/// Iff the tag name or namespace is invalid.
	fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> Result<Self::Node, HostError>;
	fn create_text_node(&mut self, text: &str) -> Self::Node;
	fn create_placeholder(&mut self) -> Self::Node;

	/// # Errors
	///
	/// Iff `parent` can't have children or `child` is an ancestor of `parent`.
	fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError>;

	/// Inserts `node` as the previous sibling of `reference`.
	///
	/// # Errors
	///
	/// Iff `reference` is detached or the insertion would create a cycle.
	fn insert_before(&mut self, reference: &Self::Node, node: &Self::Node) -> Result<(), HostError>;

	/// Inserts `node` as the next sibling of `reference`.
	///
	/// # Errors
	///
	/// Iff `reference` is detached or the insertion would create a cycle.
	fn insert_after(&mut self, reference: &Self::Node, node: &Self::Node) -> Result<(), HostError>;

	/// Puts `replacements` where `old` is, in order, and detaches `old`.
	///
	/// # Errors
	///
	/// Iff `old` is detached or the insertion would create a cycle.
	fn replace_with(&mut self, old: &Self::Node, replacements: &[Self::Node]) -> Result<(), HostError>;

	/// Detaches `node` from its parent. Detached nodes are left alone.
	///
	/// # Errors
	///
	/// Iff the host refuses.
	fn remove(&mut self, node: &Self::Node) -> Result<(), HostError>;

	/// Sets the data of text and comment nodes, or replaces the children of an element with one text node.
	///
	/// # Errors
	///
	/// Iff the host refuses.
	fn set_text(&mut self, node: &Self::Node, text: &str) -> Result<(), HostError>;

	/// # Errors
	///
	/// Iff `node` isn't an element or `name` or `namespace` is invalid.
	fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str, namespace: Option<&str>) -> Result<(), HostError>;

	/// Removing an absent attribute is a no-op.
	///
	/// # Errors
	///
	/// Iff `node` isn't an element or `namespace` is invalid.
	fn remove_attribute(&mut self, node: &Self::Node, name: &str, namespace: Option<&str>) -> Result<(), HostError>;

	fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
	fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

	/// Clones `node` and its descendants, without event listeners. The clone is detached.
	///
	/// # Errors
	///
	/// Iff the host refuses.
	fn deep_clone(&mut self, node: &Self::Node) -> Result<Self::Node, HostError>;

	/// Creates the native handler that reports events to `dispatcher` as `listener`.
	fn create_handler(&mut self, listener: ListenerId, dispatcher: &Rc<Dispatcher>) -> Self::Handler;

	/// # Errors
	///
	/// Iff the host refuses.
	fn add_listener(&mut self, node: &Self::Node, event: &str, handler: &Self::Handler) -> Result<(), HostError>;

	/// # Errors
	///
	/// Iff the host refuses.
	fn remove_listener(&mut self, node: &Self::Node, event: &str, handler: &Self::Handler) -> Result<(), HostError>;
}
