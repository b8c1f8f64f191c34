//! Tagged event listeners.
//!
//! Every [`ListenerId`] gets exactly one native handler, shared by all nodes and event types it is attached to
//! and reference-counted by attachment. Native handlers report `(ListenerId, EventData)` to a [`Dispatcher`],
//! which forwards to the callback registered with [`Runtime::register_listener_callback`](`crate::Runtime::register_listener_callback`).

use crate::{
	rc_hash_map::{CountSaturatedError, RcHashMap},
	HostError, InterpreterError, ListenerId, NodeId, NodeRegistry, TreeHost,
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, info, instrument, level_filters::STATIC_MAX_LEVEL, trace, warn, Level};

mod data;
pub use data::*;

#[cfg(target_arch = "wasm32")]
pub(crate) mod web;

/// Receives every delivered event.
pub type ListenerCallback = Box<dyn FnMut(ListenerId, EventData)>;

/// Forwards events from native handlers to the registered [`ListenerCallback`].
///
/// Events for listener IDs that aren't attached anywhere anymore are dropped.
/// So are events that arrive while the callback is already running.
#[derive(Default)]
pub struct Dispatcher {
	live: RefCell<HashSet<ListenerId>>,
	callback: RefCell<Option<ListenerCallback>>,
	delivering: Cell<bool>,
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dispatcher")
			.field("live", &self.live.borrow().len())
			.field("has_callback", &self.callback.borrow().is_some())
			.field("delivering", &self.delivering.get())
			.finish()
	}
}
impl Dispatcher {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the callback, returning the previous one.
	///
	/// When called from inside the callback, the replacement takes effect after the current delivery.
	pub fn set_callback(&self, callback: ListenerCallback) -> Option<ListenerCallback> {
		self.callback.borrow_mut().replace(callback)
	}

	pub fn clear_callback(&self) -> Option<ListenerCallback> {
		self.callback.borrow_mut().take()
	}

	#[must_use]
	pub fn is_live(&self, listener: ListenerId) -> bool {
		self.live.borrow().contains(&listener)
	}

	/// Reports one event. Returns whether the callback was called.
	#[instrument(skip(self, data))]
	pub fn deliver(&self, listener: ListenerId, data: EventData) -> bool {
		if !self.is_live(listener) {
			trace!("Dropped an event for a listener that is no longer attached.");
			return false;
		}
		if self.delivering.get() {
			warn!("Dropped a nested event delivery. The listener callback is already running.");
			return false;
		}

		let callback = match self.callback.borrow_mut().take() {
			Some(callback) => callback,
			None => {
				warn!("No listener callback is registered.");
				return false;
			}
		};
		let mut delivery = Delivery::new(self, callback);
		if let Some(callback) = delivery.callback.as_mut() {
			callback(listener, data);
		}
		true
	}

	fn mark_live(&self, listener: ListenerId) {
		self.live.borrow_mut().insert(listener);
	}

	fn mark_dead(&self, listener: ListenerId) {
		self.live.borrow_mut().remove(&listener);
	}
}

/// Marks a [`Dispatcher`] as delivering and hands its callback back when dropped, also while unwinding.
struct Delivery<'a> {
	dispatcher: &'a Dispatcher,
	callback: Option<ListenerCallback>,
}
impl<'a> Delivery<'a> {
	fn new(dispatcher: &'a Dispatcher, callback: ListenerCallback) -> Self {
		dispatcher.delivering.set(true);
		Self {
			dispatcher,
			callback: Some(callback),
		}
	}
}
impl Drop for Delivery<'_> {
	fn drop(&mut self) {
		self.dispatcher.delivering.set(false);
		let mut slot = self.dispatcher.callback.borrow_mut();
		if slot.is_none() {
			*slot = self.callback.take();
		}
	}
}

/// Owns the native handlers and remembers which listeners are attached to which nodes.
///
/// There is at most one listener per node and event type.
pub struct EventBridge<H: TreeHost> {
	dispatcher: Rc<Dispatcher>,
	handlers: RcHashMap<ListenerId, u16, H::Handler>,
	attached: HashMap<NodeId, Vec<(String, ListenerId)>>,
}
impl<H: TreeHost> Debug for EventBridge<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBridge")
			.field("dispatcher", &self.dispatcher)
			.field("handlers", &self.handlers.len())
			.field("attached", &self.attached)
			.finish()
	}
}
impl<H: TreeHost> Default for EventBridge<H> {
	fn default() -> Self {
		Self::new()
	}
}
impl<H: TreeHost> EventBridge<H> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			dispatcher: Rc::new(Dispatcher::new()),
			handlers: RcHashMap::new(),
			attached: HashMap::new(),
		}
	}

	#[must_use]
	pub fn dispatcher(&self) -> &Rc<Dispatcher> {
		&self.dispatcher
	}

	/// Attaches `listener` to `node` (registered as `id`) for `event`.
	///
	/// # Errors
	///
	/// [`InterpreterError::DuplicateListener`] iff `id` already has a listener for `event`,
	/// [`InterpreterError::HostApi`] iff the host refuses.
	#[instrument(skip(self, host, node))]
	pub fn attach(&mut self, host: &mut H, id: NodeId, node: &H::Node, event: &str, listener: ListenerId) -> Result<(), InterpreterError> {
		if self.attached.get(&id).map_or(false, |listeners| listeners.iter().any(|(attached, _)| attached == event)) {
			return Err(InterpreterError::DuplicateListener { node: id, event: event.to_owned() });
		}

		let dispatcher = &self.dispatcher;
		let handler = self
			.handlers
			.increment_or_insert_with(listener, |&listener| host.create_handler(listener, dispatcher))
			.map_err(|CountSaturatedError| HostError::new("addEventListener", "Too many (more than 65k) attachments of the same listener ID."))?;
		if let Err(error) = host.add_listener(node, event, handler) {
			self.decrement(listener);
			return Err(error.into());
		}

		self.dispatcher.mark_live(listener);
		self.attached.entry(id).or_default().push((event.to_owned(), listener));
		trace!("Attached.");
		Ok(())
	}

	/// Detaches the `event` listener of `node` (registered as `id`). A missing listener is ignored.
	///
	/// # Errors
	///
	/// Iff the host refuses.
	#[instrument(skip(self, host, node))]
	pub fn detach(&mut self, host: &mut H, id: NodeId, node: &H::Node, event: &str) -> Result<(), InterpreterError> {
		let listeners = match self.attached.get_mut(&id) {
			Some(listeners) => listeners,
			None => {
				debug!("No listeners attached.");
				return Ok(());
			}
		};
		let listener = match listeners.iter().position(|(attached, _)| attached == event) {
			Some(index) => listeners.remove(index).1,
			None => {
				debug!("No such listener attached.");
				return Ok(());
			}
		};
		if listeners.is_empty() {
			self.attached.remove(&id);
		}
		self.release(host, node, event, listener)
	}

	/// Detaches every listener of `node` (registered as `id`).
	///
	/// # Errors
	///
	/// Iff the host refuses. Remaining listeners of the node are forgotten regardless.
	pub fn detach_node(&mut self, host: &mut H, id: NodeId, node: &H::Node) -> Result<(), InterpreterError> {
		let listeners = match self.attached.remove(&id) {
			Some(listeners) => listeners,
			None => return Ok(()),
		};
		trace!(%id, count = listeners.len(), "Detaching all listeners of a node.");
		let mut result = Ok(());
		for (event, listener) in listeners {
			let released = self.release(host, node, &event, listener);
			if result.is_ok() {
				result = released;
			}
		}
		result
	}

	fn release(&mut self, host: &mut H, node: &H::Node, event: &str, listener: ListenerId) -> Result<(), InterpreterError> {
		let result = match self.handlers.weak_decrement(&listener) {
			Ok(Some(handler)) => host.remove_listener(node, event, handler).map_err(Into::into),
			Ok(None) | Err(CountSaturatedError) => {
				warn!(%listener, "Listener bookkeeping is out of sync.");
				Ok(())
			}
		};
		if !self.handlers.is_strong(&listener) {
			self.dispatcher.mark_dead(listener);
		}
		result
	}

	fn decrement(&mut self, listener: ListenerId) {
		if self.handlers.weak_decrement(&listener).is_err() {
			warn!(%listener, "Listener bookkeeping is out of sync.");
		}
		if !self.handlers.is_strong(&listener) {
			self.dispatcher.mark_dead(listener);
		}
	}

	/// The `(event, listener)` pairs attached to `id`, in attachment order.
	#[must_use]
	pub fn listeners_of(&self, id: NodeId) -> &[(String, ListenerId)] {
		self.attached.get(&id).map_or(&[], Vec::as_slice)
	}

	/// How many listener IDs currently have a native handler.
	#[must_use]
	pub fn handler_count(&self) -> usize {
		self.handlers.len()
	}

	/// How many `(node, event)` attachments there are.
	#[must_use]
	pub fn attachment_count(&self) -> usize {
		self.attached.values().map(Vec::len).sum()
	}

	/// Drops the native handlers of listener IDs that aren't attached anywhere anymore.
	///
	/// Called once per batch, so that a listener ID that is detached and re-attached within one batch keeps its handler.
	pub fn collect(&mut self) -> usize {
		let freed = self.handlers.drain_weak().count();
		if freed > 0 {
			trace!("Freed {} event handler(s).", freed);
		}
		if STATIC_MAX_LEVEL >= Level::INFO {
			info!("Event handler count/cached capacity: {}/{}", self.handlers.len(), self.handlers.capacity());
		}
		freed
	}

	/// Detaches everything, drops all handlers and the callback.
	pub fn shutdown(&mut self, host: &mut H, registry: &NodeRegistry<H::Node>) {
		for (id, listeners) in self.attached.drain() {
			let node = match registry.get(id) {
				Some(node) => node,
				None => {
					warn!(%id, "Node with attached listeners is not registered anymore.");
					continue;
				}
			};
			for (event, listener) in listeners {
				if let Some(handler) = self.handlers.get(&listener) {
					if let Err(error) = host.remove_listener(node, &event, handler) {
						warn!(%id, %listener, "Could not remove listener during shutdown: {}", error);
					}
				}
			}
		}
		let dropped = self.handlers.drain().count();
		trace!("Dropped {} event handler(s).", dropped);
		self.dispatcher.live.borrow_mut().clear();
		self.dispatcher.clear_callback();
	}
}
