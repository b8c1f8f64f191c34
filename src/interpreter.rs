use crate::{
	events::EventBridge,
	shown,
	template::{self, Materialized},
	Edit, IdAllocator, InterpreterError, NodeId, NodeRegistry, TemplateInstance, TemplateStore, TreeHost,
};
use tracing::{error, instrument, trace, trace_span, warn};

/// Applies edit batches against a live tree, one operation at a time and strictly in order.
///
/// The interpreter is a stack machine: creation operations push the new node,
/// [`Edit::PushRoot`] pushes a registered one, and the operations taking a `count` pop that many.
/// The stack is empty between batches.
///
/// # Errors
///
/// The first failing operation aborts the rest of its batch.
/// Operations applied before it stay applied, and the stack is cleared.
pub struct Interpreter<'r, H: TreeHost> {
	pub(crate) host: &'r mut H,
	pub(crate) registry: &'r mut NodeRegistry<H::Node>,
	pub(crate) templates: &'r mut TemplateStore<H::Node>,
	pub(crate) bridge: &'r mut EventBridge<H>,
	pub(crate) ids: &'r mut IdAllocator,
	pub(crate) stack: &'r mut Vec<H::Node>,
	pub(crate) instances: &'r mut Vec<TemplateInstance>,
	pub(crate) warn_on_stack_leftovers: bool,
}
impl<'r, H: TreeHost> Interpreter<'r, H> {
	/// Applies `batch`.
	///
	/// # Errors
	///
	/// The error of the first failing operation, after which the batch is aborted.
	#[instrument(skip(self, batch), fields(len = batch.len()))]
	pub fn apply(&mut self, batch: &[Edit]) -> Result<(), InterpreterError> {
		let mut result = Ok(());
		for (position, edit) in batch.iter().enumerate() {
			let span = trace_span!("Applying", position, operation = edit.name(), target = ?edit.target());
			let _enter = span.enter();
			if let Err(error) = self.apply_one(edit) {
				error!("Aborted the batch at operation {} of {} ({}): {}", position, batch.len(), edit.name(), error);
				result = Err(error);
				break;
			}
		}

		if !self.stack.is_empty() {
			if result.is_ok() && self.warn_on_stack_leftovers {
				warn!("The batch left {} node(s) on the stack.", self.stack.len());
			}
			self.stack.clear();
		}
		self.bridge.collect();
		result
	}

	/// How many nodes are on the stack. This is zero outside of [`Interpreter::apply`].
	#[must_use]
	pub fn stack_len(&self) -> usize {
		self.stack.len()
	}

	#[allow(clippy::too_many_lines)]
	fn apply_one(&mut self, edit: &Edit) -> Result<(), InterpreterError> {
		match edit {
			&Edit::PushRoot { id } => {
				let node = self.registry.lookup(id)?.clone();
				self.stack.push(node);
			}

			Edit::PopRoot => {
				if self.stack.pop().is_none() {
					return Err(InterpreterError::StackUnderflow {
						operation: "PopRoot",
						needed: 1,
						available: 0,
					});
				}
			}

			&Edit::AppendChildren { count } => {
				let children = self.pop("AppendChildren", count, 1)?;
				let parent = self.stack.last().ok_or(InterpreterError::StackUnderflow {
					operation: "AppendChildren",
					needed: count.saturating_add(1),
					available: count,
				})?;
				for child in &children {
					self.host.append_child(parent, child)?;
				}
			}

			&Edit::ReplaceWith { id, count } => {
				if id.is_root() {
					return Err(InterpreterError::ReservedId(id));
				}
				let replacements = self.pop("ReplaceWith", count, 0)?;
				let old = self.registry.lookup(id)?.clone();
				self.bridge.detach_node(self.host, id, &old)?;
				self.host.replace_with(&old, &replacements)?;
				self.registry.unregister(id);
			}

			&Edit::InsertAfter { id, count } => {
				let inserted = self.pop("InsertAfter", count, 0)?;
				let mut anchor = self.registry.lookup(id)?.clone();
				for node in inserted {
					self.host.insert_after(&anchor, &node)?;
					anchor = node;
				}
			}

			&Edit::InsertBefore { id, count } => {
				let inserted = self.pop("InsertBefore", count, 0)?;
				let reference = self.registry.lookup(id)?.clone();
				for node in &inserted {
					self.host.insert_before(&reference, node)?;
				}
			}

			&Edit::Remove { id } => {
				if id.is_root() {
					return Err(InterpreterError::ReservedId(id));
				}
				let node = self.registry.lookup(id)?.clone();
				self.bridge.detach_node(self.host, id, &node)?;
				self.host.remove(&node)?;
				self.registry.unregister(id);
			}

			Edit::CreateElement { tag, id } => {
				self.check_vacant(*id)?;
				let element = self.host.create_element(tag, None)?;
				self.register_and_push(*id, element)?;
			}

			Edit::CreateElementNs { tag, id, namespace } => {
				self.check_vacant(*id)?;
				let element = self.host.create_element(tag, Some(namespace))?;
				self.register_and_push(*id, element)?;
			}

			Edit::CreateTextNode { text, id } => {
				self.check_vacant(*id)?;
				trace!(text = shown(text));
				let text = self.host.create_text_node(text);
				self.register_and_push(*id, text)?;
			}

			&Edit::CreatePlaceholder { id } => {
				self.check_vacant(id)?;
				let placeholder = self.host.create_placeholder();
				self.register_and_push(id, placeholder)?;
			}

			Edit::SetText { id, text } => {
				trace!(text = shown(text));
				let node = self.registry.lookup(*id)?;
				self.host.set_text(node, text)?;
			}

			Edit::SetAttribute { id, name, value, namespace } => {
				let node = self.registry.lookup(*id)?;
				template::set_attribute(self.host, node, name, value, namespace.as_deref())?;
			}

			Edit::RemoveAttribute { id, name, namespace } => {
				let node = self.registry.lookup(*id)?;
				self.host.remove_attribute(node, name, namespace.as_deref())?;
			}

			Edit::NewEventListener { id, event, listener } => {
				let node = self.registry.lookup(*id)?;
				self.bridge.attach(self.host, *id, node, event, *listener)?;
			}

			Edit::RemoveEventListener { id, event } => {
				let node = self.registry.lookup(*id)?;
				self.bridge.detach(self.host, *id, node, event)?;
			}

			Edit::LoadTemplate { name, index, id } => {
				self.check_vacant(*id)?;
				let (instance, root) = self.instantiate(name, *index, Some(*id))?;
				self.instances.push(instance);
				self.stack.push(root);
			}
		}
		Ok(())
	}

	fn pop(&mut self, operation: &'static str, count: usize, keep: usize) -> Result<Vec<H::Node>, InterpreterError> {
		let available = self.stack.len();
		match count.checked_add(keep) {
			Some(needed) if needed <= available => Ok(self.stack.split_off(available - count)),
			needed => Err(InterpreterError::StackUnderflow {
				operation,
				needed: needed.unwrap_or(usize::MAX),
				available,
			}),
		}
	}

	fn check_vacant(&self, id: NodeId) -> Result<(), InterpreterError> {
		if id.is_root() {
			Err(InterpreterError::ReservedId(id))
		} else if self.registry.contains(id) {
			Err(InterpreterError::DuplicateId(id))
		} else {
			Ok(())
		}
	}

	fn register_and_push(&mut self, id: NodeId, node: H::Node) -> Result<(), InterpreterError> {
		self.registry.register(id, node.clone())?;
		self.stack.push(node);
		Ok(())
	}

	/// Clones template `(name, index)`, registers every node it creates and attaches the template's listeners.
	///
	/// The root is registered under `root_id` if given, and every other node under a freshly allocated ID.
	#[instrument(skip(self))]
	pub(crate) fn instantiate(&mut self, name: &str, index: u32, root_id: Option<NodeId>) -> Result<(TemplateInstance, H::Node), InterpreterError> {
		let Materialized { root, root_local, nodes, listeners } = self.templates.materialize(self.host, name, index)?;

		let mut registered = Vec::with_capacity(nodes.len());
		for (local, node) in nodes {
			let id = match root_id {
				Some(root_id) if local == root_local => root_id,
				_ => {
					let registry = &*self.registry;
					self.ids.allocate(|candidate| candidate.is_root() || registry.contains(candidate))
				}
			};
			self.registry.register(id, node.clone())?;
			registered.push((local, id, node));
		}

		for (local, event, listener) in listeners {
			let (id, node) = registered
				.iter()
				.find(|(candidate, _, _)| candidate == local)
				.map(|(_, id, node)| (*id, node))
				.ok_or_else(|| InterpreterError::MalformedTemplate {
					name: name.to_owned(),
					index,
					reason: format!("listener target {} is not part of the template", local),
				})?;
			self.bridge.attach(self.host, id, node, event, *listener)?;
		}

		let instance = TemplateInstance {
			root: registered
				.iter()
				.find(|(local, _, _)| *local == root_local)
				.map(|(_, id, _)| *id)
				.ok_or_else(|| InterpreterError::MalformedTemplate {
					name: name.to_owned(),
					index,
					reason: "the root is missing".to_owned(),
				})?,
			nodes: registered.iter().map(|(local, id, _)| (*local, *id)).collect(),
		};
		trace!(root = %instance.root, nodes = instance.nodes.len(), "Instantiated.");
		Ok((instance, root))
	}
}
