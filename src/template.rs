use crate::{AttributeValue, Edit, HostError, InterpreterError, ListenerId, NodeId, TreeHost};
use hashbrown::{HashMap, HashSet};
use tracing::{debug, instrument, trace};

/// A saved template, checked and reduced to what each clone needs.
#[derive(Debug)]
struct Compiled {
	program: Vec<Edit>,
	/// The template-local ID of the root.
	root: NodeId,
	/// Child index paths from the root, for every template-local node including the root, in creation order.
	paths: Vec<(NodeId, Vec<usize>)>,
	/// Deep clones don't carry listeners, so these are attached to each clone.
	listeners: Vec<(NodeId, String, ListenerId)>,
}

#[derive(Debug)]
struct Template<N> {
	compiled: Compiled,
	prototype: Option<N>,
}

/// A fresh clone of a template, detached, with its template-local IDs still unresolved.
pub(crate) struct Materialized<'a, N> {
	pub root: N,
	pub root_local: NodeId,
	pub nodes: Vec<(NodeId, N)>,
	pub listeners: &'a [(NodeId, String, ListenerId)],
}

/// The IDs a template clone was registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInstance {
	pub root: NodeId,
	/// `(template-local ID, registered ID)` for every node the template's program created, in creation order.
	pub nodes: Vec<(NodeId, NodeId)>,
}
impl TemplateInstance {
	/// Resolves a template-local ID to the ID it was registered under in this instance.
	#[must_use]
	pub fn get(&self, local: NodeId) -> Option<NodeId> {
		self.nodes.iter().find(|(candidate, _)| *candidate == local).map(|&(_, id)| id)
	}
}

/// Reusable subtrees, keyed by `(name, index)`.
///
/// The first clone of a template builds a detached prototype in the host.
/// Every clone after that is a deep clone of the prototype.
#[derive(Debug)]
pub struct TemplateStore<N> {
	templates: HashMap<String, HashMap<u32, Template<N>>>,
}
impl<N> Default for TemplateStore<N> {
	fn default() -> Self {
		Self::new()
	}
}
impl<N> TemplateStore<N> {
	#[must_use]
	pub fn new() -> Self {
		Self { templates: HashMap::new() }
	}

	/// Saves `program` as template `(name, index)`, replacing any previous one and its prototype.
	///
	/// Programs may only create nodes, move them on the stack, assemble them, set their text and attributes and attach listeners.
	/// IDs inside a program are local to it. A program must leave exactly one root on its stack,
	/// and every node it creates must end up inside that root.
	///
	/// # Errors
	///
	/// [`InterpreterError::MalformedTemplate`] iff the program breaks these rules.
	#[instrument(skip(self, program), fields(len = program.len()))]
	pub fn save(&mut self, name: &str, index: u32, program: Vec<Edit>) -> Result<(), InterpreterError> {
		let compiled = compile(name, index, program)?;
		let replaced = self
			.templates
			.entry_ref(name)
			.or_default()
			.insert(index, Template { compiled, prototype: None });
		if replaced.is_some() {
			debug!("Replaced an existing template.");
		}
		Ok(())
	}

	#[must_use]
	pub fn contains(&self, name: &str, index: u32) -> bool {
		self.get(name, index).is_some()
	}

	/// The saved program of a template.
	#[must_use]
	pub fn program(&self, name: &str, index: u32) -> Option<&[Edit]> {
		self.get(name, index).map(|template| template.compiled.program.as_slice())
	}

	/// Whether the template's prototype has been built already.
	#[must_use]
	pub fn is_prepared(&self, name: &str, index: u32) -> bool {
		self.get(name, index).map_or(false, |template| template.prototype.is_some())
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.templates.values().map(HashMap::len).sum()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Forgets all templates and prototypes.
	pub fn clear(&mut self) {
		self.templates.clear();
	}

	fn get(&self, name: &str, index: u32) -> Option<&Template<N>> {
		self.templates.get(name).and_then(|by_index| by_index.get(&index))
	}

	/// Clones the template, building its prototype first if needed.
	pub(crate) fn materialize<H: TreeHost<Node = N>>(&mut self, host: &mut H, name: &str, index: u32) -> Result<Materialized<'_, N>, InterpreterError>
	where
		N: Clone + PartialEq + core::fmt::Debug,
	{
		let template = self
			.templates
			.get_mut(name)
			.and_then(|by_index| by_index.get_mut(&index))
			.ok_or_else(|| InterpreterError::TemplateNotFound { name: name.to_owned(), index })?;

		let prototype = match &mut template.prototype {
			Some(prototype) => prototype,
			slot @ None => {
				trace!("Building the template prototype.");
				slot.insert(build(host, name, index, &template.compiled.program)?)
			}
		};

		let root = host.deep_clone(prototype)?;
		let mut nodes = Vec::with_capacity(template.compiled.paths.len());
		for (local, path) in &template.compiled.paths {
			let mut node = root.clone();
			for &child_index in path {
				node = host
					.children(&node)
					.into_iter()
					.nth(child_index)
					.ok_or_else(|| HostError::new("cloneNode", "The clone doesn't have the shape of its template."))?;
			}
			nodes.push((*local, node));
		}

		Ok(Materialized {
			root,
			root_local: template.compiled.root,
			nodes,
			listeners: &template.compiled.listeners,
		})
	}
}

#[allow(clippy::too_many_lines)]
fn compile(name: &str, index: u32, program: Vec<Edit>) -> Result<Compiled, InterpreterError> {
	fn detach(parents: &mut HashMap<NodeId, NodeId>, children: &mut HashMap<NodeId, Vec<Option<NodeId>>>, id: NodeId) {
		if let Some(parent) = parents.remove(&id) {
			if let Some(siblings) = children.get_mut(&parent) {
				siblings.retain(|&sibling| sibling != Some(id));
			}
		}
	}

	let malformed = |reason: String| InterpreterError::MalformedTemplate {
		name: name.to_owned(),
		index,
		reason,
	};

	let mut created = Vec::<NodeId>::new();
	let mut elements = HashSet::<NodeId>::new();
	let mut parents = HashMap::<NodeId, NodeId>::new();
	// `None` stands for a text node the host creates when an element's text is set.
	let mut children = HashMap::<NodeId, Vec<Option<NodeId>>>::new();
	let mut stack = Vec::<NodeId>::new();
	let mut listeners = Vec::new();
	let mut listened = HashSet::<(NodeId, &str)>::new();

	for (position, edit) in program.iter().enumerate() {
		let known = |id: NodeId| {
			if created.contains(&id) {
				Ok(id)
			} else {
				Err(malformed(format!("{} at {} uses {}, which the template doesn't create", edit.name(), position, id)))
			}
		};
		match edit {
			Edit::CreateElement { id, .. } | Edit::CreateElementNs { id, .. } | Edit::CreateTextNode { id, .. } | Edit::CreatePlaceholder { id } => {
				if created.contains(id) {
					return Err(malformed(format!("{} is created twice", id)));
				}
				created.push(*id);
				if matches!(edit, Edit::CreateElement { .. } | Edit::CreateElementNs { .. }) {
					elements.insert(*id);
					children.insert(*id, Vec::new());
				}
				stack.push(*id);
			}
			Edit::PushRoot { id } => stack.push(known(*id)?),
			Edit::PopRoot => {
				if stack.pop().is_none() {
					return Err(malformed(format!("PopRoot at {} on an empty stack", position)));
				}
			}
			&Edit::AppendChildren { count } => {
				if stack.len() <= count {
					return Err(malformed(format!("AppendChildren at {} needs {} node(s) on the stack, but there are only {}", position, count.saturating_add(1), stack.len())));
				}
				let appended = stack.split_off(stack.len() - count);
				let parent = stack[stack.len() - 1];
				if !elements.contains(&parent) {
					return Err(malformed(format!("AppendChildren at {} targets {}, which is not an element", position, parent)));
				}
				for child in appended {
					let mut ancestor = Some(parent);
					while let Some(current) = ancestor {
						if current == child {
							return Err(malformed(format!("AppendChildren at {} would make {} its own descendant", position, child)));
						}
						ancestor = parents.get(&current).copied();
					}
					detach(&mut parents, &mut children, child);
					parents.insert(child, parent);
					children.entry(parent).or_default().push(Some(child));
				}
			}
			Edit::SetText { id, .. } => {
				let id = known(*id)?;
				if let Some(replaced) = children.get_mut(&id) {
					for child in replaced.drain(..).flatten() {
						parents.remove(&child);
					}
					replaced.push(None);
				}
			}
			Edit::SetAttribute { id, .. } | Edit::RemoveAttribute { id, .. } => {
				let id = known(*id)?;
				if !elements.contains(&id) {
					return Err(malformed(format!("{} at {} targets {}, which is not an element", edit.name(), position, id)));
				}
			}
			Edit::NewEventListener { id, event, listener } => {
				let id = known(*id)?;
				if !listened.insert((id, event.as_str())) {
					return Err(malformed(format!("{} has two {:?} listeners", id, event)));
				}
				listeners.push((id, event.clone(), *listener));
			}
			Edit::ReplaceWith { .. } | Edit::InsertAfter { .. } | Edit::InsertBefore { .. } | Edit::Remove { .. } | Edit::RemoveEventListener { .. } | Edit::LoadTemplate { .. } => {
				return Err(malformed(format!("{} at {} is not allowed in templates", edit.name(), position)))
			}
		}
	}

	let root = match stack.as_slice() {
		&[root] => root,
		rest => return Err(malformed(format!("the program leaves {} node(s) on the stack instead of one", rest.len()))),
	};
	if parents.contains_key(&root) {
		return Err(malformed(format!("the root {} is a child of another node", root)));
	}

	let mut paths = Vec::with_capacity(created.len());
	for &id in &created {
		let mut path = Vec::new();
		let mut current = id;
		while current != root {
			let parent = parents
				.get(&current)
				.copied()
				.ok_or_else(|| malformed(format!("{} is not inside the root {}", id, root)))?;
			let position = children
				.get(&parent)
				.and_then(|siblings| siblings.iter().position(|&sibling| sibling == Some(current)))
				.ok_or_else(|| malformed(format!("{} is missing from its parent", current)))?;
			path.push(position);
			current = parent;
		}
		path.reverse();
		paths.push((id, path));
	}

	drop(listened);
	Ok(Compiled { program, root, paths, listeners })
}

/// Runs a compiled program against the host, leaving out listeners.
fn build<H: TreeHost>(host: &mut H, name: &str, index: u32, program: &[Edit]) -> Result<H::Node, InterpreterError> {
	let malformed = |reason: &str| InterpreterError::MalformedTemplate {
		name: name.to_owned(),
		index,
		reason: reason.to_owned(),
	};

	let mut nodes = HashMap::<NodeId, H::Node>::new();
	let mut stack = Vec::<H::Node>::new();
	for edit in program {
		let node = |id: &NodeId| nodes.get(id).cloned().ok_or_else(|| malformed("unknown template-local ID"));
		match edit {
			Edit::CreateElement { tag, id } => {
				let element = host.create_element(tag, None)?;
				nodes.insert(*id, element.clone());
				stack.push(element);
			}
			Edit::CreateElementNs { tag, id, namespace } => {
				let element = host.create_element(tag, Some(namespace))?;
				nodes.insert(*id, element.clone());
				stack.push(element);
			}
			Edit::CreateTextNode { text, id } => {
				let text = host.create_text_node(text);
				nodes.insert(*id, text.clone());
				stack.push(text);
			}
			Edit::CreatePlaceholder { id } => {
				let placeholder = host.create_placeholder();
				nodes.insert(*id, placeholder.clone());
				stack.push(placeholder);
			}
			Edit::PushRoot { id } => stack.push(node(id)?),
			Edit::PopRoot => {
				stack.pop();
			}
			&Edit::AppendChildren { count } => {
				let appended = stack.split_off(stack.len().saturating_sub(count));
				let parent = stack.last().ok_or_else(|| malformed("AppendChildren without parent"))?;
				for child in &appended {
					host.append_child(parent, child)?;
				}
			}
			Edit::SetText { id, text } => host.set_text(&node(id)?, text)?,
			Edit::SetAttribute { id, name, value, namespace } => set_attribute(host, &node(id)?, name, value, namespace.as_deref())?,
			Edit::RemoveAttribute { id, name, namespace } => host.remove_attribute(&node(id)?, name, namespace.as_deref())?,
			Edit::NewEventListener { .. } => (),
			Edit::ReplaceWith { .. } | Edit::InsertAfter { .. } | Edit::InsertBefore { .. } | Edit::Remove { .. } | Edit::RemoveEventListener { .. } | Edit::LoadTemplate { .. } => {
				return Err(malformed("non-constructive operation"))
			}
		}
	}
	stack.pop().ok_or_else(|| malformed("no root"))
}

/// Sets or removes an attribute according to [`AttributeValue::to_attribute_string`].
pub(crate) fn set_attribute<H: TreeHost>(host: &mut H, node: &H::Node, name: &str, value: &AttributeValue, namespace: Option<&str>) -> Result<(), HostError> {
	match value.to_attribute_string() {
		Some(value) => host.set_attribute(node, name, &value, namespace),
		None => host.remove_attribute(node, name, namespace),
	}
}
