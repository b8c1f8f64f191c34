//! Reduces two virtual trees to an edit batch.
//!
//! Nodes of the new tree that correspond to nodes of the old one take over their [`NodeId`]s.
//! Everything else gets a fresh ID from the [`IdAllocator`], and IDs of removed nodes go back into its quarantine.
//!
//! Removal is explicit: a removed subtree produces one [`Edit::Remove`] per node, the subtree root first,
//! so that every ID is unregistered and every listener detached.

use crate::{
	temp_set::TempListenerSet,
	vdom::{VAttribute, VElement, VListener, VNode},
	DiffError, Edit, IdAllocator, NodeId,
};
use hashbrown::{HashMap, HashSet};
use tracing::{error, info, instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, warn, Level};

/// Diffs virtual trees. Keeps scratch space across calls.
#[derive(Debug)]
pub struct Differ {
	listener_diff_set: TempListenerSet,
	depth_limit: usize,
}

/// The state of one diff.
struct Pass<'a, F: Fn(NodeId) -> bool> {
	ids: &'a mut IdAllocator,
	in_use: F,
	listener_diff_set: &'a mut TempListenerSet,
	edits: Vec<Edit>,
}

impl Differ {
	/// Recursion stops `depth_limit` levels below the diffed parent.
	#[must_use]
	pub fn new(depth_limit: usize) -> Self {
		Self {
			listener_diff_set: TempListenerSet::new(),
			depth_limit,
		}
	}

	#[must_use]
	pub fn depth_limit(&self) -> usize {
		self.depth_limit
	}

	/// Produces the edits that turn the children of `parent` from `old` into `new`,
	/// and mounts `new` on the way.
	///
	/// `in_use` reports IDs that must not be allocated, usually the registered ones.
	///
	/// # Errors
	///
	/// [`DiffError::DuplicateKey`] iff keyed siblings share a key,
	/// [`DiffError::Unmounted`] iff a node of `old` has no ID.
	#[instrument(skip(self, ids, in_use, old, new))]
	pub fn diff_children(&mut self, ids: &mut IdAllocator, in_use: impl Fn(NodeId) -> bool, parent: NodeId, old: &[VNode], new: &mut [VNode]) -> Result<Vec<Edit>, DiffError> {
		let mut pass = Pass {
			ids,
			in_use,
			listener_diff_set: &mut self.listener_diff_set,
			edits: Vec::new(),
		};
		pass.diff_children(parent, old, new, self.depth_limit)?;
		let edits = pass.edits;

		info!("Diff produced {} edit(s).", edits.len());
		info!("Diff heap capacity (listeners): {}", self.listener_diff_set.capacity());
		if STATIC_MAX_LEVEL >= Level::WARN && self.listener_diff_set.capacity() >= 100 {
			warn!(
				"The listener diff heap capacity is large ({}).\n\
				This may point to inefficient (unstably ordered) use of listeners.",
				self.listener_diff_set.capacity()
			)
		}
		Ok(edits)
	}
}

fn mounted(node: &VNode) -> Result<NodeId, DiffError> {
	node.id().ok_or_else(|| DiffError::Unmounted(node.kind()))
}

fn check_keys(children: &[VNode]) -> Result<(), DiffError> {
	let mut seen = HashSet::with_capacity(children.len());
	for key in children.iter().filter_map(VNode::key) {
		if !seen.insert(key) {
			return Err(DiffError::DuplicateKey(key.to_owned()));
		}
	}
	Ok(())
}

fn same_kind(old: &VNode, new: &VNode) -> bool {
	match (old, new) {
		(VNode::Element(old), VNode::Element(new)) => old.tag == new.tag && old.namespace == new.namespace && old.key == new.key,
		(VNode::Text(_), VNode::Text(_)) | (VNode::Placeholder(_), VNode::Placeholder(_)) => true,
		_ => false,
	}
}

impl<'a, F: Fn(NodeId) -> bool> Pass<'a, F> {
	fn allocate(&mut self) -> NodeId {
		let in_use = &self.in_use;
		self.ids.allocate(|id| id.is_root() || in_use(id))
	}

	fn diff_children(&mut self, parent: NodeId, old: &[VNode], new: &mut [VNode], depth_limit: usize) -> Result<(), DiffError> {
		if depth_limit == 0 {
			error!("Depth limit reached");
			return Ok(());
		}
		check_keys(new)?;

		if old.is_empty() {
			if !new.is_empty() {
				self.append(parent, new, depth_limit)?;
			}
			return Ok(());
		}
		if new.is_empty() {
			for old in old {
				self.remove(old)?;
			}
			return Ok(());
		}

		if old.iter().all(|node| node.key().is_some()) && new.iter().all(|node| node.key().is_some()) {
			check_keys(old)?;
			self.diff_keyed(parent, old, new, depth_limit)
		} else {
			self.diff_unkeyed(old, new, depth_limit)
		}
	}

	fn diff_unkeyed(&mut self, old: &[VNode], new: &mut [VNode], depth_limit: usize) -> Result<(), DiffError> {
		let common = old.len().min(new.len());
		for (old, new) in old.iter().zip(new.iter_mut()) {
			self.patch(old, new, depth_limit)?;
		}

		for old in &old[common..] {
			self.remove(old)?;
		}

		if new.len() > common {
			let anchor = mounted(&new[common - 1])?;
			let count = self.create_all(&mut new[common..], depth_limit)?;
			self.edits.push(Edit::InsertAfter { id: anchor, count });
		}
		Ok(())
	}

	#[allow(clippy::too_many_lines)]
	fn diff_keyed(&mut self, parent: NodeId, old: &[VNode], new: &mut [VNode], depth_limit: usize) -> Result<(), DiffError> {
		let mut start = 0;
		while start < old.len() && start < new.len() && old[start].key() == new[start].key() {
			self.patch(&old[start], &mut new[start], depth_limit)?;
			start += 1;
		}

		let mut old_end = old.len();
		let mut new_end = new.len();
		while old_end > start && new_end > start && old[old_end - 1].key() == new[new_end - 1].key() {
			self.patch(&old[old_end - 1], &mut new[new_end - 1], depth_limit)?;
			old_end -= 1;
			new_end -= 1;
		}

		let old_middle = &old[start..old_end];
		if start == new_end {
			trace!("Keyed diff: removals only.");
			for old in old_middle {
				self.remove(old)?;
			}
			return Ok(());
		}

		// Nodes are placed before this ID, or appended to `parent` if there is none.
		let next_sibling = match new.get(new_end) {
			Some(node) => Some(mounted(node)?),
			None => None,
		};

		if old_middle.is_empty() {
			trace!("Keyed diff: insertions only.");
			let previous = match start.checked_sub(1) {
				Some(index) => Some(mounted(&new[index])?),
				None => None,
			};
			return match (previous, next_sibling) {
				(Some(previous), _) => {
					let count = self.create_all(&mut new[start..new_end], depth_limit)?;
					self.edits.push(Edit::InsertAfter { id: previous, count });
					Ok(())
				}
				(None, Some(next_sibling)) => {
					let count = self.create_all(&mut new[start..new_end], depth_limit)?;
					self.edits.push(Edit::InsertBefore { id: next_sibling, count });
					Ok(())
				}
				(None, None) => self.append(parent, &mut new[start..new_end], depth_limit),
			};
		}

		let new_middle = &mut new[start..new_end];
		let new_indices: HashMap<String, usize> = new_middle.iter().enumerate().filter_map(|(index, node)| node.key().map(|key| (key.to_owned(), index))).collect();
		let mut sources: Vec<Option<usize>> = vec![None; new_middle.len()];
		for (old_index, old) in old_middle.iter().enumerate() {
			match old.key().and_then(|key| new_indices.get(key)) {
				Some(&new_index) => sources[new_index] = Some(old_index),
				None => self.remove(old)?,
			}
		}

		for (new, source) in new_middle.iter_mut().zip(&sources) {
			if let Some(source) = *source {
				self.patch(&old_middle[source], new, depth_limit)?;
			}
		}

		let stable = longest_increasing_subsequence(&sources);
		trace!("Keyed diff: {} of {} node(s) stay in place.", stable.len(), new_middle.len());

		let mut next_sibling = next_sibling;
		let mut stable = stable.iter().rev().peekable();
		for index in (0..new_middle.len()).rev() {
			if stable.peek() == Some(&&index) {
				stable.next();
				next_sibling = Some(mounted(&new_middle[index])?);
				continue;
			}

			if next_sibling.is_none() {
				self.edits.push(Edit::PushRoot { id: parent });
			}
			match sources[index] {
				Some(_) => {
					let id = mounted(&new_middle[index])?;
					trace!(%id, "Moving keyed node.");
					self.edits.push(Edit::PushRoot { id });
				}
				None => self.create(&mut new_middle[index], depth_limit)?,
			}
			match next_sibling {
				Some(id) => self.edits.push(Edit::InsertBefore { id, count: 1 }),
				None => {
					self.edits.push(Edit::AppendChildren { count: 1 });
					self.edits.push(Edit::PopRoot);
				}
			}
			next_sibling = Some(mounted(&new_middle[index])?);
		}
		Ok(())
	}

	/// Creates `new` and appends it to `parent`.
	fn append(&mut self, parent: NodeId, new: &mut [VNode], depth_limit: usize) -> Result<(), DiffError> {
		self.edits.push(Edit::PushRoot { id: parent });
		let count = self.create_all(new, depth_limit)?;
		self.edits.push(Edit::AppendChildren { count });
		self.edits.push(Edit::PopRoot);
		Ok(())
	}

	fn create_all(&mut self, new: &mut [VNode], depth_limit: usize) -> Result<usize, DiffError> {
		for node in new.iter_mut() {
			self.create(node, depth_limit)?;
		}
		Ok(new.len())
	}

	/// Creates `new` and its descendants, leaving it on the stack.
	fn create(&mut self, new: &mut VNode, depth_limit: usize) -> Result<(), DiffError> {
		let id = self.allocate();
		new.set_id(id);
		match new {
			VNode::Text(text) => self.edits.push(Edit::CreateTextNode { text: text.text.clone(), id }),
			VNode::Placeholder(_) => self.edits.push(Edit::CreatePlaceholder { id }),
			VNode::Element(element) => {
				let span = trace_span!("Creating element", tag = element.tag.as_str(), %id);
				let _enter = span.enter();
				self.edits.push(match &element.namespace {
					Some(namespace) => Edit::CreateElementNs {
						tag: element.tag.clone(),
						id,
						namespace: namespace.clone(),
					},
					None => Edit::CreateElement { tag: element.tag.clone(), id },
				});
				for attribute in &element.attributes {
					if attribute.value.to_attribute_string().is_some() {
						self.set_attribute(id, attribute);
					}
				}
				for VListener { event, listener } in &element.listeners {
					self.edits.push(Edit::NewEventListener {
						id,
						event: event.clone(),
						listener: *listener,
					});
				}

				if depth_limit == 0 {
					error!("Depth limit reached");
				} else if !element.children.is_empty() {
					check_keys(&element.children)?;
					let count = self.create_all(&mut element.children, depth_limit - 1)?;
					self.edits.push(Edit::AppendChildren { count });
				}
			}
		}
		Ok(())
	}

	/// Removes `old` and its descendants, the subtree root first.
	fn remove(&mut self, old: &VNode) -> Result<(), DiffError> {
		let id = mounted(old)?;
		self.edits.push(Edit::Remove { id });
		self.ids.free(id);
		self.remove_descendants(old)
	}

	fn remove_descendants(&mut self, old: &VNode) -> Result<(), DiffError> {
		for child in old.children() {
			self.remove(child)?;
		}
		Ok(())
	}

	fn patch(&mut self, old: &VNode, new: &mut VNode, depth_limit: usize) -> Result<(), DiffError> {
		let id = mounted(old)?;
		if !same_kind(old, new) {
			let span = trace_span!("Replacing", %id, old = old.kind(), new = new.kind());
			let _enter = span.enter();
			self.create(new, depth_limit)?;
			self.edits.push(Edit::ReplaceWith { id, count: 1 });
			self.ids.free(id);
			return self.remove_descendants(old);
		}

		new.set_id(id);
		match (old, new) {
			(VNode::Text(old), VNode::Text(new)) => {
				if old.text != new.text {
					self.edits.push(Edit::SetText { id, text: new.text.clone() });
				}
			}
			(VNode::Element(old), VNode::Element(new)) => self.patch_element(id, old, new, depth_limit)?,
			_ => (),
		}
		Ok(())
	}

	fn patch_element(&mut self, id: NodeId, old: &VElement, new: &mut VElement, depth_limit: usize) -> Result<(), DiffError> {
		let span = trace_span!("Diffing element", tag = new.tag.as_str(), %id);
		let _enter = span.enter();

		let mut a_1 = old.attributes.as_slice();
		let mut a_2 = new.attributes.as_slice();
		while !a_1.is_empty() && a_1.first() == a_2.first() {
			a_1 = &a_1[1..];
			a_2 = &a_2[1..];
		}
		while !a_1.is_empty() && a_1.last() == a_2.last() {
			a_1 = &a_1[..a_1.len() - 1];
			a_2 = &a_2[..a_2.len() - 1];
		}
		for removed in a_1 {
			if !a_2.iter().any(|added| added.name == removed.name && added.namespace == removed.namespace) {
				self.edits.push(Edit::RemoveAttribute {
					id,
					name: removed.name.clone(),
					namespace: removed.namespace.clone(),
				});
			}
		}
		for added in a_2 {
			if !a_1.contains(added) {
				self.set_attribute(id, added);
			}
		}

		let mut eb_1 = old.listeners.as_slice();
		let mut eb_2 = new.listeners.as_slice();
		while !eb_1.is_empty() && eb_1.first() == eb_2.first() {
			eb_1 = &eb_1[1..];
			eb_2 = &eb_2[1..];
		}
		while !eb_1.is_empty() && eb_1.last() == eb_2.last() {
			eb_1 = &eb_1[..eb_1.len() - 1];
			eb_2 = &eb_2[..eb_2.len() - 1];
		}
		if eb_1.is_empty() {
			for added in eb_2 {
				self.add_listener(id, added);
			}
		} else if eb_2.is_empty() {
			for removed in eb_1 {
				self.remove_listener(id, removed);
			}
		} else {
			let listener_diff = self.listener_diff_set.temp();
			let listener_diff = unsafe {
				//SAFETY: This field is not otherwise accessed in this block.
				&mut *(listener_diff as *mut HashSet<(&str, _)>)
			};
			for persisting in eb_2 {
				listener_diff.insert((persisting.event.as_str(), persisting.listener));
			}
			for prior in eb_1 {
				if !listener_diff.remove(&(prior.event.as_str(), prior.listener)) {
					self.remove_listener(id, prior);
				}
			}
			// In list order, so that batches are deterministic.
			for added in eb_2 {
				if listener_diff.contains(&(added.event.as_str(), added.listener)) {
					self.add_listener(id, added);
				}
			}
		}

		let VElement { children: new_children, .. } = new;
		self.diff_children(id, &old.children, new_children, depth_limit - 1)
	}

	fn set_attribute(&mut self, id: NodeId, VAttribute { name, namespace, value }: &VAttribute) {
		self.edits.push(Edit::SetAttribute {
			id,
			name: name.clone(),
			value: value.clone(),
			namespace: namespace.clone(),
		});
	}

	fn add_listener(&mut self, id: NodeId, VListener { event, listener }: &VListener) {
		self.edits.push(Edit::NewEventListener {
			id,
			event: event.clone(),
			listener: *listener,
		});
	}

	fn remove_listener(&mut self, id: NodeId, VListener { event, .. }: &VListener) {
		self.edits.push(Edit::RemoveEventListener { id, event: event.clone() });
	}
}

/// Indices into `sources` that form a longest strictly increasing subsequence of its `Some` values, in ascending order.
fn longest_increasing_subsequence(sources: &[Option<usize>]) -> Vec<usize> {
	// `tails[k]` is the index of the smallest tail of any increasing run of length `k + 1`.
	let mut tails: Vec<usize> = Vec::new();
	let mut predecessors: Vec<Option<usize>> = vec![None; sources.len()];
	for (index, value) in sources.iter().enumerate() {
		let value = match value {
			Some(value) => *value,
			None => continue,
		};
		let length = tails.partition_point(|&tail| sources[tail].map_or(false, |tail| tail < value));
		predecessors[index] = length.checked_sub(1).map(|previous| tails[previous]);
		if length == tails.len() {
			tails.push(index);
		} else {
			tails[length] = index;
		}
	}

	let mut subsequence = Vec::with_capacity(tails.len());
	let mut current = tails.last().copied();
	while let Some(index) = current {
		subsequence.push(index);
		current = predecessors[index];
	}
	subsequence.reverse();
	subsequence
}
