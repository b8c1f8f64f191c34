use crate::{NodeId, RegistryError};
use core::{convert::TryFrom, mem};
use hashbrown::HashMap;
use tracing::{instrument, trace};

/// Maps [`NodeId`]s to live node handles and holds the only long-lived reference to each of them.
///
/// Small IDs live in a dense arena of slots indexed by ID. Larger ones spill into a hash map,
/// so that sparse ID spaces don't allocate huge arenas.
///
/// Unregistering an ID never touches descendant IDs.
/// Callers issue one removal per node that should be forgotten.
#[derive(Debug)]
pub struct NodeRegistry<N> {
	dense: Vec<Option<N>>,
	sparse: HashMap<NodeId, N>,
	dense_limit: usize,
	len: usize,
}
impl<N> Default for NodeRegistry<N> {
	fn default() -> Self {
		Self::with_dense_limit(1 << 16)
	}
}
impl<N> NodeRegistry<N> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// IDs below `dense_limit` are stored in the arena.
	#[must_use]
	pub fn with_dense_limit(dense_limit: usize) -> Self {
		Self {
			dense: Vec::new(),
			sparse: HashMap::new(),
			dense_limit,
			len: 0,
		}
	}

	fn dense_index(&self, id: NodeId) -> Option<usize> {
		usize::try_from(id.0).ok().filter(|&index| index < self.dense_limit)
	}

	/// Registers `handle` under `id`.
	///
	/// # Errors
	///
	/// Iff `id` is mapped to a different handle already.
	/// Registering the same handle again is a no-op.
	#[instrument(skip(self, handle))]
	pub fn register(&mut self, id: NodeId, handle: N) -> Result<(), RegistryError>
	where
		N: PartialEq,
	{
		match self.dense_index(id) {
			Some(index) => {
				if self.dense.len() <= index {
					self.dense.resize_with(index + 1, || None);
				}
				match &mut self.dense[index] {
					Some(existing) if *existing == handle => return Ok(()),
					Some(_) => return Err(RegistryError::DuplicateId(id)),
					slot @ None => *slot = Some(handle),
				}
			}
			None => match self.sparse.get(&id) {
				Some(existing) if *existing == handle => return Ok(()),
				Some(_) => return Err(RegistryError::DuplicateId(id)),
				None => {
					self.sparse.insert(id, handle);
				}
			},
		}
		self.len += 1;
		trace!("Registered. {} node(s) are now registered.", self.len);
		Ok(())
	}

	/// Registers `handle` under `id` unconditionally, returning the handle it replaces.
	pub fn replace(&mut self, id: NodeId, handle: N) -> Option<N> {
		let previous = match self.dense_index(id) {
			Some(index) => {
				if self.dense.len() <= index {
					self.dense.resize_with(index + 1, || None);
				}
				self.dense[index].replace(handle)
			}
			None => self.sparse.insert(id, handle),
		};
		if previous.is_none() {
			self.len += 1;
		}
		previous
	}

	#[must_use]
	pub fn get(&self, id: NodeId) -> Option<&N> {
		match self.dense_index(id) {
			Some(index) => self.dense.get(index).and_then(Option::as_ref),
			None => self.sparse.get(&id),
		}
	}

	/// # Errors
	///
	/// [`RegistryError::UnknownId`] iff `id` isn't registered.
	pub fn lookup(&self, id: NodeId) -> Result<&N, RegistryError> {
		self.get(id).ok_or(RegistryError::UnknownId(id))
	}

	#[must_use]
	pub fn contains(&self, id: NodeId) -> bool {
		self.get(id).is_some()
	}

	/// Forgets `id` and returns its handle. Unknown IDs are ignored.
	pub fn unregister(&mut self, id: NodeId) -> Option<N> {
		let removed = match self.dense_index(id) {
			Some(index) => self.dense.get_mut(index).and_then(Option::take),
			None => self.sparse.remove(&id),
		};
		if removed.is_some() {
			self.len -= 1;
		}
		removed
	}

	/// Reverse lookup by handle identity. This is a linear scan.
	pub fn find(&self, handle: &N) -> Option<NodeId>
	where
		N: PartialEq,
	{
		self.iter().find_map(|(id, registered)| (registered == handle).then(|| id))
	}

	pub fn iter(&self) -> impl Iterator<Item = (NodeId, &N)> + '_ {
		self.dense
			.iter()
			.enumerate()
			.filter_map(|(index, slot)| slot.as_ref().map(|handle| (NodeId(index as u64), handle)))
			.chain(self.sparse.iter().map(|(&id, handle)| (id, handle)))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.len
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Drops every handle, returning how many there were.
	pub fn clear(&mut self) -> usize {
		self.dense.clear();
		self.sparse.clear();
		mem::replace(&mut self.len, 0)
	}
}
