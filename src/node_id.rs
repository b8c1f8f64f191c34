use core::fmt::{self, Display, Formatter};
use hashbrown::HashSet;
use tracing::trace;

/// Opaque identifier of a live tree node, assigned by the application layer.
///
/// IDs cross the boundary between whatever produces edits and the [`Interpreter`](`crate::Interpreter`) applying them,
/// so they are plain integers rather than references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);
impl NodeId {
	/// The mount point, registered by [`Runtime::init`](`crate::Runtime::init`).
	pub const ROOT: Self = Self(0);

	#[must_use]
	pub const fn get(self) -> u64 {
		self.0
	}

	#[must_use]
	pub const fn is_root(self) -> bool {
		self.0 == 0
	}
}
impl From<u64> for NodeId {
	fn from(raw: u64) -> Self {
		Self(raw)
	}
}
impl Display for NodeId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Tags an attached event listener, so that events can be reported by number rather than by object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);
impl From<u64> for ListenerId {
	fn from(raw: u64) -> Self {
		Self(raw)
	}
}
impl Display for ListenerId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "L{}", self.0)
	}
}

/// Hands out [`NodeId`]s on behalf of the application layer.
///
/// Freed IDs go into quarantine first and only become reusable after [`IdAllocator::release_quarantine`],
/// which the [`Runtime`](`crate::Runtime`) calls once the batch that could still reference them has been applied.
#[derive(Debug)]
pub struct IdAllocator {
	next: u64,
	free: Vec<NodeId>,
	quarantine: Vec<NodeId>,
	pooled: HashSet<NodeId>,
}
impl Default for IdAllocator {
	fn default() -> Self {
		Self::new()
	}
}
impl IdAllocator {
	#[must_use]
	pub fn new() -> Self {
		Self {
			next: 1,
			free: Vec::new(),
			quarantine: Vec::new(),
			pooled: HashSet::new(),
		}
	}

	/// Allocates an ID for which `in_use` returns `false`.
	pub fn allocate(&mut self, in_use: impl Fn(NodeId) -> bool) -> NodeId {
		while let Some(id) = self.free.pop() {
			self.pooled.remove(&id);
			if !in_use(id) {
				return id;
			}
		}

		loop {
			let id = NodeId(self.next);
			self.next = self.next.wrapping_add(1).max(1);
			if !in_use(id) && !self.pooled.contains(&id) {
				return id;
			}
		}
	}

	/// Quarantines `id`. [`NodeId::ROOT`] and IDs that are already pooled are ignored.
	pub fn free(&mut self, id: NodeId) {
		if id.is_root() || !self.pooled.insert(id) {
			return;
		}
		self.quarantine.push(id);
	}

	/// Makes all quarantined IDs available for reuse.
	pub fn release_quarantine(&mut self) {
		if !self.quarantine.is_empty() {
			trace!("Releasing {} quarantined ID(s).", self.quarantine.len());
		}
		self.free.append(&mut self.quarantine);
	}

	#[must_use]
	pub fn quarantined(&self) -> usize {
		self.quarantine.len()
	}
}
