use crate::ListenerId;
use hashbrown::HashSet;

/// A reusable scratch set for listener diffs, so that diffing doesn't allocate once warmed up.
#[derive(Debug)]
pub struct TempListenerSet(HashSet<(&'static str, ListenerId)>);
impl TempListenerSet {
	pub fn new() -> Self {
		Self(HashSet::new())
	}

	pub fn temp<'a>(&mut self) -> &mut HashSet<(&'a str, ListenerId)> {
		unsafe {
			//SAFETY: The collection is cleared before each borrow, so no values can leak between them.
			// Clearing after each borrow instead would not be enough, as a panic during the borrow could skip it.
			self.0.clear();
			&mut *(&mut self.0 as *mut HashSet<(&'static str, ListenerId)>).cast()
		}
	}

	/// Retrieves the cache set's capacity without clearing it first.
	pub fn capacity(&self) -> usize {
		self.0.capacity()
	}
}
