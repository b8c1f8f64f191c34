use core::{borrow::Borrow, hash::Hash};
use hashbrown::{
	hash_map::{Entry, ExtractIf},
	HashMap,
};
use num_traits::{CheckedAdd, CheckedSub, One, Zero};

/// A map of reference-counted values. Entries whose count reaches zero stay until [`RcHashMap::drain_weak`].
#[derive(Debug)]
pub struct RcHashMap<K, C, V>(HashMap<K, (C, V)>)
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero;
impl<K, C, V> Default for RcHashMap<K, C, V>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<K, C, V> RcHashMap<K, C, V>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
{
	#[must_use]
	pub fn new() -> Self {
		Self(HashMap::new())
	}

	pub fn increment_or_insert_with<F: FnOnce(&K) -> V>(&mut self, k: K, v: F) -> Result<&mut V, CountSaturatedError> {
		match self.0.entry(k) {
			Entry::Occupied(occupied) => {
				let (c, v) = occupied.into_mut();
				*c = c.checked_add(&C::one()).ok_or(CountSaturatedError)?;
				Ok(v)
			}
			Entry::Vacant(vacant) => {
				let value = v(vacant.key());
				let (_, v) = vacant.insert((C::one(), value));
				Ok(v)
			}
		}
	}

	pub fn get<Q: ?Sized>(&self, k: &Q) -> Option<&V>
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		self.0.get(k).map(|(_, v)| v)
	}

	/// Whether `k` is present with a non-zero count.
	pub fn is_strong<Q: ?Sized>(&self, k: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		self.0.get(k).map_or(false, |(c, _)| !c.is_zero())
	}

	pub fn weak_decrement<Q: ?Sized>(&mut self, k: &Q) -> Result<Option<&mut V>, CountSaturatedError>
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		match self.0.get_mut(k) {
			Some((c, v)) => {
				*c = c.checked_sub(&C::one()).ok_or(CountSaturatedError)?;
				Ok(Some(v))
			}
			None => Ok(None),
		}
	}

	/// Removes and yields the entries whose count is zero.
	pub fn drain_weak(&mut self) -> DrainWeak<'_, K, C, V> {
		DrainWeak(self.0.extract_if(DrainWeak::<K, C, V>::weak_filter as fn(&K, &mut (C, V)) -> bool))
	}

	/// Removes all entries regardless of their count.
	pub fn drain(&mut self) -> impl Iterator<Item = (K, V)> + '_ {
		self.0.drain().map(|(k, (_, v))| (k, v))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	#[must_use]
	pub fn capacity(&self) -> usize {
		self.0.capacity()
	}
}

pub struct DrainWeak<'a, K, C, V>(ExtractIf<'a, K, (C, V), fn(&K, &mut (C, V)) -> bool>);
impl<'a, K, C, V> DrainWeak<'a, K, C, V> {
	fn weak_filter(_: &K, (c, _): &mut (C, V)) -> bool
	where
		C: Zero,
	{
		c.is_zero()
	}
}
impl<'a, K, C, V> Iterator for DrainWeak<'a, K, C, V> {
	type Item = (K, V);

	fn next(&mut self) -> Option<Self::Item> {
		self.0.next().map(|(k, (_, v))| (k, v))
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.0.size_hint()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountSaturatedError;
