use core::{
	fmt::{self, Display, Formatter},
	ops::{Bound, RangeBounds},
};

/// A record or index key.
///
/// Integer keys order before text keys, which order before byte keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
	/// Also what auto-increment stores generate. Only exact up to 2<sup>53</sup> in IndexedDB.
	Integer(u64),
	Text(String),
	Bytes(Vec<u8>),
}
impl Display for Key {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Key::Integer(integer) => write!(f, "{}", integer),
			Key::Text(text) => write!(f, "{:?}", text),
			Key::Bytes(bytes) => {
				f.write_str("0x")?;
				bytes.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
			}
		}
	}
}
impl From<u64> for Key {
	fn from(integer: u64) -> Self {
		Self::Integer(integer)
	}
}
impl From<&str> for Key {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}
impl From<String> for Key {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}
impl From<&[u8]> for Key {
	fn from(bytes: &[u8]) -> Self {
		Self::Bytes(bytes.to_vec())
	}
}
impl From<Vec<u8>> for Key {
	fn from(bytes: Vec<u8>) -> Self {
		Self::Bytes(bytes)
	}
}

/// Which way a cursor walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
	/// Ascending.
	Next,
	/// Descending.
	Prev,
}
impl Default for Direction {
	fn default() -> Self {
		Self::Next
	}
}

/// A contiguous range of [`Key`]s. Each bound may be open, closed or absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRange {
	pub lower: Bound<Key>,
	pub upper: Bound<Key>,
}
impl Default for KeyRange {
	fn default() -> Self {
		Self::all()
	}
}
impl KeyRange {
	#[must_use]
	pub fn all() -> Self {
		Self {
			lower: Bound::Unbounded,
			upper: Bound::Unbounded,
		}
	}

	#[must_use]
	pub fn only(key: impl Into<Key>) -> Self {
		let key = key.into();
		Self {
			lower: Bound::Included(key.clone()),
			upper: Bound::Included(key),
		}
	}

	/// Keys from `key` upwards, excluding `key` itself iff `open`.
	#[must_use]
	pub fn lower_bound(key: impl Into<Key>, open: bool) -> Self {
		Self {
			lower: bound(key.into(), open),
			upper: Bound::Unbounded,
		}
	}

	/// Keys up to `key`, excluding `key` itself iff `open`.
	#[must_use]
	pub fn upper_bound(key: impl Into<Key>, open: bool) -> Self {
		Self {
			lower: Bound::Unbounded,
			upper: bound(key.into(), open),
		}
	}

	#[must_use]
	pub fn bound(lower: impl Into<Key>, upper: impl Into<Key>, lower_open: bool, upper_open: bool) -> Self {
		Self {
			lower: bound(lower.into(), lower_open),
			upper: bound(upper.into(), upper_open),
		}
	}

	#[must_use]
	pub fn contains(&self, key: &Key) -> bool {
		RangeBounds::contains(self, key)
	}

	/// Whether no key can be in this range.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		match (&self.lower, &self.upper) {
			(Bound::Included(lower), Bound::Included(upper)) => lower > upper,
			(Bound::Included(lower) | Bound::Excluded(lower), Bound::Excluded(upper)) | (Bound::Excluded(lower), Bound::Included(upper)) => lower >= upper,
			(Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
		}
	}
}
impl RangeBounds<Key> for KeyRange {
	fn start_bound(&self) -> Bound<&Key> {
		self.lower.as_ref()
	}

	fn end_bound(&self) -> Bound<&Key> {
		self.upper.as_ref()
	}
}

fn bound(key: Key, open: bool) -> Bound<Key> {
	if open {
		Bound::Excluded(key)
	} else {
		Bound::Included(key)
	}
}
