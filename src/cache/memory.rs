use super::{CacheError, Database, Direction, IndexEntry, Key, KeyRange, Mode, Schema, StoreHost, StoreOptions, Transaction};
use core::cell::{Cell, RefCell};
use hashbrown::HashMap;
use std::{
	collections::{BTreeMap, BTreeSet},
	rc::Rc,
};
use tracing::{debug, instrument, trace, warn};

#[derive(Debug, Clone, Default)]
struct Record {
	value: Vec<u8>,
	index_keys: Vec<(String, Key)>,
}

#[derive(Debug, Clone)]
struct Index {
	unique: bool,
	entries: BTreeMap<Key, BTreeSet<Key>>,
}

#[derive(Debug, Clone, Default)]
struct ObjectStore {
	records: BTreeMap<Key, Record>,
	indexes: BTreeMap<String, Index>,
	/// Shared by every copy of the store, so that generated keys stay unique across transactions.
	key_generator: Option<Rc<Cell<u64>>>,
}

/// One logged write, replayed onto the committed store at commit.
#[derive(Debug, Clone)]
enum Write {
	Put {
		key: Key,
		value: Vec<u8>,
		index_keys: Vec<(String, Key)>,
		overwrite: bool,
	},
	Delete(KeyRange),
}

impl ObjectStore {
	fn new(options: StoreOptions) -> Self {
		Self {
			key_generator: options.auto_increment.then(|| Rc::new(Cell::new(1))),
			..Self::default()
		}
	}

	fn unindex(&mut self, key: &Key, record: &Record) {
		for (name, index_key) in &record.index_keys {
			if let Some(index) = self.indexes.get_mut(name) {
				if let Some(keys) = index.entries.get_mut(index_key) {
					keys.remove(key);
					if keys.is_empty() {
						index.entries.remove(index_key);
					}
				}
			}
		}
	}

	fn range_keys(&self, range: &KeyRange) -> Vec<Key> {
		if range.is_empty() {
			return Vec::new();
		}
		self.records.range(range.clone()).map(|(key, _)| key.clone()).collect()
	}

	fn generate_key(&self, name: &str) -> Result<Key, CacheError> {
		let generator = self.key_generator.as_ref().ok_or_else(|| CacheError::KeyRequired(name.to_owned()))?;
		let key = generator.get();
		let next = key.checked_add(1).ok_or_else(|| CacheError::Constraint(format!("the key generator of {:?} is exhausted", name)))?;
		generator.set(next);
		Ok(Key::Integer(key))
	}

	/// Applies `write`, or changes nothing if it fails.
	fn apply(&mut self, write: Write) -> Result<(), CacheError> {
		match write {
			Write::Put { key, value, index_keys, overwrite } => {
				if !overwrite && self.records.contains_key(&key) {
					return Err(CacheError::Constraint(format!("there is a record at {} already", key)));
				}
				for (name, index_key) in &index_keys {
					let index = self.indexes.get(name).ok_or_else(|| CacheError::NotFound(name.clone()))?;
					if index.unique && index.entries.get(index_key).map_or(false, |keys| keys.iter().any(|existing| *existing != key)) {
						return Err(CacheError::Constraint(format!("index {:?} already maps {} to another record", name, index_key)));
					}
				}

				if let (Some(generator), Key::Integer(integer)) = (&self.key_generator, &key) {
					generator.set(generator.get().max(integer.saturating_add(1)));
				}
				if let Some(previous) = self.records.remove(&key) {
					self.unindex(&key, &previous);
				}
				for (name, index_key) in &index_keys {
					if let Some(index) = self.indexes.get_mut(name) {
						index.entries.entry(index_key.clone()).or_default().insert(key.clone());
					}
				}
				self.records.insert(key, Record { value, index_keys });
			}
			Write::Delete(range) => {
				for key in self.range_keys(&range) {
					if let Some(record) = self.records.remove(&key) {
						self.unindex(&key, &record);
					}
				}
			}
		}
		Ok(())
	}
}

#[derive(Debug, Default)]
struct DatabaseState {
	version: u32,
	stores: BTreeMap<String, ObjectStore>,
	commits: u64,
}

/// Keeps databases in memory, shared between clones of the store.
///
/// Transactions read a snapshot of their scope taken when they begin, plus their own writes.
/// Commits replay a transaction's writes onto the committed stores in the order the commits happen,
/// so overlapping transactions don't erase each other's records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
	databases: Rc<RefCell<HashMap<String, Rc<RefCell<DatabaseState>>>>>,
}
impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

struct MemorySchema<'a> {
	stores: &'a mut BTreeMap<String, ObjectStore>,
}
impl Schema for MemorySchema<'_> {
	fn store_names(&self) -> Vec<String> {
		self.stores.keys().cloned().collect()
	}

	fn create_store_with(&mut self, name: &str, options: StoreOptions) -> Result<(), CacheError> {
		if self.stores.contains_key(name) {
			return Err(CacheError::Constraint(format!("object store {:?} exists already", name)));
		}
		self.stores.insert(name.to_owned(), ObjectStore::new(options));
		Ok(())
	}

	fn delete_store(&mut self, name: &str) -> Result<(), CacheError> {
		self.stores.remove(name).map(drop).ok_or_else(|| CacheError::NotFound(name.to_owned()))
	}

	fn create_index(&mut self, store: &str, index: &str, unique: bool) -> Result<(), CacheError> {
		let store = self.stores.get_mut(store).ok_or_else(|| CacheError::NotFound(store.to_owned()))?;
		if store.indexes.contains_key(index) {
			return Err(CacheError::Constraint(format!("index {:?} exists already", index)));
		}
		store.indexes.insert(
			index.to_owned(),
			Index {
				unique,
				entries: BTreeMap::new(),
			},
		);
		Ok(())
	}

	fn delete_index(&mut self, store: &str, index: &str) -> Result<(), CacheError> {
		let store = self.stores.get_mut(store).ok_or_else(|| CacheError::NotFound(store.to_owned()))?;
		store.indexes.remove(index).map(drop).ok_or_else(|| CacheError::NotFound(index.to_owned()))
	}
}

impl StoreHost for MemoryStore {
	type Database = MemoryDatabase;

	#[instrument(skip(self, upgrade))]
	async fn open<U>(&self, name: &str, version: u32, upgrade: U) -> Result<MemoryDatabase, CacheError>
	where
		U: 'static + FnOnce(&mut dyn Schema, u32) -> Result<(), CacheError>,
	{
		let existing = self.databases.borrow().get(name).map(Rc::clone);
		let current = existing.as_ref().map_or(0, |state| state.borrow().version);
		if version == 0 || version < current {
			return Err(CacheError::VersionError { requested: version, current });
		}

		let state = match existing {
			Some(state) if version == current => state,
			existing => {
				debug!(from = current, to = version, "Upgrading.");
				let mut stores = existing.as_ref().map(|state| state.borrow().stores.clone()).unwrap_or_default();
				upgrade(&mut MemorySchema { stores: &mut stores }, current)?;
				match existing {
					Some(state) => {
						{
							let mut state = state.borrow_mut();
							state.stores = stores;
							state.version = version;
						}
						state
					}
					None => {
						let state = Rc::new(RefCell::new(DatabaseState { version, stores, commits: 0 }));
						self.databases.borrow_mut().insert(name.to_owned(), Rc::clone(&state));
						state
					}
				}
			}
		};
		Ok(MemoryDatabase { name: name.to_owned(), state })
	}

	#[instrument(skip(self))]
	async fn delete_database(&self, name: &str) -> Result<(), CacheError> {
		if self.databases.borrow_mut().remove(name).is_none() {
			trace!("No such database.");
		}
		Ok(())
	}
}

/// A database of a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
	name: String,
	state: Rc<RefCell<DatabaseState>>,
}
impl MemoryDatabase {
	/// How many transactions have been committed to this database.
	#[must_use]
	pub fn commits(&self) -> u64 {
		self.state.borrow().commits
	}
}
impl Database for MemoryDatabase {
	type Transaction = MemoryTransaction;

	fn name(&self) -> &str {
		&self.name
	}

	fn version(&self) -> u32 {
		self.state.borrow().version
	}

	fn store_names(&self) -> Vec<String> {
		self.state.borrow().stores.keys().cloned().collect()
	}

	fn transaction(&self, stores: &[&str], mode: Mode) -> Result<MemoryTransaction, CacheError> {
		let state = self.state.borrow();
		let mut snapshot = HashMap::with_capacity(stores.len());
		for &name in stores {
			let store = state.stores.get(name).ok_or_else(|| CacheError::NotFound(name.to_owned()))?;
			snapshot.insert(name.to_owned(), store.clone());
		}
		Ok(MemoryTransaction {
			database: Rc::clone(&self.state),
			mode,
			stores: RefCell::new(snapshot),
			log: RefCell::new(Vec::new()),
			finished: Cell::new(false),
		})
	}
}

/// A transaction of a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryTransaction {
	database: Rc<RefCell<DatabaseState>>,
	mode: Mode,
	stores: RefCell<HashMap<String, ObjectStore>>,
	log: RefCell<Vec<(String, Write)>>,
	finished: Cell<bool>,
}
impl MemoryTransaction {
	fn read<T>(&self, store: &str, f: impl FnOnce(&ObjectStore) -> Result<T, CacheError>) -> Result<T, CacheError> {
		if self.finished.get() {
			return Err(CacheError::Finished);
		}
		let stores = self.stores.borrow();
		f(stores.get(store).ok_or_else(|| CacheError::NotInScope(store.to_owned()))?)
	}

	/// Applies the [`Write`] built by `f` to the snapshot and logs it for [`commit`](Transaction::commit).
	fn write<T>(&self, store: &str, f: impl FnOnce(&ObjectStore) -> Result<(T, Write), CacheError>) -> Result<T, CacheError> {
		if self.finished.get() {
			return Err(CacheError::Finished);
		}
		let mut stores = self.stores.borrow_mut();
		let object_store = stores.get_mut(store).ok_or_else(|| CacheError::NotInScope(store.to_owned()))?;
		if self.mode == Mode::ReadOnly {
			return Err(CacheError::ReadOnly);
		}
		let (result, write) = f(object_store)?;
		object_store.apply(write.clone())?;
		self.log.borrow_mut().push((store.to_owned(), write));
		Ok(result)
	}

	fn insert(&self, store: &str, key: Option<Key>, value: Vec<u8>, indexes: &[(&str, Key)], overwrite: bool) -> Result<Key, CacheError> {
		self.write(store, |object_store| {
			let key = match key {
				Some(key) => key,
				None => object_store.generate_key(store)?,
			};
			let write = Write::Put {
				key: key.clone(),
				value,
				index_keys: indexes.iter().map(|(name, index_key)| ((*name).to_owned(), index_key.clone())).collect(),
				overwrite,
			};
			Ok((key, write))
		})
	}
}
impl Drop for MemoryTransaction {
	fn drop(&mut self) {
		if !self.finished.get() && !self.log.borrow().is_empty() {
			warn!("Transaction dropped without commit. Aborting.");
		}
	}
}

impl Transaction for MemoryTransaction {
	fn mode(&self) -> Mode {
		self.mode
	}

	async fn get(&self, store: &str, key: &Key) -> Result<Option<Vec<u8>>, CacheError> {
		self.read(store, |store| Ok(store.records.get(key).map(|record| record.value.clone())))
	}

	async fn put_indexed(&self, store: &str, key: Key, value: Vec<u8>, indexes: &[(&str, Key)]) -> Result<(), CacheError> {
		self.insert(store, Some(key), value, indexes, true).map(drop)
	}

	async fn add_indexed(&self, store: &str, key: Option<Key>, value: Vec<u8>, indexes: &[(&str, Key)]) -> Result<Key, CacheError> {
		self.insert(store, key, value, indexes, false)
	}

	async fn delete_range(&self, store: &str, range: &KeyRange) -> Result<(), CacheError> {
		self.write(store, |_| Ok(((), Write::Delete(range.clone()))))
	}

	async fn count(&self, store: &str, range: &KeyRange) -> Result<usize, CacheError> {
		self.read(store, |store| Ok(if range.is_empty() { 0 } else { store.records.range(range.clone()).count() }))
	}

	async fn scan(&self, store: &str, range: &KeyRange, direction: Direction, limit: Option<usize>) -> Result<Vec<(Key, Vec<u8>)>, CacheError> {
		self.read(store, |store| {
			if range.is_empty() {
				return Ok(Vec::new());
			}
			let records = store.records.range(range.clone()).map(|(key, record)| (key.clone(), record.value.clone()));
			let limit = limit.unwrap_or(usize::MAX);
			Ok(match direction {
				Direction::Next => records.take(limit).collect(),
				Direction::Prev => records.rev().take(limit).collect(),
			})
		})
	}

	async fn scan_index(&self, store: &str, index: &str, range: &KeyRange, direction: Direction, limit: Option<usize>) -> Result<Vec<IndexEntry>, CacheError> {
		self.read(store, |store| {
			let entries = &store.indexes.get(index).ok_or_else(|| CacheError::NotFound(index.to_owned()))?.entries;
			if range.is_empty() {
				return Ok(Vec::new());
			}
			let flattened = entries.range(range.clone()).flat_map(|(index_key, keys)| keys.iter().map(move |key| (index_key, key)));
			let found = |(index_key, key): (&Key, &Key)| {
				store.records.get(key).map(|record| IndexEntry {
					index_key: index_key.clone(),
					key: key.clone(),
					value: record.value.clone(),
				})
			};
			let limit = limit.unwrap_or(usize::MAX);
			Ok(match direction {
				Direction::Next => flattened.filter_map(found).take(limit).collect(),
				Direction::Prev => flattened.rev().filter_map(found).take(limit).collect(),
			})
		})
	}

	#[instrument(skip(self))]
	async fn commit(self) -> Result<(), CacheError> {
		if self.finished.replace(true) {
			return Err(CacheError::Finished);
		}
		let log = self.log.take();
		if log.is_empty() {
			return Ok(());
		}

		let mut database = self.database.borrow_mut();
		let mut replayed: HashMap<String, ObjectStore> = HashMap::new();
		for (name, write) in log {
			if !replayed.contains_key(&name) {
				let current = database.stores.get(&name).ok_or_else(|| {
					warn!(store = name.as_str(), "Object store vanished before commit.");
					CacheError::NotFound(name.clone())
				})?;
				replayed.insert(name.clone(), current.clone());
			}
			let target = match replayed.get_mut(&name) {
				Some(target) => target,
				None => continue,
			};
			if let Err(error) = target.apply(write) {
				warn!(store = name.as_str(), error = %error, "Conflicting commit. Nothing was written.");
				return Err(error);
			}
		}
		database.stores.extend(replayed);
		database.commits += 1;
		trace!(commits = database.commits, "Committed.");
		Ok(())
	}

	async fn abort(self) -> Result<(), CacheError> {
		if self.finished.replace(true) {
			return Err(CacheError::Finished);
		}
		trace!("Aborted.");
		Ok(())
	}
}
