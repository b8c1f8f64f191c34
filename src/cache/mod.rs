//! A transactional key-value store over named object stores.
//!
//! Databases are opened through a [`StoreHost`] at a version. If the stored version is lower,
//! the upgrade callback edits the [`Schema`] first. Reads and writes happen in [`Transaction`]s
//! scoped to a set of object stores. Writes are visible inside their transaction right away,
//! and to other transactions only after [`Transaction::commit`]. Dropping a transaction aborts it.
//!
//! [`MemoryStore`] keeps everything in memory. `IdbStore` (`wasm32` only) is backed by [***IndexedDB***](https://developer.mozilla.org/en-US/docs/Web/API/IndexedDB_API).
//!
//! The trait methods are `async` and only usable on the current thread.
#![allow(async_fn_in_trait)]

use crate::HostError;
use thiserror::Error;
use tracing::{instrument, trace};

mod key;
mod memory;
pub use key::{Direction, Key, KeyRange};
pub use memory::{MemoryDatabase, MemoryStore, MemoryTransaction};

#[cfg(target_arch = "wasm32")]
mod idb;
#[cfg(target_arch = "wasm32")]
pub use idb::{IdbDatabase, IdbStore, IdbTransaction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
	#[error("no object store or index named {0:?}")]
	NotFound(String),
	#[error("object store {0:?} is not in the transaction's scope")]
	NotInScope(String),
	#[error("the transaction is read-only")]
	ReadOnly,
	#[error("constraint violated: {0}")]
	Constraint(String),
	#[error("can't open version {requested}, the database is at version {current}")]
	VersionError { requested: u32, current: u32 },
	#[error("object store {0:?} doesn't generate keys, so records need one")]
	KeyRequired(String),
	#[error("the transaction has already finished")]
	Finished,
	#[error(transparent)]
	Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
	ReadOnly,
	ReadWrite,
}

/// How an object store is set up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StoreOptions {
	/// Generate ascending [`Key::Integer`]s, starting at `1`, for records added without a key.
	///
	/// Generated keys are never handed out twice, even if the transaction that generated them aborts.
	/// Writing a larger integer key explicitly moves the generator past it.
	pub auto_increment: bool,
}

/// A record found through a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
	pub index_key: Key,
	pub key: Key,
	pub value: Vec<u8>,
}

/// Opens and deletes databases.
pub trait StoreHost {
	type Database: Database;

	/// Opens database `name` at `version`, creating it if necessary.
	///
	/// If the stored version is lower, `upgrade` is called with the schema and the stored version (`0` for new databases).
	/// If it fails, the database stays as it was.
	///
	/// # Errors
	///
	/// [`CacheError::VersionError`] iff `version` is `0` or lower than the stored version,
	/// or whatever `upgrade` returns.
	async fn open<U>(&self, name: &str, version: u32, upgrade: U) -> Result<Self::Database, CacheError>
	where
		U: 'static + FnOnce(&mut dyn Schema, u32) -> Result<(), CacheError>;

	/// Deleting a missing database is a no-op.
	///
	/// # Errors
	///
	/// Iff the host refuses.
	async fn delete_database(&self, name: &str) -> Result<(), CacheError>;
}

/// Edits object stores and indexes during an upgrade.
pub trait Schema {
	fn store_names(&self) -> Vec<String>;

	/// Creates a store with default [`StoreOptions`].
	///
	/// # Errors
	///
	/// [`CacheError::Constraint`] iff the store exists already.
	fn create_store(&mut self, name: &str) -> Result<(), CacheError> {
		self.create_store_with(name, StoreOptions::default())
	}

	/// # Errors
	///
	/// [`CacheError::Constraint`] iff the store exists already.
	fn create_store_with(&mut self, name: &str, options: StoreOptions) -> Result<(), CacheError>;

	/// # Errors
	///
	/// [`CacheError::NotFound`] iff there is no such store.
	fn delete_store(&mut self, name: &str) -> Result<(), CacheError>;

	/// Creates a secondary index over the index keys given to [`Transaction::put_indexed`].
	///
	/// # Errors
	///
	/// [`CacheError::NotFound`] iff there is no such store, [`CacheError::Constraint`] iff the index exists already.
	fn create_index(&mut self, store: &str, index: &str, unique: bool) -> Result<(), CacheError>;

	/// # Errors
	///
	/// [`CacheError::NotFound`] iff there is no such store or index.
	fn delete_index(&mut self, store: &str, index: &str) -> Result<(), CacheError>;
}

/// An open database.
pub trait Database {
	type Transaction: Transaction;

	fn name(&self) -> &str;
	fn version(&self) -> u32;
	fn store_names(&self) -> Vec<String>;

	/// # Errors
	///
	/// [`CacheError::NotFound`] iff one of `stores` doesn't exist.
	fn transaction(&self, stores: &[&str], mode: Mode) -> Result<Self::Transaction, CacheError>;
}

/// Reads and writes within a scope of object stores. Dropping it without [`Transaction::commit`] aborts it.
///
/// Every operation fails with [`CacheError::NotInScope`] for stores outside the scope,
/// writes fail with [`CacheError::ReadOnly`] in [`Mode::ReadOnly`] transactions,
/// and everything fails with [`CacheError::Finished`] after commit or abort.
pub trait Transaction {
	fn mode(&self) -> Mode;

	async fn get(&self, store: &str, key: &Key) -> Result<Option<Vec<u8>>, CacheError>;

	/// Inserts or replaces the record at `key`, dropping its previous index keys.
	async fn put(&self, store: &str, key: Key, value: Vec<u8>) -> Result<(), CacheError> {
		self.put_indexed(store, key, value, &[]).await
	}

	/// Like [`Transaction::put`], with explicit keys for secondary indexes.
	///
	/// # Errors
	///
	/// [`CacheError::NotFound`] iff an index doesn't exist, [`CacheError::Constraint`] iff a unique index already maps the key to another record.
	async fn put_indexed(&self, store: &str, key: Key, value: Vec<u8>, indexes: &[(&str, Key)]) -> Result<(), CacheError>;

	/// Inserts a new record and returns its key. Without `key`, the store generates one.
	async fn add(&self, store: &str, key: Option<Key>, value: Vec<u8>) -> Result<Key, CacheError> {
		self.add_indexed(store, key, value, &[]).await
	}

	/// Like [`Transaction::add`], with explicit keys for secondary indexes.
	///
	/// # Errors
	///
	/// [`CacheError::Constraint`] iff there is a record at `key` already or a unique index already maps the key to another record,
	/// [`CacheError::KeyRequired`] iff `key` is [`None`] but the store isn't [`auto_increment`](`StoreOptions::auto_increment`),
	/// [`CacheError::NotFound`] iff an index doesn't exist.
	async fn add_indexed(&self, store: &str, key: Option<Key>, value: Vec<u8>, indexes: &[(&str, Key)]) -> Result<Key, CacheError>;

	/// Deleting a missing record is a no-op.
	async fn delete(&self, store: &str, key: &Key) -> Result<(), CacheError> {
		self.delete_range(store, &KeyRange::only(key.clone())).await
	}

	async fn delete_range(&self, store: &str, range: &KeyRange) -> Result<(), CacheError>;

	/// Deletes every record of `store`.
	async fn clear(&self, store: &str) -> Result<(), CacheError> {
		self.delete_range(store, &KeyRange::all()).await
	}

	async fn count(&self, store: &str, range: &KeyRange) -> Result<usize, CacheError>;

	/// The values in `range`, in ascending key order, at most `limit` of them.
	async fn get_all(&self, store: &str, range: &KeyRange, limit: Option<usize>) -> Result<Vec<Vec<u8>>, CacheError> {
		let records = self.scan(store, range, Direction::Next, limit).await?;
		Ok(records.into_iter().map(|(_, value)| value).collect())
	}

	/// The records in `range`, walked in `direction`, at most `limit` of them.
	async fn scan(&self, store: &str, range: &KeyRange, direction: Direction, limit: Option<usize>) -> Result<Vec<(Key, Vec<u8>)>, CacheError>;

	/// The records whose index key is in `range`, ordered by index key and then by record key.
	async fn scan_index(&self, store: &str, index: &str, range: &KeyRange, direction: Direction, limit: Option<usize>) -> Result<Vec<IndexEntry>, CacheError>;

	/// Makes the writes visible to other transactions.
	///
	/// # Errors
	///
	/// [`CacheError::Constraint`] iff a write conflicts with one committed by an overlapping transaction in the meantime.
	/// Nothing is written in that case.
	async fn commit(self) -> Result<(), CacheError>;

	/// Discards the writes.
	async fn abort(self) -> Result<(), CacheError>;
}

/// Reads `key` from `store` in its own read-only transaction.
///
/// # Errors
///
/// See [`Transaction`].
#[instrument(skip(database))]
pub async fn cache_get<D: Database>(database: &D, store: &str, key: &Key) -> Result<Option<Vec<u8>>, CacheError> {
	let transaction = database.transaction(&[store], Mode::ReadOnly)?;
	let value = transaction.get(store, key).await?;
	transaction.commit().await?;
	trace!(found = value.is_some());
	Ok(value)
}

/// Writes `value` to `key` in `store` in its own committed transaction.
///
/// # Errors
///
/// See [`Transaction`].
#[instrument(skip(database, value), fields(len = value.len()))]
pub async fn cache_put<D: Database>(database: &D, store: &str, key: Key, value: Vec<u8>) -> Result<(), CacheError> {
	let transaction = database.transaction(&[store], Mode::ReadWrite)?;
	transaction.put(store, key, value).await?;
	transaction.commit().await
}

/// Adds `value` to `store` in its own committed transaction, returning its key.
///
/// # Errors
///
/// See [`Transaction::add`].
#[instrument(skip(database, value), fields(len = value.len()))]
pub async fn cache_add<D: Database>(database: &D, store: &str, key: Option<Key>, value: Vec<u8>) -> Result<Key, CacheError> {
	let transaction = database.transaction(&[store], Mode::ReadWrite)?;
	let key = transaction.add(store, key, value).await?;
	transaction.commit().await?;
	trace!(%key, "Added.");
	Ok(key)
}

/// Deletes `key` from `store` in its own committed transaction.
///
/// # Errors
///
/// See [`Transaction`].
#[instrument(skip(database))]
pub async fn cache_delete<D: Database>(database: &D, store: &str, key: &Key) -> Result<(), CacheError> {
	let transaction = database.transaction(&[store], Mode::ReadWrite)?;
	transaction.delete(store, key).await?;
	transaction.commit().await
}
