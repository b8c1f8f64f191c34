use super::{CacheError, Database, Direction, IndexEntry, Key, KeyRange, Mode, Schema, StoreHost, StoreOptions, Transaction};
use crate::HostError;
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	ops::Bound,
};
use futures::channel::oneshot;
use js_sys::{Array, ArrayBuffer, Object, Reflect, Uint8Array};
use std::rc::Rc;
use tracing::{debug, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{DomException, IdbCursorDirection, IdbCursorWithValue, IdbIndexParameters, IdbKeyRange, IdbObjectStore, IdbObjectStoreParameters, IdbOpenDbRequest, IdbRequest, IdbTransactionMode, IdbVersionChangeEvent};

const VALUE: &str = "v";
const INDEX_KEYS: &str = "i";

type Sender<T> = Rc<RefCell<Option<oneshot::Sender<Result<T, CacheError>>>>>;

fn finish<T>(sender: &Sender<T>, result: Result<T, CacheError>) {
	if let Some(sender) = sender.borrow_mut().take() {
		if sender.send(result).is_err() {
			trace!("Nobody is waiting for this request anymore.");
		}
	}
}

fn dom_error(operation: &'static str, error: &JsValue) -> CacheError {
	let exception = error.dyn_ref::<DomException>();
	let message = exception.map_or_else(|| format!("{:?}", error), DomException::message);
	match exception.map(DomException::name).as_deref() {
		Some("ConstraintError") => CacheError::Constraint(message),
		Some("NotFoundError") => CacheError::NotFound(message),
		Some("ReadOnlyError") => CacheError::ReadOnly,
		Some("TransactionInactiveError") => CacheError::Finished,
		// The versions are filled in by `IdbStore::open`.
		Some("VersionError") => CacheError::VersionError { requested: 0, current: 0 },
		_ => CacheError::Host(HostError::new(operation, message)),
	}
}

fn request_error(operation: &'static str, request: &IdbRequest) -> CacheError {
	match request.error() {
		Ok(Some(exception)) => dom_error(operation, &exception.into()),
		Ok(None) => CacheError::Host(HostError::new(operation, "The request failed without an error.")),
		Err(error) => dom_error(operation, &error),
	}
}

fn dropped(operation: &'static str) -> CacheError {
	CacheError::Host(HostError::new(operation, "The request was dropped before it completed."))
}

/// The largest integer key that survives the trip through a JavaScript number.
const MAX_INTEGER_KEY: u64 = 1 << 53;

#[allow(clippy::cast_precision_loss)]
fn to_js_key(key: &Key) -> JsValue {
	match key {
		Key::Integer(integer) => JsValue::from_f64(*integer as f64),
		Key::Text(text) => JsValue::from_str(text),
		Key::Bytes(bytes) => Uint8Array::from(bytes.as_slice()).buffer().into(),
	}
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss, clippy::float_cmp)]
fn from_js_key(operation: &'static str, key: &JsValue) -> Result<Key, CacheError> {
	if let Some(number) = key.as_f64() {
		let integer = number as u64;
		if number >= 0.0 && integer <= MAX_INTEGER_KEY && integer as f64 == number {
			return Ok(Key::Integer(integer));
		}
		Err(CacheError::Host(HostError::new(operation, format!("Unsupported number key {}.", number))))
	} else if let Some(text) = key.as_string() {
		Ok(Key::Text(text))
	} else if let Some(buffer) = key.dyn_ref::<ArrayBuffer>() {
		Ok(Key::Bytes(Uint8Array::new(buffer).to_vec()))
	} else if let Some(view) = key.dyn_ref::<Uint8Array>() {
		Ok(Key::Bytes(view.to_vec()))
	} else {
		Err(CacheError::Host(HostError::new(operation, format!("Unsupported key {:?}.", key))))
	}
}

/// `Ok(None)` for [`KeyRange::all`].
fn to_js_range(range: &KeyRange) -> Result<Option<IdbKeyRange>, CacheError> {
	let js_range = match (&range.lower, &range.upper) {
		(Bound::Unbounded, Bound::Unbounded) => return Ok(None),
		(Bound::Included(lower), Bound::Included(upper)) if lower == upper => IdbKeyRange::only(&to_js_key(lower)),
		(Bound::Included(lower) | Bound::Excluded(lower), Bound::Unbounded) => IdbKeyRange::lower_bound_with_open(&to_js_key(lower), matches!(range.lower, Bound::Excluded(_))),
		(Bound::Unbounded, Bound::Included(upper) | Bound::Excluded(upper)) => IdbKeyRange::upper_bound_with_open(&to_js_key(upper), matches!(range.upper, Bound::Excluded(_))),
		(Bound::Included(lower) | Bound::Excluded(lower), Bound::Included(upper) | Bound::Excluded(upper)) => IdbKeyRange::bound_with_lower_open_and_upper_open(
			&to_js_key(lower),
			&to_js_key(upper),
			matches!(range.lower, Bound::Excluded(_)),
			matches!(range.upper, Bound::Excluded(_)),
		),
	};
	js_range.map(Some).map_err(|error| dom_error("IDBKeyRange", &error))
}

fn range_value(range: Option<&IdbKeyRange>) -> JsValue {
	range.map_or(JsValue::UNDEFINED, |range| range.clone().into())
}

fn string_list(list: &web_sys::DomStringList) -> Vec<String> {
	(0..list.length()).filter_map(|index| list.get(index)).collect()
}

/// Resolves once `request` succeeds or fails.
async fn settle(operation: &'static str, request: IdbRequest) -> Result<JsValue, CacheError> {
	let (sender, receiver) = oneshot::channel();
	let sender: Sender<JsValue> = Rc::new(RefCell::new(Some(sender)));

	let on_success = {
		let (sender, request) = (Rc::clone(&sender), request.clone());
		Closure::<dyn FnMut(web_sys::Event)>::new(move |_| finish(&sender, request.result().map_err(|error| dom_error(operation, &error))))
	};
	let on_error = {
		let (sender, request) = (Rc::clone(&sender), request.clone());
		Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
			event.prevent_default();
			finish(&sender, Err(request_error(operation, &request)));
		})
	};
	request.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
	request.set_onerror(Some(on_error.as_ref().unchecked_ref()));

	let result = receiver.await.map_err(|_| dropped(operation));
	request.set_onsuccess(None);
	request.set_onerror(None);
	result?
}

/// Walks the cursor opened by `request`, collecting up to `limit` items.
async fn walk<T: 'static>(operation: &'static str, request: IdbRequest, limit: Option<usize>, mut visit: impl 'static + FnMut(&IdbCursorWithValue) -> Result<T, CacheError>) -> Result<Vec<T>, CacheError> {
	let limit = limit.unwrap_or(usize::MAX);
	let (sender, receiver) = oneshot::channel();
	let sender: Sender<()> = Rc::new(RefCell::new(Some(sender)));
	let found = Rc::new(RefCell::new(Vec::new()));
	if limit == 0 {
		return Ok(Vec::new());
	}

	let on_success = {
		let (sender, request, found) = (Rc::clone(&sender), request.clone(), Rc::clone(&found));
		Closure::<dyn FnMut(web_sys::Event)>::new(move |_| {
			let cursor = match request.result() {
				Ok(cursor) => cursor,
				Err(error) => return finish(&sender, Err(dom_error(operation, &error))),
			};
			let cursor = match cursor.dyn_into::<IdbCursorWithValue>() {
				Ok(cursor) => cursor,
				// `null`: past the end.
				Err(_) => return finish(&sender, Ok(())),
			};
			match visit(&cursor) {
				Ok(item) => found.borrow_mut().push(item),
				Err(error) => return finish(&sender, Err(error)),
			}
			if found.borrow().len() >= limit {
				return finish(&sender, Ok(()));
			}
			if let Err(error) = cursor.continue_() {
				finish(&sender, Err(dom_error("continue", &error)));
			}
		})
	};
	let on_error = {
		let (sender, request) = (Rc::clone(&sender), request.clone());
		Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
			event.prevent_default();
			finish(&sender, Err(request_error(operation, &request)));
		})
	};
	request.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
	request.set_onerror(Some(on_error.as_ref().unchecked_ref()));

	let result = receiver.await.map_err(|_| dropped(operation));
	request.set_onsuccess(None);
	request.set_onerror(None);
	result??;
	Ok(found.take())
}

/// Opens [***IndexedDB***](https://developer.mozilla.org/en-US/docs/Web/API/IndexedDB_API) databases.
///
/// Records are stored as `{ v: ArrayBuffer-backed bytes, i: { <index>: <index key> } }` under out-of-line keys,
/// and each index is created over the key path `i.<index>`.
#[derive(Debug, Clone)]
pub struct IdbStore {
	factory: web_sys::IdbFactory,
}
impl IdbStore {
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	async fn stored_version(&self, name: &str) -> Result<u32, CacheError> {
		let request = self.factory.open(name).map_err(|error| dom_error("open", &error))?;
		let database = settle("open", request.into())
			.await?
			.dyn_into::<web_sys::IdbDatabase>()
			.map_err(|error| dom_error("open", &error))?;
		let version = database.version() as u32;
		database.close();
		Ok(version)
	}

	/// # Errors
	///
	/// Iff there is no global `window` or it has no `indexedDB`.
	pub fn new() -> Result<Self, CacheError> {
		let window = web_sys::window().ok_or_else(|| HostError::new("window", "There is no global `window`."))?;
		match window.indexed_db() {
			Ok(Some(factory)) => Ok(Self { factory }),
			Ok(None) => Err(HostError::new("indexedDB", "IndexedDB is unavailable.").into()),
			Err(error) => Err(dom_error("indexedDB", &error)),
		}
	}
}

struct IdbSchema {
	database: web_sys::IdbDatabase,
	transaction: web_sys::IdbTransaction,
}
impl IdbSchema {
	fn object_store(&self, store: &str) -> Result<IdbObjectStore, CacheError> {
		self.transaction.object_store(store).map_err(|error| dom_error("objectStore", &error))
	}
}
impl Schema for IdbSchema {
	fn store_names(&self) -> Vec<String> {
		string_list(&self.database.object_store_names())
	}

	fn create_store_with(&mut self, name: &str, options: StoreOptions) -> Result<(), CacheError> {
		let parameters = IdbObjectStoreParameters::new();
		parameters.set_auto_increment(options.auto_increment);
		self.database
			.create_object_store_with_optional_parameters(name, &parameters)
			.map(drop)
			.map_err(|error| dom_error("createObjectStore", &error))
	}

	fn delete_store(&mut self, name: &str) -> Result<(), CacheError> {
		self.database.delete_object_store(name).map_err(|error| dom_error("deleteObjectStore", &error))
	}

	fn create_index(&mut self, store: &str, index: &str, unique: bool) -> Result<(), CacheError> {
		let parameters = IdbIndexParameters::new();
		parameters.set_unique(unique);
		self.object_store(store)?
			.create_index_with_str_and_optional_parameters(index, &format!("{}.{}", INDEX_KEYS, index), &parameters)
			.map(drop)
			.map_err(|error| dom_error("createIndex", &error))
	}

	fn delete_index(&mut self, store: &str, index: &str) -> Result<(), CacheError> {
		self.object_store(store)?.delete_index(index).map_err(|error| dom_error("deleteIndex", &error))
	}
}

impl StoreHost for IdbStore {
	type Database = IdbDatabase;

	#[instrument(skip(self, upgrade))]
	async fn open<U>(&self, name: &str, version: u32, upgrade: U) -> Result<IdbDatabase, CacheError>
	where
		U: 'static + FnOnce(&mut dyn Schema, u32) -> Result<(), CacheError>,
	{
		if version == 0 {
			return Err(CacheError::VersionError { requested: 0, current: 0 });
		}
		let request: IdbOpenDbRequest = self.factory.open_with_u32(name, version).map_err(|error| dom_error("open", &error))?;
		let upgrade_error = Rc::new(RefCell::new(None::<CacheError>));

		let on_upgrade = {
			let (request, upgrade_error) = (request.clone(), Rc::clone(&upgrade_error));
			Closure::once(move |event: IdbVersionChangeEvent| {
				#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
				let old_version = event.old_version() as u32;
				debug!(from = old_version, to = version, "Upgrading.");
				let schema = request.result().and_then(JsCast::dyn_into::<web_sys::IdbDatabase>).map_err(|error| dom_error("open", &error));
				let transaction = request.transaction();
				let result = match (schema, transaction) {
					(Ok(database), Some(transaction)) => {
						let mut schema = IdbSchema { database, transaction };
						let result = upgrade(&mut schema, old_version);
						if result.is_err() {
							if let Err(error) = schema.transaction.abort() {
								warn!("Could not abort the upgrade: {:?}", error);
							}
						}
						result
					}
					(Err(error), _) => Err(error),
					(Ok(_), None) => Err(HostError::new("open", "The upgrade has no transaction.").into()),
				};
				if let Err(error) = result {
					*upgrade_error.borrow_mut() = Some(error);
				}
			})
		};
		let on_blocked = Closure::<dyn FnMut(web_sys::Event)>::new(|_| warn!("Opening is blocked by another connection."));
		request.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));
		request.set_onblocked(Some(on_blocked.as_ref().unchecked_ref()));

		let result = settle("open", request.clone().into()).await;
		request.set_onupgradeneeded(None);
		request.set_onblocked(None);

		if let Some(error) = upgrade_error.take() {
			return Err(error);
		}
		let database = match result {
			Ok(database) => database.dyn_into::<web_sys::IdbDatabase>().map_err(|error| dom_error("open", &error))?,
			Err(CacheError::VersionError { .. }) => {
				return Err(CacheError::VersionError {
					requested: version,
					current: self.stored_version(name).await?,
				})
			}
			Err(error) => return Err(error),
		};
		Ok(IdbDatabase { name: name.to_owned(), database })
	}

	#[instrument(skip(self))]
	async fn delete_database(&self, name: &str) -> Result<(), CacheError> {
		let request = self.factory.delete_database(name).map_err(|error| dom_error("deleteDatabase", &error))?;
		settle("deleteDatabase", request.into()).await.map(drop)
	}
}

/// A database opened through an [`IdbStore`].
#[derive(Debug, Clone)]
pub struct IdbDatabase {
	name: String,
	database: web_sys::IdbDatabase,
}
impl IdbDatabase {
	/// Closes the connection once its transactions are done.
	pub fn close(&self) {
		self.database.close();
	}
}
impl Database for IdbDatabase {
	type Transaction = IdbTransaction;

	fn name(&self) -> &str {
		&self.name
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn version(&self) -> u32 {
		self.database.version() as u32
	}

	fn store_names(&self) -> Vec<String> {
		string_list(&self.database.object_store_names())
	}

	fn transaction(&self, stores: &[&str], mode: Mode) -> Result<IdbTransaction, CacheError> {
		let names: Array = stores.iter().map(|&store| JsValue::from_str(store)).collect();
		let transaction = self
			.database
			.transaction_with_str_sequence_and_mode(
				&names,
				match mode {
					Mode::ReadOnly => IdbTransactionMode::Readonly,
					Mode::ReadWrite => IdbTransactionMode::Readwrite,
				},
			)
			.map_err(|error| dom_error("transaction", &error))?;
		Ok(IdbTransaction::new(transaction, stores, mode))
	}
}

/// A transaction of an [`IdbDatabase`].
pub struct IdbTransaction {
	transaction: web_sys::IdbTransaction,
	scope: Vec<String>,
	mode: Mode,
	finished: Cell<bool>,
	done: RefCell<Option<oneshot::Receiver<Result<(), CacheError>>>>,
	_on_complete: Closure<dyn FnMut(web_sys::Event)>,
	_on_error: Closure<dyn FnMut(web_sys::Event)>,
}
impl Debug for IdbTransaction {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("IdbTransaction")
			.field("scope", &self.scope)
			.field("mode", &self.mode)
			.field("finished", &self.finished.get())
			.finish_non_exhaustive()
	}
}
impl IdbTransaction {
	fn new(transaction: web_sys::IdbTransaction, scope: &[&str], mode: Mode) -> Self {
		let (sender, receiver) = oneshot::channel();
		let sender: Sender<()> = Rc::new(RefCell::new(Some(sender)));
		let on_complete = {
			let sender = Rc::clone(&sender);
			Closure::<dyn FnMut(web_sys::Event)>::new(move |_| finish(&sender, Ok(())))
		};
		let on_error = {
			let (sender, transaction) = (Rc::clone(&sender), transaction.clone());
			Closure::<dyn FnMut(web_sys::Event)>::new(move |_| {
				let error = match transaction.error() {
					Some(exception) => dom_error("transaction", &exception.into()),
					None => CacheError::Finished,
				};
				finish(&sender, Err(error));
			})
		};
		transaction.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
		transaction.set_onerror(Some(on_error.as_ref().unchecked_ref()));
		transaction.set_onabort(Some(on_error.as_ref().unchecked_ref()));
		Self {
			transaction,
			scope: scope.iter().map(|&store| store.to_owned()).collect(),
			mode,
			finished: Cell::new(false),
			done: RefCell::new(Some(receiver)),
			_on_complete: on_complete,
			_on_error: on_error,
		}
	}

	fn object_store(&self, store: &str) -> Result<IdbObjectStore, CacheError> {
		if self.finished.get() {
			return Err(CacheError::Finished);
		}
		if !self.scope.iter().any(|scoped| scoped == store) {
			return Err(CacheError::NotInScope(store.to_owned()));
		}
		self.transaction.object_store(store).map_err(|error| dom_error("objectStore", &error))
	}

	fn writable_store(&self, store: &str) -> Result<IdbObjectStore, CacheError> {
		let object_store = self.object_store(store)?;
		if self.mode == Mode::ReadOnly {
			return Err(CacheError::ReadOnly);
		}
		Ok(object_store)
	}

	async fn finish_with(&self, abort: bool) -> Result<(), CacheError> {
		if self.finished.replace(true) {
			return Err(CacheError::Finished);
		}
		let call = if abort { self.transaction.abort() } else { self.transaction.commit() };
		call.map_err(|error| dom_error(if abort { "abort" } else { "commit" }, &error))?;
		let receiver = self.done.borrow_mut().take().ok_or(CacheError::Finished)?;
		match receiver.await.map_err(|_| dropped("transaction"))? {
			Err(CacheError::Finished) if abort => Ok(()),
			result => result,
		}
	}
}
impl Drop for IdbTransaction {
	fn drop(&mut self) {
		self.transaction.set_oncomplete(None);
		self.transaction.set_onerror(None);
		self.transaction.set_onabort(None);
		if !self.finished.get() {
			trace!("Transaction dropped without commit. Aborting.");
			if let Err(error) = self.transaction.abort() {
				trace!("Could not abort, the transaction probably finished already: {:?}", error);
			}
		}
	}
}

fn record_value(operation: &'static str, record: &JsValue) -> Result<Vec<u8>, CacheError> {
	Reflect::get(record, &JsValue::from_str(VALUE))
		.map_err(|error| dom_error(operation, &error))?
		.dyn_into::<Uint8Array>()
		.map(|value| value.to_vec())
		.map_err(|value| CacheError::Host(HostError::new(operation, format!("Unexpected record value {:?}.", value))))
}

/// `{ v: value, i: { <index>: <index key> } }`
fn build_record(operation: &'static str, object_store: &IdbObjectStore, value: &[u8], indexes: &[(&str, Key)]) -> Result<Object, CacheError> {
	let index_names = object_store.index_names();
	let index_keys = Object::new();
	for (name, index_key) in indexes {
		if !index_names.contains(name) {
			return Err(CacheError::NotFound((*name).to_owned()));
		}
		Reflect::set(&index_keys, &JsValue::from_str(name), &to_js_key(index_key)).map_err(|error| dom_error(operation, &error))?;
	}
	let record = Object::new();
	Reflect::set(&record, &JsValue::from_str(VALUE), &Uint8Array::from(value)).map_err(|error| dom_error(operation, &error))?;
	Reflect::set(&record, &JsValue::from_str(INDEX_KEYS), &index_keys).map_err(|error| dom_error(operation, &error))?;
	Ok(record)
}

fn direction(direction: Direction) -> IdbCursorDirection {
	match direction {
		Direction::Next => IdbCursorDirection::Next,
		Direction::Prev => IdbCursorDirection::Prev,
	}
}

impl Transaction for IdbTransaction {
	fn mode(&self) -> Mode {
		self.mode
	}

	async fn get(&self, store: &str, key: &Key) -> Result<Option<Vec<u8>>, CacheError> {
		let request = self.object_store(store)?.get(&to_js_key(key)).map_err(|error| dom_error("get", &error))?;
		let record = settle("get", request).await?;
		if record.is_undefined() {
			return Ok(None);
		}
		record_value("get", &record).map(Some)
	}

	async fn put_indexed(&self, store: &str, key: Key, value: Vec<u8>, indexes: &[(&str, Key)]) -> Result<(), CacheError> {
		let object_store = self.writable_store(store)?;
		let record = build_record("put", &object_store, &value, indexes)?;
		let request = object_store.put_with_key(&record, &to_js_key(&key)).map_err(|error| dom_error("put", &error))?;
		settle("put", request).await.map(drop)
	}

	async fn add_indexed(&self, store: &str, key: Option<Key>, value: Vec<u8>, indexes: &[(&str, Key)]) -> Result<Key, CacheError> {
		let object_store = self.writable_store(store)?;
		let record = build_record("add", &object_store, &value, indexes)?;
		let request = match &key {
			Some(key) => object_store.add_with_key(&record, &to_js_key(key)),
			None if object_store.auto_increment() => object_store.add(&record),
			None => return Err(CacheError::KeyRequired(store.to_owned())),
		}
		.map_err(|error| dom_error("add", &error))?;
		let generated = settle("add", request).await?;
		match key {
			Some(key) => Ok(key),
			None => from_js_key("add", &generated),
		}
	}

	async fn delete_range(&self, store: &str, range: &KeyRange) -> Result<(), CacheError> {
		let object_store = self.writable_store(store)?;
		if range.is_empty() {
			return Ok(());
		}
		let request = match to_js_range(range)? {
			None => object_store.clear(),
			Some(js_range) => object_store.delete(&js_range),
		}
		.map_err(|error| dom_error("delete", &error))?;
		settle("delete", request).await.map(drop)
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	async fn count(&self, store: &str, range: &KeyRange) -> Result<usize, CacheError> {
		let object_store = self.object_store(store)?;
		if range.is_empty() {
			return Ok(0);
		}
		let request = object_store.count_with_key(&range_value(to_js_range(range)?.as_ref())).map_err(|error| dom_error("count", &error))?;
		settle("count", request).await.map(|count| count.as_f64().unwrap_or(0.0) as usize)
	}

	async fn scan(&self, store: &str, range: &KeyRange, direction_: Direction, limit: Option<usize>) -> Result<Vec<(Key, Vec<u8>)>, CacheError> {
		let object_store = self.object_store(store)?;
		if range.is_empty() {
			return Ok(Vec::new());
		}
		let request = object_store
			.open_cursor_with_range_and_direction(&range_value(to_js_range(range)?.as_ref()), direction(direction_))
			.map_err(|error| dom_error("openCursor", &error))?;
		walk("openCursor", request, limit, |cursor| {
			let key = from_js_key("openCursor", &cursor.key().map_err(|error| dom_error("openCursor", &error))?)?;
			let value = record_value("openCursor", &cursor.value().map_err(|error| dom_error("openCursor", &error))?)?;
			Ok((key, value))
		})
		.await
	}

	async fn scan_index(&self, store: &str, index: &str, range: &KeyRange, direction_: Direction, limit: Option<usize>) -> Result<Vec<IndexEntry>, CacheError> {
		let index = self.object_store(store)?.index(index).map_err(|error| dom_error("index", &error))?;
		if range.is_empty() {
			return Ok(Vec::new());
		}
		let request = index
			.open_cursor_with_range_and_direction(&range_value(to_js_range(range)?.as_ref()), direction(direction_))
			.map_err(|error| dom_error("openCursor", &error))?;
		walk("openCursor", request, limit, |cursor| {
			Ok(IndexEntry {
				index_key: from_js_key("openCursor", &cursor.key().map_err(|error| dom_error("openCursor", &error))?)?,
				key: from_js_key("openCursor", &cursor.primary_key().map_err(|error| dom_error("openCursor", &error))?)?,
				value: record_value("openCursor", &cursor.value().map_err(|error| dom_error("openCursor", &error))?)?,
			})
		})
		.await
	}

	#[instrument(skip(self))]
	async fn commit(self) -> Result<(), CacheError> {
		self.finish_with(false).await
	}

	#[instrument(skip(self))]
	async fn abort(self) -> Result<(), CacheError> {
		self.finish_with(true).await
	}
}
