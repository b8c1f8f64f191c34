#![cfg(target_arch = "wasm32")]

use vdom_patch::cache::{cache_add, cache_get, cache_put, CacheError, Database, Direction, IdbStore, Key, KeyRange, Mode, Schema, StoreHost, StoreOptions, Transaction};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

async fn open(store: &IdbStore, name: &str) -> vdom_patch::cache::IdbDatabase {
	store.delete_database(name).await.unwrap();
	store
		.open(name, 1, |schema: &mut dyn Schema, from| {
			assert_eq!(from, 0);
			schema.create_store("pages")?;
			schema.create_index("pages", "title", true)
		})
		.await
		.unwrap()
}

#[wasm_bindgen_test]
async fn round_trip() {
	let store = IdbStore::new().unwrap();
	let database = open(&store, "vdom-patch-round-trip").await;

	cache_put(&database, "pages", "/".into(), b"home".to_vec()).await.unwrap();
	cache_put(&database, "pages", vec![1_u8, 2].into(), b"bytes".to_vec()).await.unwrap();
	assert_eq!(cache_get(&database, "pages", &"/".into()).await.unwrap(), Some(b"home".to_vec()));
	assert_eq!(cache_get(&database, "pages", &Key::Bytes(vec![1, 2])).await.unwrap(), Some(b"bytes".to_vec()));
	assert_eq!(cache_get(&database, "pages", &"/missing".into()).await.unwrap(), None);

	let transaction = database.transaction(&["pages"], Mode::ReadOnly).unwrap();
	let all = transaction.scan("pages", &KeyRange::all(), Direction::Prev, None).await.unwrap();
	assert_eq!(all.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>(), vec![Key::Bytes(vec![1, 2]), Key::from("/")]);
	assert_eq!(transaction.put("pages", "x".into(), vec![]).await, Err(CacheError::ReadOnly));
	transaction.commit().await.unwrap();

	database.close();
	store.delete_database("vdom-patch-round-trip").await.unwrap();
}

#[wasm_bindgen_test]
async fn abort_and_indexes() {
	let store = IdbStore::new().unwrap();
	let database = open(&store, "vdom-patch-indexes").await;

	let transaction = database.transaction(&["pages"], Mode::ReadWrite).unwrap();
	transaction.put_indexed("pages", "/a".into(), vec![1], &[("title", "A".into())]).await.unwrap();
	transaction.abort().await.unwrap();
	assert_eq!(cache_get(&database, "pages", &"/a".into()).await.unwrap(), None);

	let transaction = database.transaction(&["pages"], Mode::ReadWrite).unwrap();
	transaction.put_indexed("pages", "/a".into(), vec![1], &[("title", "A".into())]).await.unwrap();
	transaction.put_indexed("pages", "/b".into(), vec![2], &[("title", "B".into())]).await.unwrap();
	let found = transaction.scan_index("pages", "title", &KeyRange::only("B"), Direction::Next, None).await.unwrap();
	assert_eq!(found.len(), 1);
	assert_eq!(found[0].key, Key::from("/b"));
	transaction.commit().await.unwrap();

	assert!(matches!(
		store.open("vdom-patch-indexes", 0, |_: &mut dyn Schema, _| Ok(())).await.map(|_| ()),
		Err(CacheError::VersionError { .. })
	));

	database.close();
	store.delete_database("vdom-patch-indexes").await.unwrap();
}

#[wasm_bindgen_test]
async fn generated_keys() {
	let store = IdbStore::new().unwrap();
	store.delete_database("vdom-patch-generated").await.unwrap();
	let database = store
		.open("vdom-patch-generated", 1, |schema: &mut dyn Schema, _| {
			schema.create_store_with("entries", StoreOptions { auto_increment: true })?;
			schema.create_store("plain")
		})
		.await
		.unwrap();

	assert_eq!(cache_add(&database, "entries", None, b"one".to_vec()).await, Ok(Key::Integer(1)));
	assert_eq!(cache_add(&database, "entries", Some(Key::Integer(10)), b"ten".to_vec()).await, Ok(Key::Integer(10)));
	assert_eq!(cache_add(&database, "entries", None, b"eleven".to_vec()).await, Ok(Key::Integer(11)));
	assert!(matches!(cache_add(&database, "entries", Some(Key::Integer(1)), vec![]).await, Err(CacheError::Constraint(_))));
	assert_eq!(cache_add(&database, "plain", None, vec![]).await, Err(CacheError::KeyRequired("plain".to_owned())));

	let transaction = database.transaction(&["entries"], Mode::ReadOnly).unwrap();
	assert_eq!(transaction.get_all("entries", &KeyRange::all(), Some(2)).await.unwrap(), vec![b"one".to_vec(), b"ten".to_vec()]);
	transaction.commit().await.unwrap();

	database.close();
	store.delete_database("vdom-patch-generated").await.unwrap();
}
