//! In-memory blob store adapter. An engine runs on it through
//! `Engine::open_with`, trading durability for a setup without any
//! filesystem footprint; tests and throwaway engines are its users.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use omnio_util::error::Error;

use crate::{IPartWriter, IStore, Store};

type EntityMap = HashMap<String, BTreeMap<u32, Bytes>>;

pub struct MemStore {
	entities: Arc<Mutex<EntityMap>>,
}

impl MemStore {
	pub fn init() -> Store {
		Store(Arc::new(MemStore {
			entities: Arc::new(Mutex::new(HashMap::new())),
		}))
	}
}

#[async_trait]
impl IStore for MemStore {
	fn engine(&self) -> String {
		"in-memory tree".to_string()
	}

	async fn ensure_entity(&self, entity: &str) -> Result<(), Error> {
		self.entities
			.lock()
			.unwrap()
			.entry(entity.to_string())
			.or_default();
		Ok(())
	}

	async fn remove_entity(&self, entity: &str) -> Result<bool, Error> {
		Ok(self.entities.lock().unwrap().remove(entity).is_some())
	}

	async fn read_part(&self, entity: &str, part: u32) -> Result<Bytes, Error> {
		self.entities
			.lock()
			.unwrap()
			.get(entity)
			.and_then(|parts| parts.get(&part))
			.cloned()
			.ok_or_else(|| Error::EntryPathNotFound(format!("{}/{}", entity, part)))
	}

	async fn part_writer(
		&self,
		entity: &str,
		part: u32,
		keep_existing: bool,
	) -> Result<Box<dyn IPartWriter>, Error> {
		let buf = if keep_existing {
			let map = self.entities.lock().unwrap();
			map.get(entity)
				.and_then(|parts| parts.get(&part))
				.map(|b| b.to_vec())
				.ok_or_else(|| Error::EntryPathNotFound(format!("{}/{}", entity, part)))?
		} else {
			vec![]
		};

		Ok(Box::new(MemPartWriter {
			entities: self.entities.clone(),
			entity: entity.to_string(),
			part,
			buf,
		}))
	}
}

struct MemPartWriter {
	entities: Arc<Mutex<EntityMap>>,
	entity: String,
	part: u32,
	buf: Vec<u8>,
}

#[async_trait]
impl IPartWriter for MemPartWriter {
	async fn write(&mut self, buf: &[u8]) -> Result<(), Error> {
		self.buf.extend_from_slice(buf);
		Ok(())
	}

	async fn close(self: Box<Self>) -> Result<(), Error> {
		let MemPartWriter {
			entities,
			entity,
			part,
			buf,
		} = *self;

		let mut map = entities.lock().unwrap();
		let parts = map
			.get_mut(&entity)
			.ok_or_else(|| Error::EntryPathNotFound(entity.clone()))?;
		parts.insert(part, Bytes::from(buf));
		Ok(())
	}

	async fn abort(self: Box<Self>) -> Result<(), Error> {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_roundtrip() {
		let store = MemStore::init();
		store.ensure_entity("e1").await.unwrap();

		let mut w = store.part_writer("e1", 1, false).await.unwrap();
		w.write(b"foo").await.unwrap();
		w.close().await.unwrap();

		assert_eq!(&store.read_part("e1", 1).await.unwrap()[..], b"foo");
	}

	#[tokio::test]
	async fn test_keep_existing() {
		let store = MemStore::init();
		store.ensure_entity("e1").await.unwrap();

		let mut w = store.part_writer("e1", 1, false).await.unwrap();
		w.write(b"foo").await.unwrap();
		w.close().await.unwrap();

		let mut w = store.part_writer("e1", 1, true).await.unwrap();
		w.write(b"bar").await.unwrap();
		w.close().await.unwrap();

		assert_eq!(&store.read_part("e1", 1).await.unwrap()[..], b"foobar");
	}

	#[tokio::test]
	async fn test_abort_discards() {
		let store = MemStore::init();
		store.ensure_entity("e1").await.unwrap();

		let mut w = store.part_writer("e1", 1, false).await.unwrap();
		w.write(b"foo").await.unwrap();
		w.abort().await.unwrap();

		assert!(matches!(
			store.read_part("e1", 1).await,
			Err(Error::EntryPathNotFound(_))
		));
	}
}
