//! Local-filesystem blob store adapter

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use omnio_util::error::Error;

use crate::{IPartWriter, IStore, Store, SCRATCH_SUFFIX};

pub struct LocalStore {
	storage_dir: PathBuf,
}

impl LocalStore {
	/// Open a local store rooted at `storage_dir`, creating it if needed
	pub async fn init(storage_dir: PathBuf) -> Result<Store, Error> {
		fs::create_dir_all(&storage_dir).await?;
		Ok(Store(Arc::new(LocalStore { storage_dir })))
	}

	fn entity_dir(&self, entity: &str) -> PathBuf {
		self.storage_dir.join(entity)
	}

	fn part_path(&self, entity: &str, part: u32) -> PathBuf {
		self.entity_dir(entity).join(part.to_string())
	}
}

#[async_trait]
impl IStore for LocalStore {
	fn engine(&self) -> String {
		format!("local filesystem at {}", self.storage_dir.display())
	}

	async fn ensure_entity(&self, entity: &str) -> Result<(), Error> {
		fs::create_dir_all(self.entity_dir(entity)).await?;
		Ok(())
	}

	async fn remove_entity(&self, entity: &str) -> Result<bool, Error> {
		match fs::remove_dir_all(self.entity_dir(entity)).await {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}

	async fn read_part(&self, entity: &str, part: u32) -> Result<Bytes, Error> {
		let path = self.part_path(entity, part);
		match fs::read(&path).await {
			Ok(data) => Ok(Bytes::from(data)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Err(Error::EntryPathNotFound(path.display().to_string()))
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn part_writer(
		&self,
		entity: &str,
		part: u32,
		keep_existing: bool,
	) -> Result<Box<dyn IPartWriter>, Error> {
		let target = self.part_path(entity, part);
		let mut scratch = target.clone();
		scratch.set_file_name(format!("{}{}", part, SCRATCH_SUFFIX));

		let file = if keep_existing {
			match fs::copy(&target, &scratch).await {
				Ok(_) => (),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
					return Err(Error::EntryPathNotFound(target.display().to_string()));
				}
				Err(e) => return Err(e.into()),
			}
			fs::OpenOptions::new().append(true).open(&scratch).await?
		} else {
			fs::File::create(&scratch).await?
		};

		Ok(Box::new(LocalPartWriter {
			file,
			target,
			scratch: scratch.clone(),
			guard: ScratchGuard(Some(scratch)),
		}))
	}
}

struct LocalPartWriter {
	file: fs::File,
	target: PathBuf,
	scratch: PathBuf,
	guard: ScratchGuard,
}

#[async_trait]
impl IPartWriter for LocalPartWriter {
	async fn write(&mut self, buf: &[u8]) -> Result<(), Error> {
		self.file.write_all(buf).await?;
		Ok(())
	}

	async fn close(self: Box<Self>) -> Result<(), Error> {
		let LocalPartWriter {
			mut file,
			target,
			scratch,
			mut guard,
		} = *self;

		file.flush().await?;
		file.sync_all().await?;
		drop(file);

		fs::rename(&scratch, &target).await?;
		guard.cancel();

		// fsync the containing directory so the rename is durable
		if let Some(dir) = target.parent() {
			let dir = fs::File::open(dir).await?;
			dir.sync_all().await?;
		}

		Ok(())
	}

	async fn abort(self: Box<Self>) -> Result<(), Error> {
		let LocalPartWriter {
			file,
			scratch,
			mut guard,
			..
		} = *self;

		drop(file);
		guard.cancel();

		match fs::remove_file(&scratch).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

struct ScratchGuard(Option<PathBuf>);

impl ScratchGuard {
	fn cancel(&mut self) {
		drop(self.0.take());
	}
}

impl Drop for ScratchGuard {
	fn drop(&mut self) {
		if let Some(path) = self.0.take() {
			if let Ok(handle) = tokio::runtime::Handle::try_current() {
				handle.spawn(async move {
					if let Err(e) = fs::remove_file(&path).await {
						if e.kind() != std::io::ErrorKind::NotFound {
							debug!("Scratch cleanup failed for {}: {}", path.display(), e);
						}
					}
				});
			} else if let Err(e) = std::fs::remove_file(&path) {
				if e.kind() != std::io::ErrorKind::NotFound {
					debug!("Scratch cleanup failed for {}: {}", path.display(), e);
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn test_store() -> (mktemp::Temp, Store) {
		let dir = mktemp::Temp::new_dir().unwrap();
		let store = LocalStore::init(dir.to_path_buf().join("storage"))
			.await
			.unwrap();
		(dir, store)
	}

	#[tokio::test]
	async fn test_write_close_read() {
		let (_dir, store) = test_store().await;
		store.ensure_entity("e1").await.unwrap();

		let mut w = store.part_writer("e1", 1, false).await.unwrap();
		w.write(b"hello ").await.unwrap();
		w.write(b"world").await.unwrap();
		w.close().await.unwrap();

		let data = store.read_part("e1", 1).await.unwrap();
		assert_eq!(&data[..], b"hello world");
	}

	#[tokio::test]
	async fn test_abort_keeps_previous_content() {
		let (_dir, store) = test_store().await;
		store.ensure_entity("e1").await.unwrap();

		let mut w = store.part_writer("e1", 1, false).await.unwrap();
		w.write(b"before").await.unwrap();
		w.close().await.unwrap();

		let mut w = store.part_writer("e1", 1, false).await.unwrap();
		w.write(b"after").await.unwrap();
		w.abort().await.unwrap();

		let data = store.read_part("e1", 1).await.unwrap();
		assert_eq!(&data[..], b"before");
	}

	#[tokio::test]
	async fn test_keep_existing_appends() {
		let (_dir, store) = test_store().await;
		store.ensure_entity("e1").await.unwrap();

		let mut w = store.part_writer("e1", 1, false).await.unwrap();
		w.write(b"abc").await.unwrap();
		w.close().await.unwrap();

		let mut w = store.part_writer("e1", 1, true).await.unwrap();
		w.write(b"def").await.unwrap();
		w.close().await.unwrap();

		let data = store.read_part("e1", 1).await.unwrap();
		assert_eq!(&data[..], b"abcdef");
	}

	#[tokio::test]
	async fn test_keep_existing_requires_target() {
		let (_dir, store) = test_store().await;
		store.ensure_entity("e1").await.unwrap();

		let res = store.part_writer("e1", 1, true).await;
		assert!(matches!(res, Err(Error::EntryPathNotFound(_))));
	}

	#[tokio::test]
	async fn test_no_scratch_left_after_close() {
		let (dir, store) = test_store().await;
		store.ensure_entity("e1").await.unwrap();

		let mut w = store.part_writer("e1", 1, false).await.unwrap();
		w.write(b"x").await.unwrap();
		w.close().await.unwrap();

		let entity_dir = dir.to_path_buf().join("storage").join("e1");
		let mut names = vec![];
		for entry in std::fs::read_dir(&entity_dir).unwrap() {
			names.push(entry.unwrap().file_name().into_string().unwrap());
		}
		assert_eq!(names, vec!["1".to_string()]);
	}

	#[tokio::test]
	async fn test_remove_entity() {
		let (_dir, store) = test_store().await;
		store.ensure_entity("e1").await.unwrap();

		let mut w = store.part_writer("e1", 1, false).await.unwrap();
		w.write(b"x").await.unwrap();
		w.close().await.unwrap();

		assert!(store.remove_entity("e1").await.unwrap());
		assert!(!store.remove_entity("e1").await.unwrap());
		assert!(matches!(
			store.read_part("e1", 1).await,
			Err(Error::EntryPathNotFound(_))
		));
	}
}
