//! The engine: public object API, lifecycle, and lock discipline.
//!
//! One engine serves one bucket. A single-writer / multi-reader lock
//! serializes catalog mutations and write streams against concurrent
//! readers; the lock queue is FIFO-fair, so a pending writer blocks the
//! readers queued after it. Closing the engine acquires the writer lock,
//! which waits for every in-flight stream instead of revoking it.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio::sync::{watch, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use omnio_db as db;

use omnio_model::catalog::{Catalog, ListOpts, SearchOpts};
use omnio_model::hash::Md5State;
use omnio_model::mime;
use omnio_model::object::{ObjectMeta, ObjectSummary, OpenMode, ReadOpts, SearchHit};
use omnio_model::schema;

use omnio_store::local::LocalStore;
use omnio_store::Store;

use omnio_util::config::Config;
use omnio_util::data::gen_uuid;
use omnio_util::error::Error;
use omnio_util::time::now_msec;

use crate::read_stream::ReadStream;
use crate::write_stream::{ObjectInfo, WriteStream, WriteStreamSetup};

/// Options accepted by `put_object` and `open_write`
#[derive(Debug, Default, Clone)]
pub struct WriteOpts {
	pub flag: OpenMode,
	/// MIME type; defaulted from the path extension (or kept from the
	/// existing object on append) when absent
	pub mime_type: Option<String>,
	pub object_tags: Option<Vec<String>>,
	pub description: Option<String>,
	pub user_metadata: Option<serde_json::Value>,
	/// Modification timestamp override, milliseconds
	pub timestamp: Option<u64>,
	pub part_size: Option<u64>,
	/// Compare-and-set guard for append mode: the write is rejected if the
	/// live object's checksum no longer matches
	pub expect_checksum: Option<String>,
}

/// Options accepted by `update_object_metadata`; `None` keeps the current
/// value
#[derive(Debug, Default, Clone)]
pub struct UpdateMetadataOpts {
	pub mime_type: Option<String>,
	pub object_tags: Option<Vec<String>>,
	pub description: Option<String>,
	pub user_metadata: Option<serde_json::Value>,
	pub timestamp: Option<u64>,
}

/// Options accepted by `copy_object`
#[derive(Debug, Clone)]
pub struct CopyOpts {
	pub flag: OpenMode,
}

impl Default for CopyOpts {
	fn default() -> Self {
		CopyOpts {
			flag: OpenMode::Write,
		}
	}
}

/// An object fetched into memory, with its metadata
pub struct ObjectFile {
	meta: ObjectMeta,
	bytes: Bytes,
}

impl ObjectFile {
	pub fn meta(&self) -> &ObjectMeta {
		&self.meta
	}

	pub fn bytes(&self) -> &Bytes {
		&self.bytes
	}

	pub fn into_bytes(self) -> Bytes {
		self.bytes
	}

	pub fn size(&self) -> u64 {
		self.meta.size
	}

	pub fn mime_type(&self) -> &str {
		&self.meta.mime_type
	}

	pub fn checksum(&self) -> &str {
		&self.meta.checksum
	}

	/// Re-verify the loaded bytes against the recorded checksum
	pub fn check(&self) -> Result<(), Error> {
		let mut hash = Md5State::new();
		hash.update(&self.bytes);
		let (checksum, _) = hash.digest();
		if checksum != self.meta.checksum {
			return Err(Error::ChecksumMismatch(self.meta.checksum.clone(), checksum));
		}
		Ok(())
	}
}

/// A metadata-driven object storage engine serving one bucket
pub struct Engine {
	config: Config,
	catalog: Catalog,
	store: Store,
	lock: Arc<RwLock<()>>,
	closed_tx: watch::Sender<bool>,
	closed_rx: watch::Receiver<bool>,
}

impl Engine {
	/// Open an engine on the local filesystem: part files under
	/// `<root>/<bucket>/storage/`, catalog in `<root>/<bucket>/metadata.db`
	pub async fn open(config: Config) -> Result<Engine, Error> {
		schema::check_bucket_name(&config.bucket_name, config.allow_bucket_dots)?;
		schema::check_part_size(config.part_size)?;

		let bucket_dir = config.root_dir.join(&config.bucket_name);
		tokio::fs::create_dir_all(&bucket_dir).await?;

		let store = LocalStore::init(bucket_dir.join("storage")).await?;
		let db = db::Db::open(&bucket_dir.join("metadata.db"))?;
		Self::open_with(config, store, db).await
	}

	/// Open an engine on explicit collaborators (e.g. an in-memory store
	/// and database)
	pub async fn open_with(config: Config, store: Store, db: db::Db) -> Result<Engine, Error> {
		schema::check_bucket_name(&config.bucket_name, config.allow_bucket_dots)?;
		schema::check_part_size(config.part_size)?;

		let catalog = Catalog::new(db);
		let (closed_tx, closed_rx) = watch::channel(false);
		let engine = Engine {
			config,
			catalog,
			store,
			lock: Arc::new(RwLock::new(())),
			closed_tx,
			closed_rx,
		};

		{
			let _guard = engine.lock.write().await;
			engine.catalog.migrate(&engine.config.bucket_name)?;
		}

		info!(
			"Engine for bucket {} is open (store: {})",
			engine.config.bucket_name,
			engine.store.engine()
		);
		Ok(engine)
	}

	pub fn bucket_name(&self) -> &str {
		&self.config.bucket_name
	}

	pub fn closed(&self) -> bool {
		*self.closed_rx.borrow()
	}

	/// Close the engine. Waits for in-flight streams (by taking the writer
	/// lock), then fails every subsequent operation with `EngineClosed`.
	pub async fn close(&self) -> Result<(), Error> {
		let _guard = self.lock.write().await;
		if self.closed() {
			return Err(Error::EngineClosed);
		}
		let _ = self.closed_tx.send(true);
		info!("Engine for bucket {} is closed", self.config.bucket_name);
		Ok(())
	}

	// ---- stream factories ----

	/// Open a read stream on an object. Holds a reader lock until the
	/// stream completes, fails, or is dropped.
	pub async fn open_read(&self, path: &str, opts: &ReadOpts) -> Result<ReadStream, Error> {
		schema::check_object_path(path)?;
		let guard = self.read_guard().await?;
		let meta = self.catalog.read(path, opts)?;
		Ok(ReadStream::new(
			self.store.clone(),
			meta,
			guard,
			self.closed_rx.clone(),
		))
	}

	/// Open a write stream on an object. Holds the writer lock until the
	/// stream is closed, aborted, or dropped.
	pub async fn open_write(&self, path: &str, opts: WriteOpts) -> Result<WriteStream, Error> {
		// eager validation: no partial effects on invalid input
		schema::check_object_path(path)?;
		if let Some(tags) = &opts.object_tags {
			schema::check_object_tags(tags)?;
		}
		if let Some(ts) = opts.timestamp {
			schema::check_timestamp(ts)?;
		}
		if let Some(part_size) = opts.part_size {
			schema::check_part_size(part_size)?;
		}
		if let Some(mime_type) = &opts.mime_type {
			if !mime::is_valid(mime_type) {
				return Err(Error::invalid_input(format!(
					"unknown MIME type: {:?}",
					mime_type
				)));
			}
		}
		if let Some(description) = &opts.description {
			if description.len() > self.config.max_description_size {
				return Err(Error::invalid_input(format!(
					"description exceeds {} bytes",
					self.config.max_description_size
				)));
			}
		}
		if let Some(user_metadata) = &opts.user_metadata {
			let serialized = serde_json::to_string(user_metadata)?;
			if serialized.len() > self.config.max_user_metadata_size {
				return Err(Error::invalid_input(format!(
					"user metadata exceeds {} bytes",
					self.config.max_user_metadata_size
				)));
			}
		}
		if let Some(expect) = &opts.expect_checksum {
			schema::check_checksum(expect)?;
			if opts.flag != OpenMode::Append {
				return Err(Error::invalid_input(
					"an expected checksum is only valid in append mode",
				));
			}
		}

		let guard = self.write_guard().await?;

		let current = match self.catalog.read(path, &ReadOpts::all()) {
			Ok(meta) => Some(meta),
			Err(Error::ObjectNotFound(_)) => None,
			Err(e) => return Err(e),
		};

		let timestamp = opts.timestamp.unwrap_or_else(now_msec);

		let setup = match (opts.flag, current) {
			(OpenMode::WriteExclusive, Some(_)) | (OpenMode::AppendExclusive, Some(_)) => {
				return Err(Error::ObjectExists(path.to_string()));
			}
			(OpenMode::Append, Some(cur)) => {
				if let Some(part_size) = opts.part_size {
					if part_size != cur.part_size {
						return Err(Error::invalid_input(format!(
							"part size of an existing object cannot change (object uses {})",
							cur.part_size
						)));
					}
				}
				// fail the compare-and-set before any bytes are written;
				// the catalog re-checks atomically at commit
				if let Some(expect) = &opts.expect_checksum {
					if *expect != cur.checksum {
						return Err(Error::PreconditionFailed(
							path.to_string(),
							expect.clone(),
						));
					}
				}
				let hash = Md5State::from_state(&cur.md5_state)?;
				WriteStreamSetup {
					catalog: self.catalog.clone(),
					store: self.store.clone(),
					path: path.to_string(),
					mode: OpenMode::Append,
					entity_id: cur.entity_id,
					old_entity_id: Some(cur.entity_id),
					expect_checksum: opts.expect_checksum,
					hash,
					part_size: cur.part_size,
					current_size: cur.size,
					current_num_parts: cur.num_parts,
					mime_type: opts.mime_type.unwrap_or(cur.mime_type),
					timestamp,
					object_tags: opts
						.object_tags
						.or(cur.object_tags)
						.unwrap_or_default(),
					description: opts.description.or(cur.description),
					user_metadata: opts.user_metadata.or(cur.user_metadata),
					guard,
					closed: self.closed_rx.clone(),
				}
			}
			(OpenMode::Append, None) if opts.expect_checksum.is_some() => {
				return Err(Error::ObjectNotFound(path.to_string()));
			}
			(mode, current) => {
				// fresh entity: w (rewrite or create), wx/ax, a on a new path
				WriteStreamSetup {
					catalog: self.catalog.clone(),
					store: self.store.clone(),
					path: path.to_string(),
					mode,
					entity_id: gen_uuid(),
					old_entity_id: current.as_ref().map(|cur| cur.entity_id),
					expect_checksum: None,
					hash: Md5State::new(),
					part_size: opts.part_size.unwrap_or(self.config.part_size),
					current_size: 0,
					current_num_parts: 0,
					mime_type: opts
						.mime_type
						.unwrap_or_else(|| mime::from_path(path).to_string()),
					timestamp,
					object_tags: opts.object_tags.unwrap_or_default(),
					description: opts.description,
					user_metadata: opts.user_metadata,
					guard,
					closed: self.closed_rx.clone(),
				}
			}
		};

		WriteStream::new(setup)
	}

	// ---- object operations ----

	/// Write a whole in-memory payload as one object
	pub async fn put_object(
		&self,
		path: &str,
		data: impl Into<Bytes>,
		opts: WriteOpts,
	) -> Result<ObjectInfo, Error> {
		let data = data.into();
		let mut stream = self.open_write(path, opts).await?;
		stream.write(&data).await?;
		stream.close().await
	}

	/// Pipe a byte stream into one object
	pub async fn put_object_stream<S>(
		&self,
		path: &str,
		mut body: S,
		opts: WriteOpts,
	) -> Result<ObjectInfo, Error>
	where
		S: Stream<Item = Result<Bytes, Error>> + Unpin,
	{
		let mut stream = self.open_write(path, opts).await?;
		while let Some(chunk) = body.next().await {
			match chunk {
				Ok(chunk) => stream.write(&chunk).await?,
				Err(e) => {
					// the source failed, not the stream: roll back
					if let Err(e2) = stream.abort().await {
						warn!("Error while aborting write to {}: {}", path, e2);
					}
					return Err(e);
				}
			}
		}
		stream.close().await
	}

	/// Fetch a whole object into memory, verifying its checksum
	pub async fn get_object(&self, path: &str, opts: &ReadOpts) -> Result<ObjectFile, Error> {
		let mut stream = self.open_read(path, opts).await?;
		let bytes = stream.read_all().await?;
		Ok(ObjectFile {
			meta: stream.into_meta(),
			bytes,
		})
	}

	/// Read object metadata without its bytes
	pub async fn stat_object(&self, path: &str, opts: &ReadOpts) -> Result<ObjectMeta, Error> {
		schema::check_object_path(path)?;
		let _guard = self.read_guard().await?;
		self.catalog.read(path, opts)
	}

	/// Whether a live object exists at `path`
	pub async fn object_exists(&self, path: &str) -> Result<bool, Error> {
		schema::check_object_path(path)?;
		let _guard = self.read_guard().await?;
		self.catalog.exists(path)
	}

	/// Delete an object. Idempotent; returns whether a live object was
	/// removed. The entity directory is cleaned up best-effort after the
	/// catalog tombstone commits.
	pub async fn delete_object(&self, path: &str) -> Result<bool, Error> {
		schema::check_object_path(path)?;
		let _guard = self.write_guard().await?;
		match self.catalog.delete(path)? {
			None => Ok(false),
			Some(entity) => {
				if let Err(e) = self.store.remove_entity(&entity.to_string()).await {
					warn!(
						"Could not remove entity {} of deleted object {}: {}",
						entity, path, e
					);
				}
				debug!("Deleted {}", path);
				Ok(true)
			}
		}
	}

	/// List live objects under a directory path
	pub async fn list_objects(
		&self,
		dir_path: &str,
		opts: &ListOpts,
	) -> Result<Vec<ObjectSummary>, Error> {
		schema::check_dir_path(dir_path)?;
		let _guard = self.read_guard().await?;
		self.catalog.list(dir_path, opts)?.collect()
	}

	/// Full-text search over object descriptions under a directory path
	pub async fn search_objects(
		&self,
		dir_path: &str,
		query: &str,
		opts: &SearchOpts,
	) -> Result<Vec<SearchHit>, Error> {
		schema::check_dir_path(dir_path)?;
		let _guard = self.read_guard().await?;
		self.catalog.search(dir_path, query, opts)?.collect()
	}

	/// Rewrite the mutable metadata of a live object without touching its
	/// content. The entity binding stays, so the catalog records this as a
	/// metadata update.
	pub async fn update_object_metadata(
		&self,
		path: &str,
		opts: UpdateMetadataOpts,
	) -> Result<(), Error> {
		schema::check_object_path(path)?;
		if let Some(tags) = &opts.object_tags {
			schema::check_object_tags(tags)?;
		}
		if let Some(ts) = opts.timestamp {
			schema::check_timestamp(ts)?;
		}
		if let Some(mime_type) = &opts.mime_type {
			if !mime::is_valid(mime_type) {
				return Err(Error::invalid_input(format!(
					"unknown MIME type: {:?}",
					mime_type
				)));
			}
		}
		if let Some(description) = &opts.description {
			if description.len() > self.config.max_description_size {
				return Err(Error::invalid_input(format!(
					"description exceeds {} bytes",
					self.config.max_description_size
				)));
			}
		}
		if let Some(user_metadata) = &opts.user_metadata {
			let serialized = serde_json::to_string(user_metadata)?;
			if serialized.len() > self.config.max_user_metadata_size {
				return Err(Error::invalid_input(format!(
					"user metadata exceeds {} bytes",
					self.config.max_user_metadata_size
				)));
			}
		}

		let _guard = self.write_guard().await?;
		let cur = self.catalog.read(path, &ReadOpts::all())?;

		let row = omnio_model::object::NewObject {
			entity_id: cur.entity_id,
			object_path: cur.object_path,
			size: cur.size,
			mime_type: opts.mime_type.unwrap_or(cur.mime_type),
			checksum: cur.checksum,
			md5_state: cur.md5_state,
			num_parts: cur.num_parts,
			part_size: cur.part_size,
			timestamp: opts.timestamp.unwrap_or_else(now_msec),
			object_tags: opts
				.object_tags
				.or(cur.object_tags)
				.unwrap_or_default(),
			description: opts.description.or(cur.description),
			user_metadata: opts.user_metadata.or(cur.user_metadata),
		};
		self.catalog.create(&row)
	}

	/// Copy an object to another path, physically duplicating its parts
	/// under a fresh entity (entities are never shared between paths).
	/// Tags, description and user metadata are carried over.
	pub async fn copy_object(
		&self,
		src_path: &str,
		dst_path: &str,
		opts: CopyOpts,
	) -> Result<ObjectInfo, Error> {
		schema::check_object_path(src_path)?;
		schema::check_object_path(dst_path)?;
		if !matches!(opts.flag, OpenMode::Write | OpenMode::WriteExclusive) {
			return Err(Error::invalid_input(
				"copy supports only open modes w and wx",
			));
		}

		// the writer lock is exclusive, so reading the source parts under
		// it is safe without a separate reader lock
		let guard = self.write_guard().await?;

		let src = self.catalog.read(src_path, &ReadOpts::all())?;

		let dst_current = match self.catalog.read(dst_path, &ReadOpts::default()) {
			Ok(meta) => Some(meta),
			Err(Error::ObjectNotFound(_)) => None,
			Err(e) => return Err(e),
		};
		if opts.flag == OpenMode::WriteExclusive && dst_current.is_some() {
			return Err(Error::ObjectExists(dst_path.to_string()));
		}

		let setup = WriteStreamSetup {
			catalog: self.catalog.clone(),
			store: self.store.clone(),
			path: dst_path.to_string(),
			mode: opts.flag,
			entity_id: gen_uuid(),
			old_entity_id: dst_current.as_ref().map(|cur| cur.entity_id),
			expect_checksum: None,
			hash: Md5State::new(),
			part_size: src.part_size,
			current_size: 0,
			current_num_parts: 0,
			mime_type: src.mime_type.clone(),
			timestamp: now_msec(),
			object_tags: src.object_tags.clone().unwrap_or_default(),
			description: src.description.clone(),
			user_metadata: src.user_metadata.clone(),
			guard,
			closed: self.closed_rx.clone(),
		};
		let mut stream = WriteStream::new(setup)?;

		let src_entity = src.entity_id.to_string();
		for part in 1..=src.num_parts {
			let bytes = match self.store.read_part(&src_entity, part).await {
				Ok(bytes) => bytes,
				Err(Error::EntryPathNotFound(_)) => {
					let e = Error::EntityNotFound(src.entity_id, part);
					if let Err(e2) = stream.abort().await {
						warn!("Error while aborting copy to {}: {}", dst_path, e2);
					}
					return Err(e);
				}
				Err(e) => {
					if let Err(e2) = stream.abort().await {
						warn!("Error while aborting copy to {}: {}", dst_path, e2);
					}
					return Err(e);
				}
			};
			stream.write(&bytes).await?;
		}

		stream.close().await
	}

	// ---- lock helpers ----

	async fn read_guard(&self) -> Result<OwnedRwLockReadGuard<()>, Error> {
		let guard = self.lock.clone().read_owned().await;
		if self.closed() {
			return Err(Error::EngineClosed);
		}
		Ok(guard)
	}

	async fn write_guard(&self) -> Result<OwnedRwLockWriteGuard<()>, Error> {
		let guard = self.lock.clone().write_owned().await;
		if self.closed() {
			return Err(Error::EngineClosed);
		}
		Ok(guard)
	}
}
