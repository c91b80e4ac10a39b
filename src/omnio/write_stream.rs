//! The write state machine: chunk-to-part slicing, incremental hashing,
//! and the two-phase commit between entity directory and catalog row.
//!
//! Parts are written through scratch files and renamed into place when
//! full; the catalog row is written last, at `close`. Until that commit,
//! the only trace of the write is a fresh entity directory no row points
//! at, so an interrupted write never corrupts the previous object state.
//! Appends extend the live entity in place: the tail part is rewritten
//! through its scratch copy and the commit goes through the catalog's
//! compare-and-set update when an expected checksum was supplied.

use tokio::sync::{watch, OwnedRwLockWriteGuard};

use omnio_model::catalog::Catalog;
use omnio_model::hash::Md5State;
use omnio_model::object::{NewObject, OpenMode};
use omnio_model::schema::{MAX_NUM_PARTS, MAX_OBJECT_SIZE};
use omnio_store::{PartWriter, Store};
use omnio_util::data::Uuid;
use omnio_util::error::Error;

/// Outcome of a committed write
#[derive(Debug, Clone)]
pub struct ObjectInfo {
	pub object_path: String,
	pub entity_id: Uuid,
	pub size: u64,
	pub checksum: String,
	pub num_parts: u32,
	pub part_size: u64,
	pub mime_type: String,
	pub last_modified_at: u64,
}

enum StreamState {
	Open,
	Finished,
	Aborted(Error),
}

/// Everything the engine resolves before handing out a write stream
pub(crate) struct WriteStreamSetup {
	pub catalog: Catalog,
	pub store: Store,
	pub path: String,
	pub mode: OpenMode,
	/// Entity the parts are written into: fresh for `w`/`wx`/`ax`, the
	/// incumbent entity for an append to an existing object
	pub entity_id: Uuid,
	/// Entity bound to the path before this write, removed after a
	/// successful rewrite commit
	pub old_entity_id: Option<Uuid>,
	pub expect_checksum: Option<String>,
	pub hash: Md5State,
	pub part_size: u64,
	pub current_size: u64,
	pub current_num_parts: u32,
	pub mime_type: String,
	pub timestamp: u64,
	pub object_tags: Vec<String>,
	pub description: Option<String>,
	pub user_metadata: Option<serde_json::Value>,
	pub guard: OwnedRwLockWriteGuard<()>,
	pub closed: watch::Receiver<bool>,
}

/// A single-object write in progress.
///
/// The writer lock is held for the whole stream lifetime. `close` commits,
/// `abort` rolls back; a failed `write` poisons the stream and later calls
/// surface the stored failure again. Dropping an open stream rolls back in
/// a background task.
pub struct WriteStream {
	catalog: Catalog,
	store: Store,
	path: String,
	mode: OpenMode,
	entity_id: Uuid,
	old_entity_id: Option<Uuid>,
	expect_checksum: Option<String>,
	hash: Md5State,
	part_size: u64,
	size: u64,
	num_parts: u32,
	start_num_parts: u32,
	entity_ready: bool,
	writer: Option<PartWriter>,
	written_in_part: u64,
	mime_type: String,
	timestamp: u64,
	object_tags: Vec<String>,
	description: Option<String>,
	user_metadata: Option<serde_json::Value>,
	state: StreamState,
	guard: Option<OwnedRwLockWriteGuard<()>>,
	closed: watch::Receiver<bool>,
}

impl WriteStream {
	pub(crate) fn new(setup: WriteStreamSetup) -> Result<WriteStream, Error> {
		if setup.mode != OpenMode::Append
			&& (setup.current_size > 0
				|| setup.current_num_parts > 0
				|| setup.expect_checksum.is_some())
		{
			return Err(Error::Unreachable(
				"non-append write stream constructed with append context",
			));
		}

		// an append to an existing object targets the live entity directory
		let entity_ready =
			setup.mode == OpenMode::Append && setup.old_entity_id == Some(setup.entity_id);

		Ok(WriteStream {
			catalog: setup.catalog,
			store: setup.store,
			path: setup.path,
			mode: setup.mode,
			entity_id: setup.entity_id,
			old_entity_id: setup.old_entity_id,
			expect_checksum: setup.expect_checksum,
			hash: setup.hash,
			part_size: setup.part_size,
			size: setup.current_size,
			num_parts: setup.current_num_parts,
			start_num_parts: setup.current_num_parts,
			entity_ready,
			writer: None,
			written_in_part: 0,
			mime_type: setup.mime_type,
			timestamp: setup.timestamp,
			object_tags: setup.object_tags,
			description: setup.description,
			user_metadata: setup.user_metadata,
			state: StreamState::Open,
			guard: Some(setup.guard),
			closed: setup.closed,
		})
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn entity_id(&self) -> Uuid {
		self.entity_id
	}

	/// Bytes the object will have if the stream is committed now
	pub fn size(&self) -> u64 {
		self.size
	}

	/// Feed a chunk of payload. Chunks are sliced into `part_size` pieces;
	/// full parts are renamed into place as soon as they are complete.
	pub async fn write(&mut self, chunk: &[u8]) -> Result<(), Error> {
		self.check_open()?;
		if *self.closed.borrow() {
			return Err(self.fail(Error::EngineClosed).await);
		}
		if chunk.is_empty() {
			return Ok(());
		}

		if !self.entity_ready {
			if let Err(e) = self.store.ensure_entity(&self.entity_id.to_string()).await {
				return Err(self.fail(e).await);
			}
			self.entity_ready = true;
		}

		let mut rest = chunk;
		while !rest.is_empty() {
			if self.writer.is_none() {
				if let Err(e) = self.open_next_part().await {
					return Err(self.fail(e).await);
				}
			}

			let room = (self.part_size - self.written_in_part) as usize;
			let n = std::cmp::min(room, rest.len());
			let (head, tail) = rest.split_at(n);

			if self.size + n as u64 > MAX_OBJECT_SIZE {
				let e = Error::invalid_input(format!(
					"an object may hold at most {} bytes",
					MAX_OBJECT_SIZE
				));
				return Err(self.fail(e).await);
			}

			let writer = match self.writer.as_mut() {
				Some(writer) => writer,
				None => {
					return Err(self.fail(Error::Unreachable("no open part writer")).await);
				}
			};
			if let Err(e) = writer.write(head).await {
				return Err(self.fail(e).await);
			}

			self.hash.update(head);
			self.size += n as u64;
			self.written_in_part += n as u64;

			if self.written_in_part == self.part_size {
				if let Some(writer) = self.writer.take() {
					if let Err(e) = writer.close().await {
						return Err(self.fail(e).await);
					}
				}
			}

			rest = tail;
		}

		Ok(())
	}

	/// Commit the stream: rename the tail part into place, then reflect the
	/// new object state through the catalog. On catalog failure the fresh
	/// entity is rolled back and the previous object state stays intact.
	pub async fn close(mut self) -> Result<ObjectInfo, Error> {
		self.check_open()?;
		if *self.closed.borrow() {
			return Err(self.fail_close(Error::EngineClosed).await);
		}

		if let Some(writer) = self.writer.take() {
			if let Err(e) = writer.close().await {
				return Err(self.fail_close(e).await);
			}
		}

		// a zero-part object still owns its (empty) entity directory
		if !self.entity_ready {
			if let Err(e) = self.store.ensure_entity(&self.entity_id.to_string()).await {
				return Err(self.fail_close(e).await);
			}
			self.entity_ready = true;
		}

		let (checksum, md5_state) = self.hash.digest();
		let row = NewObject {
			entity_id: self.entity_id,
			object_path: self.path.clone(),
			size: self.size,
			mime_type: self.mime_type.clone(),
			checksum: checksum.clone(),
			md5_state,
			num_parts: self.num_parts,
			part_size: self.part_size,
			timestamp: self.timestamp,
			object_tags: self.object_tags.clone(),
			description: self.description.clone(),
			user_metadata: self.user_metadata.clone(),
		};

		let res = match self.mode {
			OpenMode::Write => self.catalog.create(&row),
			OpenMode::Append => match &self.expect_checksum {
				Some(expect) => self.catalog.update_exclusive(&row, expect),
				None => self.catalog.create(&row),
			},
			OpenMode::WriteExclusive | OpenMode::AppendExclusive => {
				self.catalog.create_exclusive(&row)
			}
		};

		if let Err(e) = res {
			// a fresh entity is ours to roll back; an in-place append keeps
			// the live entity, its renamed parts are recoverable orphan
			// artefacts
			if self.old_entity_id != Some(self.entity_id) {
				if let Err(e2) = self.store.remove_entity(&self.entity_id.to_string()).await {
					warn!(
						"Could not remove entity {} after failed commit of {}: {}",
						self.entity_id, self.path, e2
					);
				}
			}
			self.state = StreamState::Aborted(e.duplicate());
			self.guard.take();
			return Err(e);
		}

		if let Some(old) = self.old_entity_id {
			if old != self.entity_id {
				if let Err(e) = self.store.remove_entity(&old.to_string()).await {
					warn!("Could not remove superseded entity {}: {}", old, e);
				}
			}
		}

		debug!(
			"Committed {} in mode {}: {} bytes, {} parts, checksum {}",
			self.path, self.mode, self.size, self.num_parts, checksum
		);

		let info = ObjectInfo {
			object_path: self.path.clone(),
			entity_id: self.entity_id,
			size: self.size,
			checksum,
			num_parts: self.num_parts,
			part_size: self.part_size,
			mime_type: self.mime_type.clone(),
			last_modified_at: self.timestamp,
		};

		self.state = StreamState::Finished;
		self.guard.take();
		Ok(info)
	}

	/// Roll the stream back: discard the scratch of the part in progress
	/// and, if nothing was ever committed for this path, remove the fresh
	/// entity directory. Surfaces the scratch-cleanup error if there was
	/// one.
	pub async fn abort(mut self) -> Result<(), Error> {
		self.check_open()?;
		let writer_err = self.abort_inner().await;
		self.state = StreamState::Aborted(Error::Message(format!(
			"write to {} was aborted",
			self.path
		)));
		match writer_err {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	fn check_open(&self) -> Result<(), Error> {
		match &self.state {
			StreamState::Open => Ok(()),
			StreamState::Aborted(e) => Err(e.duplicate()),
			StreamState::Finished => Err(Error::Unreachable("write stream used after close")),
		}
	}

	async fn open_next_part(&mut self) -> Result<(), Error> {
		let entity = self.entity_id.to_string();

		// an append whose previous tail part is not full resumes it in
		// place, seeding the scratch with the existing tail bytes
		let resume_tail = self.mode == OpenMode::Append
			&& self.num_parts == self.start_num_parts
			&& self.num_parts > 0
			&& self.size % self.part_size != 0;

		if resume_tail {
			let writer = self.store.part_writer(&entity, self.num_parts, true).await?;
			self.written_in_part = self.size % self.part_size;
			self.writer = Some(writer);
		} else {
			if self.num_parts >= MAX_NUM_PARTS {
				return Err(Error::invalid_input(format!(
					"an object may have at most {} parts",
					MAX_NUM_PARTS
				)));
			}
			self.num_parts += 1;
			let writer = self.store.part_writer(&entity, self.num_parts, false).await?;
			self.written_in_part = 0;
			self.writer = Some(writer);
		}
		Ok(())
	}

	/// Poison the stream after a failed write: abort the part in progress,
	/// store the failure, release the lock
	async fn fail(&mut self, e: Error) -> Error {
		if let Some(writer) = self.writer.take() {
			if let Err(e2) = writer.abort().await {
				warn!("Could not abort part writer for {}: {}", self.path, e2);
			}
		}
		self.state = StreamState::Aborted(e.duplicate());
		self.guard.take();
		e
	}

	/// Terminal failure during close: full abort-side cleanup
	async fn fail_close(&mut self, e: Error) -> Error {
		if let Some(e2) = self.abort_inner().await {
			warn!("Secondary error while aborting write to {}: {}", self.path, e2);
		}
		self.state = StreamState::Aborted(e.duplicate());
		e
	}

	async fn abort_inner(&mut self) -> Option<Error> {
		let mut writer_err = None;
		if let Some(writer) = self.writer.take() {
			if let Err(e) = writer.abort().await {
				writer_err = Some(e);
			}
		}

		// only remove the entity when no catalog row exists for the path:
		// if one does, it either predates this stream (mode w over an
		// existing object) or is the live row an append extends, and the
		// entity it references must not be touched
		if self.entity_ready {
			match self.catalog.exists(&self.path) {
				Ok(false) => {
					if let Err(e) =
						self.store.remove_entity(&self.entity_id.to_string()).await
					{
						warn!(
							"Could not remove entity {} of aborted write to {}: {}",
							self.entity_id, self.path, e
						);
					}
				}
				Ok(true) => (),
				Err(e) => {
					warn!(
						"Could not check catalog for {} during abort: {}",
						self.path, e
					);
				}
			}
		}

		self.guard.take();
		writer_err
	}
}

impl Drop for WriteStream {
	fn drop(&mut self) {
		if !matches!(self.state, StreamState::Open) {
			return;
		}
		// the stream was abandoned without close or abort: roll back in a
		// background task, the lock itself is released right away
		warn!(
			"Write stream for {} was dropped while open, rolling back",
			self.path
		);

		let writer = self.writer.take();
		let catalog = self.catalog.clone();
		let store = self.store.clone();
		let path = self.path.clone();
		let entity = self.entity_id.to_string();
		let entity_ready = self.entity_ready;

		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(async move {
				if let Some(writer) = writer {
					if let Err(e) = writer.abort().await {
						warn!("Could not abort part writer for {}: {}", path, e);
					}
				}
				if entity_ready {
					match catalog.exists(&path) {
						Ok(false) => {
							if let Err(e) = store.remove_entity(&entity).await {
								warn!(
									"Could not remove entity {} of dropped write to {}: {}",
									entity, path, e
								);
							}
						}
						Ok(true) => (),
						Err(e) => {
							warn!("Could not check catalog for {}: {}", path, e);
						}
					}
				}
			});
		}
	}
}
