//! Part-by-part object reads with end-of-stream checksum verification

use bytes::Bytes;
use tokio::sync::{watch, OwnedRwLockReadGuard};

use omnio_model::hash::Md5State;
use omnio_model::object::ObjectMeta;
use omnio_store::Store;
use omnio_util::error::Error;

enum ReadState {
	Streaming,
	Done,
	Failed(Error),
}

/// A lazy sequence of whole-part payloads for one object.
///
/// The reader lock is held for the lifetime of the stream and released
/// exactly once: on completion, on error, or when the stream is dropped
/// mid-sequence.
pub struct ReadStream {
	store: Store,
	meta: ObjectMeta,
	next_part: u32,
	hash: Md5State,
	state: ReadState,
	guard: Option<OwnedRwLockReadGuard<()>>,
	closed: watch::Receiver<bool>,
}

impl ReadStream {
	pub(crate) fn new(
		store: Store,
		meta: ObjectMeta,
		guard: OwnedRwLockReadGuard<()>,
		closed: watch::Receiver<bool>,
	) -> Self {
		ReadStream {
			store,
			meta,
			next_part: 1,
			hash: Md5State::new(),
			state: ReadState::Streaming,
			guard: Some(guard),
			closed,
		}
	}

	/// Metadata of the object being read
	pub fn meta(&self) -> &ObjectMeta {
		&self.meta
	}

	pub(crate) fn into_meta(self) -> ObjectMeta {
		self.meta
	}

	/// Yield the next whole part, or `None` after the last part has been
	/// delivered and the checksum verified.
	pub async fn next(&mut self) -> Result<Option<Bytes>, Error> {
		match &self.state {
			ReadState::Done => return Ok(None),
			ReadState::Failed(e) => return Err(e.duplicate()),
			ReadState::Streaming => (),
		}

		if *self.closed.borrow() {
			return Err(self.fail(Error::EngineClosed));
		}

		if self.next_part > self.meta.num_parts {
			let (checksum, _) = self.hash.digest();
			if checksum != self.meta.checksum {
				warn!(
					"Object {} failed checksum verification (expected {}, computed {})",
					self.meta.object_path, self.meta.checksum, checksum
				);
				return Err(
					self.fail(Error::ChecksumMismatch(self.meta.checksum.clone(), checksum))
				);
			}
			self.state = ReadState::Done;
			self.guard.take();
			return Ok(None);
		}

		let part = self.next_part;
		let entity = self.meta.entity_id.to_string();
		let bytes = match self.store.read_part(&entity, part).await {
			Ok(bytes) => bytes,
			Err(Error::EntryPathNotFound(_)) => {
				return Err(self.fail(Error::EntityNotFound(self.meta.entity_id, part)));
			}
			Err(e) => return Err(self.fail(e)),
		};

		self.hash.update(&bytes);
		self.next_part += 1;
		Ok(Some(bytes))
	}

	/// Drain the remaining parts into one buffer
	pub async fn read_all(&mut self) -> Result<Bytes, Error> {
		let mut buf = Vec::with_capacity(self.meta.size as usize);
		while let Some(part) = self.next().await? {
			buf.extend_from_slice(&part);
		}
		Ok(Bytes::from(buf))
	}

	/// Adapt the stream to a `futures::Stream` of part payloads. The
	/// stream terminates after the first error.
	pub fn into_stream(self) -> impl futures::Stream<Item = Result<Bytes, Error>> + Send {
		futures::stream::unfold(Some(self), |state| async move {
			let mut rs = state?;
			match rs.next().await {
				Ok(Some(bytes)) => Some((Ok(bytes), Some(rs))),
				Ok(None) => None,
				Err(e) => Some((Err(e), None)),
			}
		})
	}

	fn fail(&mut self, e: Error) -> Error {
		self.state = ReadState::Failed(e.duplicate());
		self.guard.take();
		e
	}
}
