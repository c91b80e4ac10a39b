//! Blob store abstraction for Omnio entity directories.
//!
//! An entity is a directory holding the parts of one object as files named
//! `"1"`, `"2"`, … All part writes go through a sibling scratch file with
//! the reserved `.crswap` suffix: `close` renames the scratch over the
//! target, `abort` deletes it, so a part file is either absent or complete.

#[macro_use]
extern crate tracing;

pub mod local;
pub mod mem;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use omnio_util::error::Error;

/// Reserved suffix for scratch files used by atomic part writes
pub const SCRATCH_SUFFIX: &str = ".crswap";

/// A handle on a blob store adapter
#[derive(Clone)]
pub struct Store(pub(crate) Arc<dyn IStore>);

impl Store {
	pub fn engine(&self) -> String {
		self.0.engine()
	}

	/// Create the directory for an entity if it does not exist yet
	pub async fn ensure_entity(&self, entity: &str) -> Result<(), Error> {
		self.0.ensure_entity(entity).await
	}

	/// Recursively remove an entity directory.
	/// Returns whether anything was removed.
	pub async fn remove_entity(&self, entity: &str) -> Result<bool, Error> {
		self.0.remove_entity(entity).await
	}

	/// Read a whole part file.
	/// Fails with `EntryPathNotFound` if the entity or part is absent.
	pub async fn read_part(&self, entity: &str, part: u32) -> Result<Bytes, Error> {
		self.0.read_part(entity, part).await
	}

	/// Open a writer on a part file. With `keep_existing`, the current
	/// content of the part is copied into the scratch first, so subsequent
	/// writes append to it.
	pub async fn part_writer(
		&self,
		entity: &str,
		part: u32,
		keep_existing: bool,
	) -> Result<PartWriter, Error> {
		let inner = self.0.part_writer(entity, part, keep_existing).await?;
		Ok(PartWriter(inner))
	}
}

/// A writer on one part file, with atomic-rename semantics
pub struct PartWriter(Box<dyn IPartWriter>);

impl PartWriter {
	pub async fn write(&mut self, buf: &[u8]) -> Result<(), Error> {
		self.0.write(buf).await
	}

	/// Persist the scratch and rename it over the target part file
	pub async fn close(self) -> Result<(), Error> {
		self.0.close().await
	}

	/// Discard the scratch, leaving any previous target content untouched
	pub async fn abort(self) -> Result<(), Error> {
		self.0.abort().await
	}
}

// ---- Internal interfaces

#[async_trait]
pub(crate) trait IStore: Send + Sync {
	fn engine(&self) -> String;

	async fn ensure_entity(&self, entity: &str) -> Result<(), Error>;
	async fn remove_entity(&self, entity: &str) -> Result<bool, Error>;
	async fn read_part(&self, entity: &str, part: u32) -> Result<Bytes, Error>;
	async fn part_writer(
		&self,
		entity: &str,
		part: u32,
		keep_existing: bool,
	) -> Result<Box<dyn IPartWriter>, Error>;
}

#[async_trait]
pub(crate) trait IPartWriter: Send {
	async fn write(&mut self, buf: &[u8]) -> Result<(), Error>;
	async fn close(self: Box<Self>) -> Result<(), Error>;
	async fn abort(self: Box<Self>) -> Result<(), Error>;
}
