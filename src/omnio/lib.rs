//! Omnio: a metadata-driven object storage engine.
//!
//! Omnio layers S3-style object semantics (object paths, tags, user
//! metadata, checksums, multipart layout, `w|wx|a|ax` open modes) on top of
//! two collaborators: a blob store holding fixed-size part files under
//! per-object entity directories, and a relational metadata catalog binding
//! each object path to its entity.

#[macro_use]
extern crate tracing;

pub mod engine;
pub mod read_stream;
pub mod write_stream;

pub use omnio_util::config::{read_config, Config};
pub use omnio_util::data::Uuid;
pub use omnio_util::error::Error;

pub use omnio_model::catalog::{ListOpts, ListOrder, SearchOpts};
pub use omnio_model::object::{
	ObjectMeta, ObjectSummary, OpenMode, ReadOpts, RecordType, SearchHit,
};

pub use crate::engine::{CopyOpts, Engine, ObjectFile, UpdateMetadataOpts, WriteOpts};
pub use crate::read_stream::ReadStream;
pub use crate::write_stream::{ObjectInfo, WriteStream};
