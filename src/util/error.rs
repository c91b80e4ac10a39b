//! Error types used everywhere in the Omnio engine

use err_derive::Error;

use crate::data::Uuid;

/// Errors of this crate
#[derive(Debug, Error)]
pub enum Error {
	// Category: internal error
	/// Error in the metadata database
	#[error(display = "Database error: {}", _0)]
	Database(#[error(source)] omnio_db::Error),

	/// Error while doing filesystem I/O
	#[error(display = "Filesystem error: {}", _0)]
	Filesystem(#[error(source)] std::io::Error),

	/// Error while encoding or decoding JSON
	#[error(display = "JSON error: {}", _0)]
	Json(#[error(source)] serde_json::Error),

	/// Error while reading the configuration file
	#[error(display = "Invalid TOML: {}", _0)]
	Toml(#[error(source)] toml::de::Error),

	// Category: lifecycle misuse
	/// The engine has been closed, no further operation is possible
	#[error(display = "Engine is closed")]
	EngineClosed,

	// Category: cannot process
	/// No live object at the requested path
	#[error(display = "Object not found: {}", _0)]
	ObjectNotFound(String),

	/// An exclusive create hit an already existing live object
	#[error(display = "Object already exists: {}", _0)]
	ObjectExists(String),

	/// A conditional append no longer matches the live row
	#[error(
		display = "Precondition failed on {}: expected checksum {}",
		_0,
		_1
	)]
	PreconditionFailed(String, String),

	/// End-of-read hash comparison failed
	#[error(display = "Checksum mismatch: expected {}, computed {}", _0, _1)]
	ChecksumMismatch(String, String),

	/// A part file referenced by metadata is missing
	#[error(display = "Entity {} is missing part {}", _0, _1)]
	EntityNotFound(Uuid, u32),

	/// The storage adapter cannot locate a named entry
	#[error(display = "Entry not found: {}", _0)]
	EntryPathNotFound(String),

	// Category: bad request
	/// Schema validation failed on a caller-supplied value
	#[error(display = "Invalid input: {}", _0)]
	InvalidInput(String),

	// Category: internal bug
	/// An internal invariant was broken; never a recoverable user error
	#[error(display = "Internal invariant violated: {}", _0)]
	Unreachable(&'static str),

	/// Any other error
	#[error(display = "{}", _0)]
	Message(String),
}

impl Error {
	pub fn invalid_input(msg: impl Into<String>) -> Error {
		Error::InvalidInput(msg.into())
	}

	/// Build a detached copy of this error, for streams that must store a
	/// terminal failure and surface it again on later calls. Variants that
	/// carry a non-clonable source degrade to their rendered message.
	pub fn duplicate(&self) -> Error {
		match self {
			Error::EngineClosed => Error::EngineClosed,
			Error::ObjectNotFound(p) => Error::ObjectNotFound(p.clone()),
			Error::ObjectExists(p) => Error::ObjectExists(p.clone()),
			Error::PreconditionFailed(p, c) => Error::PreconditionFailed(p.clone(), c.clone()),
			Error::ChecksumMismatch(e, c) => Error::ChecksumMismatch(e.clone(), c.clone()),
			Error::EntityNotFound(e, p) => Error::EntityNotFound(*e, *p),
			Error::EntryPathNotFound(p) => Error::EntryPathNotFound(p.clone()),
			Error::InvalidInput(m) => Error::InvalidInput(m.clone()),
			Error::Unreachable(m) => Error::Unreachable(*m),
			Error::Message(m) => Error::Message(m.clone()),
			e => Error::Message(format!("{}", e)),
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/// Trait to map any error type to Error::Message
pub trait OkOrMessage {
	type S;
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<Self::S>;
}

impl<T, E> OkOrMessage for std::result::Result<T, E>
where
	E: std::fmt::Display,
{
	type S = T;
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<T> {
		match self {
			Ok(x) => Ok(x),
			Err(e) => Err(Error::Message(format!("{}: {}", message.into(), e))),
		}
	}
}

impl<T> OkOrMessage for Option<T> {
	type S = T;
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<T> {
		match self {
			Some(x) => Ok(x),
			None => Err(Error::Message(message.into())),
		}
	}
}
