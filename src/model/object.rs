//! Object row types exchanged with the metadata catalog

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use omnio_util::data::Uuid;
use omnio_util::error::Error;

/// Record type of a catalog row
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum RecordType {
	/// The row was written by a content (re)write
	Create,
	/// The row was written by a metadata update or an in-place append
	UpdateMetadata,
	/// The row is a dead object (not visible through the live view)
	Delete,
}

impl RecordType {
	pub fn as_str(&self) -> &'static str {
		match self {
			RecordType::Create => "CREATE",
			RecordType::UpdateMetadata => "UPDATE_METADATA",
			RecordType::Delete => "DELETE",
		}
	}
}

impl FromStr for RecordType {
	type Err = Error;

	fn from_str(s: &str) -> Result<RecordType, Error> {
		match s {
			"CREATE" => Ok(RecordType::Create),
			"UPDATE_METADATA" => Ok(RecordType::UpdateMetadata),
			"DELETE" => Ok(RecordType::Delete),
			_ => Err(Error::invalid_input(format!("invalid record type: {}", s))),
		}
	}
}

/// Open mode of an object write
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum OpenMode {
	/// Create or overwrite
	Write,
	/// Create, fail if the object exists
	WriteExclusive,
	/// Append to the object, creating it if absent
	Append,
	/// Create for appending, fail if the object exists
	AppendExclusive,
}

impl OpenMode {
	pub fn as_flag(&self) -> &'static str {
		match self {
			OpenMode::Write => "w",
			OpenMode::WriteExclusive => "wx",
			OpenMode::Append => "a",
			OpenMode::AppendExclusive => "ax",
		}
	}
}

impl Default for OpenMode {
	fn default() -> Self {
		OpenMode::Write
	}
}

impl fmt::Display for OpenMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_flag())
	}
}

impl FromStr for OpenMode {
	type Err = Error;

	fn from_str(s: &str) -> Result<OpenMode, Error> {
		match s {
			"w" => Ok(OpenMode::Write),
			"wx" => Ok(OpenMode::WriteExclusive),
			"a" => Ok(OpenMode::Append),
			"ax" => Ok(OpenMode::AppendExclusive),
			_ => Err(Error::invalid_input(format!("invalid open mode: {:?}", s))),
		}
	}
}

/// Everything a finished write hands to the catalog. The catalog itself
/// decides the `object_id`, `created_at` and record type depending on what
/// is already live at the path.
#[derive(Debug, Clone)]
pub struct NewObject {
	/// Physical entity holding the part files
	pub entity_id: Uuid,
	pub object_path: String,
	/// Total size in bytes
	pub size: u64,
	pub mime_type: String,
	/// Lowercase hex MD5 of the concatenated parts
	pub checksum: String,
	/// Resumable MD5 state after hashing the whole object
	pub md5_state: Vec<u8>,
	pub num_parts: u32,
	pub part_size: u64,
	/// User-facing modification timestamp, milliseconds
	pub timestamp: u64,
	pub object_tags: Vec<String>,
	pub description: Option<String>,
	pub user_metadata: Option<serde_json::Value>,
}

/// A metadata row read back from the catalog. The heavy columns (tags,
/// description, user metadata) are only populated when requested.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
	/// Logical object id, stable across metadata updates of a live path
	pub object_id: Uuid,
	/// Physical entity currently bound to the path
	pub entity_id: Uuid,
	pub object_path: String,
	pub size: u64,
	pub mime_type: String,
	pub checksum: String,
	/// Opaque resumable MD5 state
	pub md5_state: Vec<u8>,
	pub num_parts: u32,
	pub part_size: u64,
	pub rec_type: RecordType,
	pub created_at: u64,
	pub last_modified_at: u64,
	pub object_tags: Option<Vec<String>>,
	pub description: Option<String>,
	pub user_metadata: Option<serde_json::Value>,
}

/// Which optional columns to materialise on a catalog read
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadOpts {
	pub object_tags: bool,
	pub description: bool,
	pub user_metadata: bool,
}

impl ReadOpts {
	pub fn all() -> Self {
		ReadOpts {
			object_tags: true,
			description: true,
			user_metadata: true,
		}
	}
}

/// The subset of columns returned by list and search
#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
	pub object_path: String,
	pub size: u64,
	pub mime_type: String,
	pub checksum: String,
	pub num_parts: u32,
	pub created_at: u64,
	pub last_modified_at: u64,
}

/// One full-text search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
	/// Number of query tokens matched in the description
	pub score: u32,
	pub object: ObjectSummary,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_record_type_roundtrip() {
		for rt in [
			RecordType::Create,
			RecordType::UpdateMetadata,
			RecordType::Delete,
		] {
			assert_eq!(RecordType::from_str(rt.as_str()).unwrap(), rt);
		}
		assert!(RecordType::from_str("BOGUS").is_err());
	}

	#[test]
	fn test_open_mode_roundtrip() {
		for mode in [
			OpenMode::Write,
			OpenMode::WriteExclusive,
			OpenMode::Append,
			OpenMode::AppendExclusive,
		] {
			assert_eq!(OpenMode::from_str(mode.as_flag()).unwrap(), mode);
		}
		assert!(OpenMode::from_str("rw").is_err());
	}
}
