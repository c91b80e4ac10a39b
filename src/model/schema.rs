//! Hard limits and validation of caller-supplied names and values

use omnio_util::error::Error;
use omnio_util::time::MAX_SAFE_TIMESTAMP;

/// Maximum object size: 5 TB
pub const MAX_OBJECT_SIZE: u64 = 5_000_000_000_000;
/// Maximum number of parts per object
pub const MAX_NUM_PARTS: u32 = 10_000;
/// Minimum part size: 5 MB
pub const MIN_PART_SIZE: u64 = 5_000_000;
/// Maximum part size: 5 GB
pub const MAX_PART_SIZE: u64 = 5_000_000_000;
/// Maximum object path length, in UTF-8 bytes
pub const MAX_OBJECT_PATH_LEN: usize = 1024;
/// Maximum number of tags on one object
pub const MAX_TAGS: usize = 20;
/// Maximum tag length, in UTF-8 bytes
pub const MAX_TAG_LEN: usize = 128;
/// Maximum entry name length: 255 bytes minus room for the scratch suffix
pub const MAX_ENTRY_NAME_LEN: usize = 255 - 7;

const BUCKET_FORBIDDEN_PREFIXES: &[&str] = &["xn--", "sthree-", "amzn-s3-demo-"];
const BUCKET_FORBIDDEN_SUFFIXES: &[&str] = &["-s3alias", "--ol-s3", "--x-s3", "--table-s3"];

// Windows device names, forbidden as entry names on any platform so that a
// bucket can be copied across platforms
#[rustfmt::skip]
const RESERVED_ENTRY_NAMES: &[&str] = &[
	"AUX", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
	"COM9", "CON", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7",
	"LPT8", "LPT9", "NUL", "PRN",
];

/// Validate a bucket name: 3-63 characters of `[a-z0-9-]` (dots too in
/// dot-allowed mode), starting and ending with an alphanumeric, without
/// reserved prefixes or suffixes
pub fn check_bucket_name(name: &str, allow_dots: bool) -> Result<(), Error> {
	if name.len() < 3 || name.len() > 63 {
		return Err(Error::invalid_input(format!(
			"bucket name must be 3 to 63 characters long: {}",
			name
		)));
	}
	for prefix in BUCKET_FORBIDDEN_PREFIXES {
		if name.starts_with(prefix) {
			return Err(Error::invalid_input(format!(
				"bucket name may not start with {}: {}",
				prefix, name
			)));
		}
	}
	for suffix in BUCKET_FORBIDDEN_SUFFIXES {
		if name.ends_with(suffix) {
			return Err(Error::invalid_input(format!(
				"bucket name may not end with {}: {}",
				suffix, name
			)));
		}
	}

	if allow_dots {
		for label in name.split('.') {
			check_bucket_label(label, name)?;
		}
		if is_ipv4_literal(name) {
			return Err(Error::invalid_input(format!(
				"bucket name may not be an IP address: {}",
				name
			)));
		}
	} else {
		check_bucket_label(name, name)?;
	}

	Ok(())
}

fn check_bucket_label(label: &str, name: &str) -> Result<(), Error> {
	let bytes = label.as_bytes();
	let ok = !bytes.is_empty()
		&& bytes
			.iter()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == b'-')
		&& bytes[0] != b'-'
		&& bytes[bytes.len() - 1] != b'-';
	if ok {
		Ok(())
	} else {
		Err(Error::invalid_input(format!(
			"invalid bucket name: {}",
			name
		)))
	}
}

fn is_ipv4_literal(name: &str) -> bool {
	let labels = name.split('.').collect::<Vec<_>>();
	labels.len() == 4
		&& labels.iter().all(|l| {
			!l.is_empty() && l.len() <= 3 && l.bytes().all(|c| c.is_ascii_digit())
		})
}

/// Validate a filesystem-facing entry name
pub fn check_entry_name(name: &str) -> Result<(), Error> {
	if name.is_empty() || name.len() > MAX_ENTRY_NAME_LEN {
		return Err(Error::invalid_input(format!(
			"entry name must be 1 to {} bytes long: {:?}",
			MAX_ENTRY_NAME_LEN, name
		)));
	}
	if name == "." || name == ".." {
		return Err(Error::invalid_input(format!(
			"entry name may not be {:?}",
			name
		)));
	}
	if name.chars().any(|c| c == '/' || c.is_control()) {
		return Err(Error::invalid_input(format!(
			"entry name contains a forbidden character: {:?}",
			name
		)));
	}
	let stem = name.split('.').next().unwrap_or(name);
	let stem = stem.to_ascii_uppercase();
	if RESERVED_ENTRY_NAMES.binary_search(&stem.as_str()).is_ok() {
		return Err(Error::invalid_input(format!(
			"entry name is reserved: {:?}",
			name
		)));
	}
	Ok(())
}

/// Validate an object path and return its segments
pub fn check_object_path(path: &str) -> Result<Vec<&str>, Error> {
	if path.is_empty() || path.len() > MAX_OBJECT_PATH_LEN {
		return Err(Error::invalid_input(format!(
			"object path must be 1 to {} bytes long",
			MAX_OBJECT_PATH_LEN
		)));
	}
	let segments = path.split('/').collect::<Vec<_>>();
	for segment in segments.iter() {
		if segment.is_empty() {
			return Err(Error::invalid_input(format!(
				"object path contains an empty segment: {:?}",
				path
			)));
		}
		check_entry_name(segment)?;
	}
	Ok(segments)
}

/// Validate a directory path used as a listing prefix: the empty string
/// (bucket root) or a valid object path
pub fn check_dir_path(path: &str) -> Result<(), Error> {
	if path.is_empty() {
		return Ok(());
	}
	check_object_path(path.strip_suffix('/').unwrap_or(path))?;
	Ok(())
}

/// Validate an object tag set: ordered, unique, at most 20 entries of at
/// most 128 bytes each
pub fn check_object_tags(tags: &[String]) -> Result<(), Error> {
	if tags.len() > MAX_TAGS {
		return Err(Error::invalid_input(format!(
			"at most {} object tags are allowed, got {}",
			MAX_TAGS,
			tags.len()
		)));
	}
	for (i, tag) in tags.iter().enumerate() {
		if tag.is_empty() || tag.len() > MAX_TAG_LEN {
			return Err(Error::invalid_input(format!(
				"object tag must be 1 to {} bytes long: {:?}",
				MAX_TAG_LEN, tag
			)));
		}
		if tags[..i].contains(tag) {
			return Err(Error::invalid_input(format!(
				"duplicate object tag: {:?}",
				tag
			)));
		}
	}
	Ok(())
}

/// Validate a millisecond timestamp
pub fn check_timestamp(ts: u64) -> Result<(), Error> {
	if ts > MAX_SAFE_TIMESTAMP {
		return Err(Error::invalid_input(format!(
			"timestamp out of range: {}",
			ts
		)));
	}
	Ok(())
}

/// Validate a part size against the hard bounds
pub fn check_part_size(part_size: u64) -> Result<(), Error> {
	if part_size < MIN_PART_SIZE || part_size > MAX_PART_SIZE {
		return Err(Error::invalid_input(format!(
			"part size must be between {} and {} bytes: {}",
			MIN_PART_SIZE, MAX_PART_SIZE, part_size
		)));
	}
	Ok(())
}

/// Validate a lowercase hex MD5 checksum string
pub fn check_checksum(checksum: &str) -> Result<(), Error> {
	let ok = checksum.len() == 32
		&& checksum
			.bytes()
			.all(|c| c.is_ascii_digit() || (b'a'..=b'f').contains(&c));
	if ok {
		Ok(())
	} else {
		Err(Error::invalid_input(format!(
			"invalid MD5 checksum: {:?}",
			checksum
		)))
	}
}
