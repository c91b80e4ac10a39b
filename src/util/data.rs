//! Identifier type and generation helpers

use std::convert::TryInto;
use std::fmt;
use std::str::FromStr;

use rand::prelude::*;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;
use crate::time::now_msec;

/// A 128-bit identifier in canonical UUID form.
///
/// Generated identifiers are version 7 (Unix-millisecond timestamp in the
/// high 48 bits, random elsewhere), so freshly generated ids sort roughly
/// by creation time.
#[derive(Default, PartialOrd, Ord, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Uuid([u8; 16]);

impl Uuid {
	pub fn as_slice(&self) -> &[u8] {
		&self.0[..]
	}
}

impl From<[u8; 16]> for Uuid {
	fn from(x: [u8; 16]) -> Uuid {
		Uuid(x)
	}
}

impl fmt::Display for Uuid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}-{}-{}-{}-{}",
			hex::encode(&self.0[0..4]),
			hex::encode(&self.0[4..6]),
			hex::encode(&self.0[6..8]),
			hex::encode(&self.0[8..10]),
			hex::encode(&self.0[10..16]),
		)
	}
}

impl fmt::Debug for Uuid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self)
	}
}

impl FromStr for Uuid {
	type Err = Error;

	fn from_str(s: &str) -> Result<Uuid, Error> {
		let hex_only = s.replace('-', "");
		let bytes = hex::decode(&hex_only)
			.map_err(|_| Error::invalid_input(format!("invalid UUID: {}", s)))?;
		let bytes: [u8; 16] = bytes
			.try_into()
			.map_err(|_| Error::invalid_input(format!("invalid UUID length: {}", s)))?;
		Ok(Uuid(bytes))
	}
}

impl Serialize for Uuid {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&format!("{}", self))
	}
}

impl<'de> Deserialize<'de> for Uuid {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Uuid, D::Error> {
		deserializer.deserialize_str(UuidVisitor)
	}
}

struct UuidVisitor;

impl<'de> Visitor<'de> for UuidVisitor {
	type Value = Uuid;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "a UUID string")
	}

	fn visit_str<E: de::Error>(self, v: &str) -> Result<Uuid, E> {
		Uuid::from_str(v).map_err(|e| E::custom(format!("{}", e)))
	}
}

/// Generate a random version-7 UUID for the current time
pub fn gen_uuid() -> Uuid {
	gen_uuid_at(now_msec())
}

/// Generate a random version-7 UUID with an explicit millisecond timestamp
pub fn gen_uuid_at(ts_msec: u64) -> Uuid {
	let mut bytes = [0u8; 16];
	thread_rng().fill(&mut bytes[..]);

	// 48-bit big-endian timestamp
	bytes[0..6].copy_from_slice(&ts_msec.to_be_bytes()[2..8]);
	// version 7, RFC 4122 variant
	bytes[6] = (bytes[6] & 0x0f) | 0x70;
	bytes[8] = (bytes[8] & 0x3f) | 0x80;

	Uuid(bytes)
}
