//! Helpers to deal with timestamps

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, TimeZone, Utc};

/// Largest timestamp value the engine accepts (2^53 - 1, the largest
/// integer that survives a round-trip through an IEEE 754 double)
pub const MAX_SAFE_TIMESTAMP: u64 = (1 << 53) - 1;

/// Returns milliseconds since UNIX epoch
pub fn now_msec() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("Fix your clock :o")
		.as_millis() as u64
}

/// Renders a millisecond timestamp as an RFC 3339 date-time string
pub fn msec_to_rfc3339(msecs: u64) -> String {
	let secs = msecs as i64 / 1000;
	let nanos = (msecs as i64 % 1000) as u32 * 1_000_000;
	match Utc.timestamp_opt(secs, nanos) {
		chrono::LocalResult::Single(t) => t.to_rfc3339_opts(SecondsFormat::Millis, true),
		_ => format!("{}ms", msecs),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_msec_to_rfc3339() {
		assert_eq!(msec_to_rfc3339(0), "1970-01-01T00:00:00.000Z");
		assert_eq!(msec_to_rfc3339(1_234), "1970-01-01T00:00:01.234Z");
	}
}
