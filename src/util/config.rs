//! Contains type and functions related to Omnio configuration

use std::io::Read;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;

/// Represent the whole configuration
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
	/// Directory under which bucket metadata and part files are stored
	pub root_dir: PathBuf,

	/// Name of the bucket served by this engine
	pub bucket_name: String,

	/// Default size of object parts, in bytes
	#[serde(default = "default_part_size")]
	pub part_size: u64,

	/// Accept dots in bucket names (disallows consecutive dots and
	/// IPv4-literal names)
	#[serde(default)]
	pub allow_bucket_dots: bool,

	/// Maximum byte length of an object description
	#[serde(default = "default_max_description_size")]
	pub max_description_size: usize,

	/// Maximum serialized byte length of object user metadata
	#[serde(default = "default_max_user_metadata_size")]
	pub max_user_metadata_size: usize,
}

fn default_part_size() -> u64 {
	5_000_000
}
fn default_max_description_size() -> usize {
	8 * 1024
}
fn default_max_user_metadata_size() -> usize {
	8 * 1024
}

/// Read and parse configuration
pub fn read_config(config_file: PathBuf) -> Result<Config, Error> {
	let mut file = std::fs::OpenOptions::new()
		.read(true)
		.open(config_file.as_path())?;

	let mut config = String::new();
	file.read_to_string(&mut config)?;

	Ok(toml::from_str(&config)?)
}
