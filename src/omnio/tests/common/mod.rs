#![allow(dead_code)]

use std::path::PathBuf;

use md5::{Digest, Md5};
use rand::prelude::*;

use omnio::{Config, Engine, Uuid};
use omnio_db::Db;
use omnio_store::mem::MemStore;

pub const BUCKET: &str = "test-bucket";
pub const PART_SIZE: u64 = 5_000_000;

pub struct TestContext {
	pub engine: Engine,
	pub root: PathBuf,
	_dir: mktemp::Temp,
}

pub async fn context() -> TestContext {
	let dir = mktemp::Temp::new_dir().unwrap();
	let root = dir.to_path_buf();
	let config = Config {
		root_dir: root.clone(),
		bucket_name: BUCKET.to_string(),
		part_size: PART_SIZE,
		allow_bucket_dots: false,
		max_description_size: 8 * 1024,
		max_user_metadata_size: 8 * 1024,
	};
	let engine = Engine::open(config).await.unwrap();
	TestContext {
		engine,
		root,
		_dir: dir,
	}
}

pub struct MemTestContext {
	pub engine: Engine,
	pub root: PathBuf,
	_dir: mktemp::Temp,
}

/// An engine over the in-memory store and an in-memory catalog, through
/// the same public `open_with` entry point an embedder would use.
/// `root` points below a temp dir and must stay untouched: a mem-backed
/// engine never goes near the local filesystem.
pub async fn mem_context() -> MemTestContext {
	let dir = mktemp::Temp::new_dir().unwrap();
	let root = dir.to_path_buf().join("mem-root");
	let config = Config {
		root_dir: root.clone(),
		bucket_name: BUCKET.to_string(),
		part_size: PART_SIZE,
		allow_bucket_dots: false,
		max_description_size: 8 * 1024,
		max_user_metadata_size: 8 * 1024,
	};
	let engine = Engine::open_with(config, MemStore::init(), Db::open_in_memory().unwrap())
		.await
		.unwrap();
	MemTestContext {
		engine,
		root,
		_dir: dir,
	}
}

impl TestContext {
	pub fn storage_dir(&self) -> PathBuf {
		self.root.join(BUCKET).join("storage")
	}

	pub fn entity_dir(&self, entity: &Uuid) -> PathBuf {
		self.storage_dir().join(entity.to_string())
	}

	pub fn entity_count(&self) -> usize {
		std::fs::read_dir(self.storage_dir()).unwrap().count()
	}
}

pub fn md5_hex(data: &[u8]) -> String {
	let mut hash = Md5::new();
	hash.update(data);
	hex::encode(hash.finalize())
}

pub fn random_bytes(len: usize) -> Vec<u8> {
	let mut data = vec![0u8; len];
	rand::thread_rng().fill_bytes(&mut data);
	data
}
