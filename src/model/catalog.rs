//! Metadata catalog: schema, migrations and CRUD primitives.
//!
//! The catalog owns one table, `metadata_v1`, holding one row per object
//! lifetime. A live object is a row whose `path_key` is non-null; deleting
//! rewrites the row in place into a tombstone (`path_key := NULL`,
//! `rec_type := 'DELETE'`), so `path_key` uniqueness guarantees at most one
//! live row per path while dead rows may accumulate. `entity_id` is unique
//! across all rows: a physical entity is never shared or reused.

use std::str::FromStr;

use omnio_db as db;
use omnio_db::params;
use omnio_db::rusqlite;
use omnio_db::rusqlite::OptionalExtension;

use omnio_util::data::{gen_uuid, Uuid};
use omnio_util::error::Error;
use omnio_util::time::now_msec;

use crate::object::*;
use crate::text;

// Ordered migration list; every step is idempotent
const MIGRATIONS: &[&str] = &[
	"CREATE TABLE IF NOT EXISTS metadata_v1 (
		object_id TEXT NOT NULL,
		entity_id TEXT NOT NULL,
		object_path TEXT NOT NULL,
		path_key TEXT,
		path_seg TEXT NOT NULL,
		size INTEGER NOT NULL,
		mime_type TEXT NOT NULL,
		checksum TEXT NOT NULL,
		md5_state BLOB NOT NULL,
		num_parts INTEGER NOT NULL,
		part_size INTEGER NOT NULL,
		rec_type TEXT NOT NULL,
		rec_time INTEGER NOT NULL,
		created_at INTEGER NOT NULL,
		last_modified_at INTEGER NOT NULL,
		object_tags TEXT NOT NULL,
		description TEXT,
		desc_fts TEXT,
		user_metadata TEXT
	)",
	"CREATE UNIQUE INDEX IF NOT EXISTS metadata_v1_path_key ON metadata_v1 (path_key)",
	"CREATE UNIQUE INDEX IF NOT EXISTS metadata_v1_entity_id ON metadata_v1 (entity_id)",
	"CREATE INDEX IF NOT EXISTS metadata_v1_path_seg ON metadata_v1 (path_seg)",
	"CREATE INDEX IF NOT EXISTS metadata_v1_desc_fts ON metadata_v1 (desc_fts)",
	"CREATE VIEW IF NOT EXISTS metadata AS SELECT
		object_id, entity_id, object_path, size, mime_type, checksum,
		num_parts, part_size, rec_type AS record_type, created_at,
		last_modified_at, object_tags, description, user_metadata
	FROM metadata_v1 WHERE path_key IS NOT NULL",
];

const SUMMARY_COLS: &str =
	"object_path, size, mime_type, checksum, num_parts, created_at, last_modified_at";

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
	PathAsc,
	PathDesc,
	ModifiedAsc,
	ModifiedDesc,
}

#[derive(Debug, Clone, Copy)]
pub struct ListOpts {
	pub recursive: bool,
	pub order: ListOrder,
	pub limit: Option<u64>,
}

impl Default for ListOpts {
	fn default() -> Self {
		ListOpts {
			recursive: false,
			order: ListOrder::PathAsc,
			limit: None,
		}
	}
}

#[derive(Debug, Clone, Copy)]
pub struct SearchOpts {
	pub recursive: bool,
	pub limit: Option<u64>,
}

impl Default for SearchOpts {
	fn default() -> Self {
		SearchOpts {
			recursive: true,
			limit: None,
		}
	}
}

/// Handle on the metadata catalog of one bucket
#[derive(Clone)]
pub struct Catalog {
	db: db::Db,
}

impl Catalog {
	pub fn new(db: db::Db) -> Self {
		Catalog { db }
	}

	/// Apply the ordered migration list. Idempotent.
	pub fn migrate(&self, bucket_name: &str) -> Result<(), Error> {
		for (i, migration) in MIGRATIONS.iter().enumerate() {
			trace!("apply migration {}", i);
			self.db.execute_batch(migration)?;
		}
		info!(
			"Catalog for bucket {} ready on {}",
			bucket_name,
			self.db.engine()
		);
		Ok(())
	}

	/// Upsert by object path: replace the live row's entity binding and
	/// content columns, or insert a fresh row with a new object id. A
	/// pre-existing row bound to the same entity is a metadata-only update
	/// (in-place append or tag/description change): the record type becomes
	/// `UPDATE_METADATA` instead of `CREATE`.
	pub fn create(&self, row: &NewObject) -> Result<(), Error> {
		let now = now_msec();
		self.db.transaction::<_, Error, _>(|tx| {
			let cur = tx
				.query_row(
					"SELECT entity_id FROM metadata_v1 WHERE path_key = ?1",
					params![row.object_path],
					|r| r.get::<_, String>(0),
				)
				.optional()
				.map_err(db_err)?;

			match cur {
				Some(cur_entity) => {
					let rec_type = if cur_entity == row.entity_id.to_string() {
						RecordType::UpdateMetadata
					} else {
						RecordType::Create
					};
					update_live_row(tx, row, rec_type, now)
				}
				None => insert_row(tx, row, now),
			}
		})
	}

	/// Insert only: fails with `ObjectExists` if a live row exists
	pub fn create_exclusive(&self, row: &NewObject) -> Result<(), Error> {
		let now = now_msec();
		self.db.transaction::<_, Error, _>(|tx| {
			let exists = tx
				.query_row(
					"SELECT 1 FROM metadata_v1 WHERE path_key = ?1",
					params![row.object_path],
					|_| Ok(()),
				)
				.optional()
				.map_err(db_err)?;
			if exists.is_some() {
				return Err(Error::ObjectExists(row.object_path.clone()));
			}
			insert_row(tx, row, now)
		})
	}

	/// Conditional update: rewrite the live row only if its checksum still
	/// matches `expect_checksum`. The compare-and-set predicate lives in the
	/// `WHERE` clause of a single statement, so two racing appends see
	/// exactly one winner.
	pub fn update_exclusive(&self, row: &NewObject, expect_checksum: &str) -> Result<(), Error> {
		let now = now_msec();
		let n = self.db.execute(
			"UPDATE metadata_v1 SET
				entity_id = ?3, size = ?4, mime_type = ?5, checksum = ?6,
				md5_state = ?7, num_parts = ?8, part_size = ?9,
				rec_type = ?10, rec_time = ?11, last_modified_at = ?12,
				object_tags = ?13, description = ?14, desc_fts = ?15,
				user_metadata = ?16
			WHERE path_key = ?1 AND checksum = ?2",
			params![
				row.object_path,
				expect_checksum,
				row.entity_id.to_string(),
				row.size as i64,
				row.mime_type,
				row.checksum,
				row.md5_state,
				row.num_parts as i64,
				row.part_size as i64,
				RecordType::UpdateMetadata.as_str(),
				now as i64,
				row.timestamp as i64,
				tags_json(&row.object_tags)?,
				row.description,
				row.description.as_deref().map(text::fts_document),
				metadata_json(&row.user_metadata)?,
			],
		)?;

		if n == 0 {
			if self.exists(&row.object_path)? {
				return Err(Error::PreconditionFailed(
					row.object_path.clone(),
					expect_checksum.to_string(),
				));
			} else {
				return Err(Error::ObjectNotFound(row.object_path.clone()));
			}
		}
		Ok(())
	}

	/// Read the live row at `path`, materialising the heavy columns only
	/// when requested. Fails with `ObjectNotFound` if no live row exists.
	pub fn read(&self, path: &str, opts: &ReadOpts) -> Result<ObjectMeta, Error> {
		let mut cols = vec![
			"object_id",
			"entity_id",
			"object_path",
			"size",
			"mime_type",
			"checksum",
			"md5_state",
			"num_parts",
			"part_size",
			"rec_type",
			"created_at",
			"last_modified_at",
		];
		if opts.object_tags {
			cols.push("object_tags");
		}
		if opts.description {
			cols.push("description");
		}
		if opts.user_metadata {
			cols.push("user_metadata");
		}
		let sql = format!(
			"SELECT {} FROM metadata_v1 WHERE path_key = ?1",
			cols.join(", ")
		);

		let opts = *opts;
		let meta = self.db.query_row_opt(&sql, params![path], move |row| {
			let mut meta = ObjectMeta {
				object_id: parse_uuid(0, row.get(0)?)?,
				entity_id: parse_uuid(1, row.get(1)?)?,
				object_path: row.get(2)?,
				size: row.get::<_, i64>(3)? as u64,
				mime_type: row.get(4)?,
				checksum: row.get(5)?,
				md5_state: row.get(6)?,
				num_parts: row.get::<_, i64>(7)? as u32,
				part_size: row.get::<_, i64>(8)? as u64,
				rec_type: parse_rec_type(9, row.get(9)?)?,
				created_at: row.get::<_, i64>(10)? as u64,
				last_modified_at: row.get::<_, i64>(11)? as u64,
				object_tags: None,
				description: None,
				user_metadata: None,
			};
			let mut idx = 12;
			if opts.object_tags {
				meta.object_tags = Some(parse_json(idx, row.get(idx)?)?);
				idx += 1;
			}
			if opts.description {
				meta.description = row.get(idx)?;
				idx += 1;
			}
			if opts.user_metadata {
				let raw: Option<String> = row.get(idx)?;
				meta.user_metadata = match raw {
					Some(s) => Some(parse_json(idx, s)?),
					None => None,
				};
			}
			Ok(meta)
		})?;

		meta.ok_or_else(|| Error::ObjectNotFound(path.to_string()))
	}

	/// Whether a live row exists at `path`; never errors for "not found"
	pub fn exists(&self, path: &str) -> Result<bool, Error> {
		let row = self.db.query_row_opt(
			"SELECT 1 FROM metadata_v1 WHERE path_key = ?1",
			params![path],
			|_| Ok(()),
		)?;
		Ok(row.is_some())
	}

	/// Tombstone the live row at `path` in place, keeping its object id.
	/// Returns the entity id that was bound to the path, or `None` if there
	/// was no live row (idempotent no-op).
	pub fn delete(&self, path: &str) -> Result<Option<Uuid>, Error> {
		let now = now_msec();
		self.db.transaction::<_, Error, _>(|tx| {
			let cur = tx
				.query_row(
					"SELECT entity_id FROM metadata_v1 WHERE path_key = ?1",
					params![path],
					|r| r.get::<_, String>(0),
				)
				.optional()
				.map_err(db_err)?;

			let entity = match cur {
				None => return Ok(None),
				Some(e) => parse_uuid(0, e).map_err(db_err)?,
			};

			tx.execute(
				"UPDATE metadata_v1 SET path_key = NULL, rec_type = ?2, rec_time = ?3
				WHERE path_key = ?1",
				params![path, RecordType::Delete.as_str(), now as i64],
			)
			.map_err(db_err)?;

			Ok(Some(entity))
		})
	}

	/// Lazy sequence over live rows under a directory prefix
	pub fn list<'a>(
		&'a self,
		dir_path: &str,
		opts: &ListOpts,
	) -> Result<impl Iterator<Item = Result<ObjectSummary, Error>> + 'a, Error> {
		let prefix = normalize_dir(dir_path);

		let mut sql = format!(
			"SELECT {} FROM metadata_v1 WHERE path_key LIKE ? ESCAPE '\\'",
			SUMMARY_COLS
		);
		let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> =
			vec![Box::new(format!("{}%", escape_like(&prefix)))];

		if !opts.recursive {
			sql.push_str(" AND instr(substr(path_key, ?), '/') = 0");
			sql_params.push(Box::new((prefix.len() + 1) as i64));
		}

		sql.push_str(match opts.order {
			ListOrder::PathAsc => " ORDER BY path_key ASC",
			ListOrder::PathDesc => " ORDER BY path_key DESC",
			ListOrder::ModifiedAsc => " ORDER BY last_modified_at ASC, path_key ASC",
			ListOrder::ModifiedDesc => " ORDER BY last_modified_at DESC, path_key ASC",
		});

		if let Some(limit) = opts.limit {
			sql.push_str(" LIMIT ?");
			sql_params.push(Box::new(limit as i64));
		}

		let iter = self.db.iter_rows(&sql, sql_params, parse_summary)?;
		Ok(iter.map(|r| r.map_err(Error::Database)))
	}

	/// Lazy sequence of rows scored by full-text match on `desc_fts`,
	/// filtered by a directory prefix. Only matching rows are returned,
	/// best score first.
	pub fn search<'a>(
		&'a self,
		dir_path: &str,
		query: &str,
		opts: &SearchOpts,
	) -> Result<impl Iterator<Item = Result<SearchHit, Error>> + 'a, Error> {
		let tokens = text::tokenize(query);
		let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

		let score_expr = if tokens.is_empty() {
			"0".to_string()
		} else {
			tokens
				.iter()
				.map(|t| {
					sql_params.push(Box::new(format!(" {} ", t)));
					"(CASE WHEN instr(' ' || desc_fts || ' ', ?) > 0 THEN 1 ELSE 0 END)"
						.to_string()
				})
				.collect::<Vec<_>>()
				.join(" + ")
		};

		let prefix = normalize_dir(dir_path);
		let mut sql = format!(
			"SELECT * FROM (SELECT {}, ({}) AS score
			FROM metadata_v1 WHERE path_key LIKE ? ESCAPE '\\'",
			SUMMARY_COLS, score_expr
		);
		sql_params.push(Box::new(format!("{}%", escape_like(&prefix))));

		if !opts.recursive {
			sql.push_str(" AND instr(substr(path_key, ?), '/') = 0");
			sql_params.push(Box::new((prefix.len() + 1) as i64));
		}

		sql.push_str(") WHERE score > 0 ORDER BY score DESC, object_path ASC");
		if let Some(limit) = opts.limit {
			sql.push_str(" LIMIT ?");
			sql_params.push(Box::new(limit as i64));
		}

		let iter = self.db.iter_rows(&sql, sql_params, |row| {
			Ok(SearchHit {
				object: parse_summary(row)?,
				score: row.get::<_, i64>(7)? as u32,
			})
		})?;
		Ok(iter.map(|r| r.map_err(Error::Database)))
	}
}

// ---- row writing helpers ----

fn insert_row(
	tx: &rusqlite::Transaction<'_>,
	row: &NewObject,
	now: u64,
) -> Result<(), Error> {
	let segments = row.object_path.split('/').collect::<Vec<_>>();
	tx.execute(
		"INSERT INTO metadata_v1 (
			object_id, entity_id, object_path, path_key, path_seg, size,
			mime_type, checksum, md5_state, num_parts, part_size, rec_type,
			rec_time, created_at, last_modified_at, object_tags, description,
			desc_fts, user_metadata
		) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
		params![
			gen_uuid().to_string(),
			row.entity_id.to_string(),
			row.object_path,
			row.object_path,
			serde_json::to_string(&segments)?,
			row.size as i64,
			row.mime_type,
			row.checksum,
			row.md5_state,
			row.num_parts as i64,
			row.part_size as i64,
			RecordType::Create.as_str(),
			now as i64,
			row.timestamp as i64,
			row.timestamp as i64,
			tags_json(&row.object_tags)?,
			row.description,
			row.description.as_deref().map(text::fts_document),
			metadata_json(&row.user_metadata)?,
		],
	)
	.map_err(db_err)?;
	Ok(())
}

fn update_live_row(
	tx: &rusqlite::Transaction<'_>,
	row: &NewObject,
	rec_type: RecordType,
	now: u64,
) -> Result<(), Error> {
	tx.execute(
		"UPDATE metadata_v1 SET
			entity_id = ?2, size = ?3, mime_type = ?4, checksum = ?5,
			md5_state = ?6, num_parts = ?7, part_size = ?8, rec_type = ?9,
			rec_time = ?10, last_modified_at = ?11, object_tags = ?12,
			description = ?13, desc_fts = ?14, user_metadata = ?15
		WHERE path_key = ?1",
		params![
			row.object_path,
			row.entity_id.to_string(),
			row.size as i64,
			row.mime_type,
			row.checksum,
			row.md5_state,
			row.num_parts as i64,
			row.part_size as i64,
			rec_type.as_str(),
			now as i64,
			row.timestamp as i64,
			tags_json(&row.object_tags)?,
			row.description,
			row.description.as_deref().map(text::fts_document),
			metadata_json(&row.user_metadata)?,
		],
	)
	.map_err(db_err)?;
	Ok(())
}

fn tags_json(tags: &[String]) -> Result<String, Error> {
	Ok(serde_json::to_string(tags)?)
}

fn metadata_json(metadata: &Option<serde_json::Value>) -> Result<Option<String>, Error> {
	match metadata {
		Some(v) => Ok(Some(serde_json::to_string(v)?)),
		None => Ok(None),
	}
}

// ---- row reading helpers ----

fn parse_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObjectSummary> {
	Ok(ObjectSummary {
		object_path: row.get(0)?,
		size: row.get::<_, i64>(1)? as u64,
		mime_type: row.get(2)?,
		checksum: row.get(3)?,
		num_parts: row.get::<_, i64>(4)? as u32,
		created_at: row.get::<_, i64>(5)? as u64,
		last_modified_at: row.get::<_, i64>(6)? as u64,
	})
}

fn parse_uuid(idx: usize, s: String) -> rusqlite::Result<Uuid> {
	Uuid::from_str(&s).map_err(|e| conversion_err(idx, e))
}

fn parse_rec_type(idx: usize, s: String) -> rusqlite::Result<RecordType> {
	RecordType::from_str(&s).map_err(|e| conversion_err(idx, e))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, s: String) -> rusqlite::Result<T> {
	serde_json::from_str(&s).map_err(|e| conversion_err(idx, e))
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
	E: std::error::Error + Send + Sync + 'static,
{
	rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn db_err(e: rusqlite::Error) -> Error {
	Error::Database(e.into())
}

// ---- sql string helpers ----

fn normalize_dir(dir_path: &str) -> String {
	if dir_path.is_empty() {
		String::new()
	} else {
		format!("{}/", dir_path.strip_suffix('/').unwrap_or(dir_path))
	}
}

fn escape_like(s: &str) -> String {
	s.replace('\\', "\\\\")
		.replace('%', "\\%")
		.replace('_', "\\_")
}

#[cfg(test)]
mod tests {
	use super::*;

	use omnio_util::data::gen_uuid;

	fn test_catalog() -> Catalog {
		let catalog = Catalog::new(db::Db::open_in_memory().unwrap());
		catalog.migrate("test-bucket").unwrap();
		catalog
	}

	fn new_object(path: &str) -> NewObject {
		NewObject {
			entity_id: gen_uuid(),
			object_path: path.to_string(),
			size: 3,
			mime_type: "text/plain".to_string(),
			checksum: "acbd18db4cc2f85cedef654fccc4a4d8".to_string(),
			md5_state: vec![1, 2, 3],
			num_parts: 1,
			part_size: 5_000_000,
			timestamp: 1_700_000_000_000,
			object_tags: vec![],
			description: None,
			user_metadata: None,
		}
	}

	#[test]
	fn test_migrate_is_idempotent() {
		let catalog = test_catalog();
		catalog.migrate("test-bucket").unwrap();
		catalog.migrate("test-bucket").unwrap();
	}

	#[test]
	fn test_create_and_read() {
		let catalog = test_catalog();
		let mut obj = new_object("a/b.txt");
		obj.object_tags = vec!["one".to_string(), "two".to_string()];
		obj.description = Some("a test object".to_string());
		obj.user_metadata = Some(serde_json::json!({"k": "v"}));
		catalog.create(&obj).unwrap();

		let meta = catalog.read("a/b.txt", &ReadOpts::all()).unwrap();
		assert_eq!(meta.entity_id, obj.entity_id);
		assert_eq!(meta.size, 3);
		assert_eq!(meta.mime_type, "text/plain");
		assert_eq!(meta.checksum, obj.checksum);
		assert_eq!(meta.md5_state, vec![1, 2, 3]);
		assert_eq!(meta.rec_type, RecordType::Create);
		assert_eq!(meta.created_at, obj.timestamp);
		assert_eq!(meta.last_modified_at, obj.timestamp);
		assert_eq!(
			meta.object_tags,
			Some(vec!["one".to_string(), "two".to_string()])
		);
		assert_eq!(meta.description.as_deref(), Some("a test object"));
		assert_eq!(meta.user_metadata, Some(serde_json::json!({"k": "v"})));

		// heavy columns are not materialised by default
		let meta = catalog.read("a/b.txt", &ReadOpts::default()).unwrap();
		assert_eq!(meta.object_tags, None);
		assert_eq!(meta.description, None);
		assert_eq!(meta.user_metadata, None);
	}

	#[test]
	fn test_read_not_found() {
		let catalog = test_catalog();
		assert!(matches!(
			catalog.read("nope", &ReadOpts::default()),
			Err(Error::ObjectNotFound(_))
		));
		assert!(!catalog.exists("nope").unwrap());
	}

	#[test]
	fn test_rewrite_keeps_object_id_and_created_at() {
		let catalog = test_catalog();
		let obj = new_object("x.txt");
		catalog.create(&obj).unwrap();
		let before = catalog.read("x.txt", &ReadOpts::default()).unwrap();

		let mut rewrite = new_object("x.txt");
		rewrite.timestamp += 1000;
		catalog.create(&rewrite).unwrap();
		let after = catalog.read("x.txt", &ReadOpts::default()).unwrap();

		assert_eq!(after.object_id, before.object_id);
		assert_eq!(after.created_at, before.created_at);
		assert_eq!(after.entity_id, rewrite.entity_id);
		assert_eq!(after.rec_type, RecordType::Create);
		assert_eq!(after.last_modified_at, rewrite.timestamp);
	}

	#[test]
	fn test_same_entity_is_metadata_update() {
		let catalog = test_catalog();
		let obj = new_object("x.txt");
		catalog.create(&obj).unwrap();

		let mut update = new_object("x.txt");
		update.entity_id = obj.entity_id;
		update.size = 6;
		catalog.create(&update).unwrap();

		let meta = catalog.read("x.txt", &ReadOpts::default()).unwrap();
		assert_eq!(meta.rec_type, RecordType::UpdateMetadata);
		assert_eq!(meta.size, 6);
	}

	#[test]
	fn test_create_exclusive() {
		let catalog = test_catalog();
		catalog.create_exclusive(&new_object("x.txt")).unwrap();
		assert!(matches!(
			catalog.create_exclusive(&new_object("x.txt")),
			Err(Error::ObjectExists(_))
		));

		catalog.delete("x.txt").unwrap();
		catalog.create_exclusive(&new_object("x.txt")).unwrap();
	}

	#[test]
	fn test_entity_id_is_unique() {
		let catalog = test_catalog();
		let obj = new_object("one.txt");
		catalog.create(&obj).unwrap();

		let mut clash = new_object("two.txt");
		clash.entity_id = obj.entity_id;
		assert!(matches!(catalog.create(&clash), Err(Error::Database(_))));
	}

	#[test]
	fn test_update_exclusive() {
		let catalog = test_catalog();
		let obj = new_object("x.txt");
		catalog.create(&obj).unwrap();

		let mut appended = new_object("x.txt");
		appended.entity_id = obj.entity_id;
		appended.size = 6;
		appended.checksum = "37b51d194a7513e45b56f6524f2d51f2".to_string();

		assert!(matches!(
			catalog.update_exclusive(&appended, "00000000000000000000000000000000"),
			Err(Error::PreconditionFailed(_, _))
		));

		catalog.update_exclusive(&appended, &obj.checksum).unwrap();
		let meta = catalog.read("x.txt", &ReadOpts::default()).unwrap();
		assert_eq!(meta.size, 6);
		assert_eq!(meta.checksum, appended.checksum);
		assert_eq!(meta.rec_type, RecordType::UpdateMetadata);

		assert!(matches!(
			catalog.update_exclusive(&new_object("gone"), &obj.checksum),
			Err(Error::ObjectNotFound(_))
		));
	}

	#[test]
	fn test_delete_is_idempotent() {
		let catalog = test_catalog();
		let obj = new_object("x.txt");
		catalog.create(&obj).unwrap();

		assert_eq!(catalog.delete("x.txt").unwrap(), Some(obj.entity_id));
		assert_eq!(catalog.delete("x.txt").unwrap(), None);
		assert!(matches!(
			catalog.read("x.txt", &ReadOpts::default()),
			Err(Error::ObjectNotFound(_))
		));
	}

	#[test]
	fn test_list() {
		let catalog = test_catalog();
		for path in ["top.txt", "dir/one.txt", "dir/two.txt", "dir/sub/three.txt"] {
			catalog.create(&new_object(path)).unwrap();
		}

		fn paths<I: Iterator<Item = Result<ObjectSummary, Error>>>(iter: I) -> Vec<String> {
			iter.map(|r| r.map(|s| s.object_path))
				.collect::<Result<Vec<_>, _>>()
				.unwrap()
		}

		let root = paths(catalog.list("", &ListOpts::default()).unwrap());
		assert_eq!(root, vec!["top.txt"]);

		let all = paths(
			catalog
				.list(
					"",
					&ListOpts {
						recursive: true,
						..Default::default()
					},
				)
				.unwrap(),
		);
		assert_eq!(
			all,
			vec!["dir/one.txt", "dir/sub/three.txt", "dir/two.txt", "top.txt"]
		);

		let dir = paths(catalog.list("dir", &ListOpts::default()).unwrap());
		assert_eq!(dir, vec!["dir/one.txt", "dir/two.txt"]);

		let desc = paths(
			catalog
				.list(
					"dir",
					&ListOpts {
						order: ListOrder::PathDesc,
						limit: Some(1),
						..Default::default()
					},
				)
				.unwrap(),
		);
		assert_eq!(desc, vec!["dir/two.txt"]);
	}

	#[test]
	fn test_list_does_not_show_deleted() {
		let catalog = test_catalog();
		catalog.create(&new_object("a.txt")).unwrap();
		catalog.create(&new_object("b.txt")).unwrap();
		catalog.delete("a.txt").unwrap();

		let iter = catalog.list("", &ListOpts::default()).unwrap();
		let paths = iter
			.map(|r| r.map(|s| s.object_path))
			.collect::<Result<Vec<_>, _>>()
			.unwrap();
		assert_eq!(paths, vec!["b.txt"]);
	}

	#[test]
	fn test_search() {
		let catalog = test_catalog();
		let mut a = new_object("docs/report.pdf");
		a.description = Some("Quarterly sales report, final version".to_string());
		catalog.create(&a).unwrap();

		let mut b = new_object("docs/notes.txt");
		b.description = Some("Rough notes on sales meetings".to_string());
		catalog.create(&b).unwrap();

		let mut c = new_object("img/logo.png");
		c.description = Some("Company logo".to_string());
		catalog.create(&c).unwrap();

		let hits = catalog
			.search("docs", "sales report", &SearchOpts::default())
			.unwrap()
			.collect::<Result<Vec<_>, _>>()
			.unwrap();
		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].object.object_path, "docs/report.pdf");
		assert_eq!(hits[0].score, 2);
		assert_eq!(hits[1].object.object_path, "docs/notes.txt");
		assert_eq!(hits[1].score, 1);

		// prefix filter applies
		let hits = catalog
			.search("img", "sales report", &SearchOpts::default())
			.unwrap()
			.collect::<Result<Vec<_>, _>>()
			.unwrap();
		assert!(hits.is_empty());

		// no tokens, no results
		let hits = catalog
			.search("", "...", &SearchOpts::default())
			.unwrap()
			.collect::<Result<Vec<_>, _>>()
			.unwrap();
		assert!(hits.is_empty());
	}
}
