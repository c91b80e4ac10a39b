//! Wrapper around the SQL connection backing the metadata catalog.
//!
//! The catalog uses a single connection, shared behind a mutex: writers are
//! serialized by the engine lock, readers go through statement-level
//! isolation. Lazy row iterators hold the connection guard for their whole
//! lifetime, like a read cursor.

#[macro_use]
extern crate tracing;

use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use err_derive::Error;
use ouroboros::self_referencing;
use rusqlite::{Connection, Rows, Statement};

pub use rusqlite;
pub use rusqlite::params;

// ----

#[derive(Debug, Error)]
#[error(display = "{}", _0)]
pub struct Error(pub Cow<'static, str>);

pub type Result<T> = std::result::Result<T, Error>;

impl From<rusqlite::Error> for Error {
	fn from(e: rusqlite::Error) -> Error {
		Error(format!("Sqlite: {}", e).into())
	}
}

// ----

#[derive(Clone)]
pub struct Db(Arc<Mutex<Connection>>);

impl Db {
	/// Open (or create) a database file
	pub fn open(path: &Path) -> Result<Db> {
		let db = Connection::open(path)?;
		Self::init(db)
	}

	/// Open a fresh in-memory database (used by tests)
	pub fn open_in_memory() -> Result<Db> {
		let db = Connection::open_in_memory()?;
		Self::init(db)
	}

	fn init(db: Connection) -> Result<Db> {
		// journal_mode returns a row, synchronous does not
		db.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
		db.pragma_update(None, "synchronous", &"NORMAL")?;
		trace!("database connection initialized");
		Ok(Db(Arc::new(Mutex::new(db))))
	}

	pub fn engine(&self) -> String {
		format!("sqlite3 v{} (using rusqlite crate)", rusqlite::version())
	}

	fn lock(&self) -> MutexGuard<'_, Connection> {
		self.0.lock().unwrap()
	}

	/// Run a single statement, returning the number of affected rows
	pub fn execute<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<usize> {
		Ok(self.lock().execute(sql, params)?)
	}

	/// Run several `;`-separated statements
	pub fn execute_batch(&self, sql: &str) -> Result<()> {
		Ok(self.lock().execute_batch(sql)?)
	}

	/// Run a query expected to return at most one row
	pub fn query_row_opt<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
	where
		P: rusqlite::Params,
		F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
	{
		let this = self.lock();
		let mut stmt = this.prepare(sql)?;
		let mut rows = stmt.query(params)?;
		match rows.next()? {
			None => Ok(None),
			Some(row) => Ok(Some(f(row)?)),
		}
	}

	/// Run several statements atomically. The transaction is committed if
	/// the closure returns `Ok`, rolled back otherwise.
	pub fn transaction<R, E, F>(&self, f: F) -> std::result::Result<R, E>
	where
		E: From<Error>,
		F: FnOnce(&rusqlite::Transaction<'_>) -> std::result::Result<R, E>,
	{
		let mut this = self.lock();
		let tx = this.transaction().map_err(Error::from)?;
		match f(&tx) {
			Ok(r) => {
				tx.commit().map_err(Error::from)?;
				Ok(r)
			}
			Err(e) => {
				if let Err(e2) = tx.rollback() {
					warn!("Transaction rollback failed: {}", e2);
				}
				Err(e)
			}
		}
	}

	/// Run a query returning a lazy iterator over its rows.
	///
	/// The iterator holds the connection lock until it is dropped; do not
	/// keep it around across other database calls.
	pub fn iter_rows<'a, T, F>(
		&'a self,
		sql: &str,
		params: Vec<Box<dyn rusqlite::ToSql>>,
		row_fn: F,
	) -> Result<RowIter<'a, T>>
	where
		F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T> + 'static,
	{
		let aux = DbRowIterator1::try_new(self.lock(), |db| db.prepare(sql))
			.map_err(Error::from)?;
		let inner = DbRowIteratorInner::try_new(aux, |aux| {
			aux.with_stmt_mut(|stmt| {
				let params = params
					.iter()
					.map(|p| p.as_ref() as &dyn rusqlite::ToSql)
					.collect::<Vec<_>>();
				stmt.query(params.as_slice())
			})
		})
		.map_err(Error::from)?;
		Ok(RowIter {
			inner,
			row_fn: Box::new(row_fn),
		})
	}
}

// ---- lazy row iterators ----
// they must hold the MutexGuard, the Statement and the Rows objects,
// so we need self-referencing structs

// need to split in two because sequential mutable borrows are broken,
// see https://github.com/someguynamedjosh/ouroboros/issues/100
#[self_referencing]
struct DbRowIterator1<'a> {
	db: MutexGuard<'a, Connection>,
	#[borrows(mut db)]
	#[covariant]
	stmt: Statement<'this>,
}

#[self_referencing]
struct DbRowIteratorInner<'a> {
	aux: DbRowIterator1<'a>,
	#[borrows(mut aux)]
	#[covariant]
	iter: Rows<'this>,
}

pub struct RowIter<'a, T> {
	inner: DbRowIteratorInner<'a>,
	row_fn: Box<dyn Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>>,
}

impl<'a, T> Iterator for RowIter<'a, T> {
	type Item = Result<T>;

	fn next(&mut self) -> Option<Self::Item> {
		let row_fn = &self.row_fn;
		self.inner.with_iter_mut(|iter| match iter.next() {
			Err(e) => Some(Err(e.into())),
			Ok(None) => None,
			Ok(Some(row)) => Some(row_fn(row).map_err(Error::from)),
		})
	}
}
