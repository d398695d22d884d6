use std::borrow::Cow;
use std::path::{Path, PathBuf};

use log::{debug, error};
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Params, ToSql};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Core value types for SQLite columns.
///
/// Column values come back exactly as the engine stored them; there is
/// no coercion and no schema awareness.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        })
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// One result row, columns in the order the statement produced them.
pub type Row = Vec<Value>;

/// Access layer configuration: where the database file lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Directory holding the database file.
    pub data_dir: PathBuf,
    /// Database file name.
    pub db_name: String,
}

impl DbConfig {
    /// Create a new config from a directory and a file name.
    pub fn new(data_dir: impl Into<PathBuf>, db_name: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            db_name: db_name.into(),
        }
    }

    /// Full path to the database file.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }
}

/// Synchronous access to a single SQLite database file.
///
/// A `DbAccess` owns exactly one connection for its whole lifetime.
/// Every operation blocks the calling thread until the engine returns.
/// There is no pooling and no internal locking; callers on multiple
/// threads must serialize access themselves.
#[derive(Debug)]
pub struct DbAccess {
    conn: Connection,
}

impl DbAccess {
    /// Open (or create) the database file `data_dir/db_name`.
    ///
    /// The connection runs with `journal_mode = OFF` and a 16 KiB page
    /// size. Disabling the journal trades crash-durability for write
    /// throughput: a process killed mid-write can leave the file
    /// corrupted. The page size only takes effect on files created
    /// through this constructor, since SQLite fixes it at file creation.
    pub fn open(data_dir: impl AsRef<Path>, db_name: &str) -> Result<Self, Error> {
        let conn = Connection::open(data_dir.as_ref().join(db_name))?;
        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    /// Open the file named by `config`.
    pub fn with_config(config: &DbConfig) -> Result<Self, Error> {
        Self::open(&config.data_dir, &config.db_name)
    }

    /// Open a private in-memory database with the same configuration.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    fn configure(conn: &Connection) -> Result<(), rusqlite::Error> {
        // Page size must land before the first table is created; SQLite
        // fixes it once the file has content.
        conn.execute_batch("PRAGMA journal_mode = OFF; PRAGMA page_size = 16384;")
    }

    /// Run `query` and fetch every resulting row.
    ///
    /// The whole result set is materialized; keep queries bounded
    /// accordingly. Engine errors propagate unchanged.
    pub fn read(&self, query: &str) -> Result<Vec<Row>, Error> {
        self.read_with(query, [])
    }

    /// Like [`read`](Self::read), with parameters bound by position.
    pub fn read_with<P: Params>(&self, query: &str, params: P) -> Result<Vec<Row>, Error> {
        let sql = terminate(query);
        let mut stmt = self.conn.prepare(&sql)?;
        let columns = stmt.column_count();
        let rows = stmt.query_map(params, |row| {
            (0..columns).map(|i| row.get(i)).collect::<rusqlite::Result<Row>>()
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<Row>>>()?)
    }

    /// Run `query` and fetch only the first row, `None` when the query
    /// produces nothing. Remaining rows are never fetched.
    pub fn read_one(&self, query: &str) -> Result<Option<Row>, Error> {
        self.read_one_with(query, [])
    }

    /// Like [`read_one`](Self::read_one), with parameters bound by
    /// position.
    pub fn read_one_with<P: Params>(&self, query: &str, params: P) -> Result<Option<Row>, Error> {
        let sql = terminate(query);
        let mut stmt = self.conn.prepare(&sql)?;
        let columns = stmt.column_count();
        let row = stmt
            .query_row(params, |row| {
                (0..columns).map(|i| row.get(i)).collect::<rusqlite::Result<Row>>()
            })
            .optional()?;
        Ok(row)
    }

    /// Execute a single statement and commit immediately.
    ///
    /// Failures come back as [`Error::Statement`] with the offending
    /// text attached. Callers that want print-and-continue semantics
    /// use [`write_or_log`](Self::write_or_log) instead.
    pub fn write(&self, query: &str) -> Result<(), Error> {
        self.write_with(query, [])
    }

    /// Like [`write`](Self::write), with parameters bound by position.
    pub fn write_with<P: Params>(&self, query: &str, params: P) -> Result<(), Error> {
        let sql = terminate(query);
        self.conn
            .execute(&sql, params)
            .map(|_| ())
            .map_err(|e| Error::statement(&sql, e))
    }

    /// Execute `query` once per element of `rows`, binding each element
    /// by position, inside a single transaction committed after the
    /// whole batch. A failure on any element rolls the batch back.
    pub fn write_many<I, P>(&mut self, query: &str, rows: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = P>,
        P: Params,
    {
        let sql = terminate(query);
        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::statement(&sql, e))?;
        {
            let mut stmt = tx.prepare(&sql).map_err(|e| Error::statement(&sql, e))?;
            for row in rows {
                stmt.execute(row).map_err(|e| Error::statement(&sql, e))?;
            }
        }
        tx.commit().map_err(|e| Error::statement(&sql, e))
    }

    /// Fire-and-forget [`write`](Self::write): failures are logged and
    /// swallowed instead of returned.
    pub fn write_or_log(&self, query: &str) {
        if let Err(err) = self.write(query) {
            error!("swallowed write failure: {err}");
        }
    }

    /// Fire-and-forget [`write_many`](Self::write_many).
    pub fn write_many_or_log<I, P>(&mut self, query: &str, rows: I)
    where
        I: IntoIterator<Item = P>,
        P: Params,
    {
        if let Err(err) = self.write_many(query, rows) {
            error!("swallowed write failure: {err}");
        }
    }

    /// Log every row of `sqlite_master` at debug level.
    pub fn dump_structure(&self) -> Result<(), Error> {
        for row in self.read("SELECT * FROM sqlite_master")? {
            debug!("sqlite_master: {row:?}");
        }
        Ok(())
    }

    /// Log every row of `table` at debug level.
    ///
    /// The table name is spliced into the statement, not bound; never
    /// pass untrusted input.
    pub fn dump_table(&self, table: &str) -> Result<(), Error> {
        for row in self.read(&format!("SELECT * FROM {table}"))? {
            debug!("{table}: {row:?}");
        }
        Ok(())
    }

    /// Close the connection, surfacing any close-time error.
    ///
    /// Dropping a `DbAccess` closes the connection as well; `close`
    /// exists so callers can observe the error instead of losing it.
    pub fn close(self) -> Result<(), Error> {
        self.conn.close().map_err(|(_, e)| Error::Sqlite(e))
    }
}

/// Append the statement terminator unless `query` already ends with one.
fn terminate(query: &str) -> Cow<'_, str> {
    if query.ends_with(';') {
        Cow::Borrowed(query)
    } else {
        Cow::Owned(format!("{query};"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminate_appends_missing_terminator() {
        assert_eq!(terminate("SELECT 1"), "SELECT 1;");
    }

    #[test]
    fn terminate_is_idempotent() {
        assert_eq!(terminate("SELECT 1;"), "SELECT 1;");
        assert_eq!(terminate(&terminate("SELECT 1")), "SELECT 1;");
    }

    #[test]
    fn terminate_passes_embedded_terminators_through() {
        assert_eq!(terminate("a; b"), "a; b;");
        assert_eq!(terminate("a; "), "a; ;");
    }

    #[test]
    fn terminate_handles_empty_input() {
        assert_eq!(terminate(""), ";");
    }

    #[test]
    fn value_from_conversions() {
        assert_eq!(Value::from(7i64), Value::Integer(7));
        assert_eq!(Value::from(0.5f64), Value::Real(0.5));
        assert_eq!(Value::from("x"), Value::Text("x".into()));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Blob(vec![1, 2]));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("y")), Value::Text("y".into()));
    }
}
