// SPDX-License-Identifier: MIT
//! Persistent, indexed representation of parsed signal data (component E).
//!
//! Schema and query shapes are grounded directly on the reference
//! implementation's SQL (`CreateSchema`, `AddSignal`, `AddValue`,
//! `FindSignalByName`): two relations, `Signals` and `Svalues`, plus a
//! `Meta` relation recording the resolved timescale (see `SPEC_FULL.md` §9).

mod error;

use rusqlite::{Connection, OptionalExtension};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub use self::error::StoreError;

static MEM_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Returns a unique in-memory store name,
/// `test.<counter>.db?cache=shared&mode=memory`, so concurrent tests never
/// collide. The counter is a process-wide atomic integer per §5.
pub fn new_mem_name() -> String {
    let n = MEM_DB_COUNTER.fetch_add(1, Ordering::SeqCst) + 1;
    format!("file:test.{}.db?cache=shared&mode=memory", n)
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Signals(
        Name STRING PRIMARY KEY,
        Type INTEGER NOT NULL,
        Code STRING NOT NULL,
        Size INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS SignalsByCode ON Signals(Code, Name);

    CREATE TABLE IF NOT EXISTS Svalues(
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Timestamp INTEGER NOT NULL,
        Code STRING NOT NULL,
        Value STRING NOT NULL,
        FOREIGN KEY(Code) REFERENCES Signals(Code)
    );
    CREATE INDEX IF NOT EXISTS SvaluesByCodeAndTimestamp ON Svalues(Code, Timestamp, Value);

    CREATE TABLE IF NOT EXISTS Meta(
        Key STRING PRIMARY KEY,
        Value STRING NOT NULL
    );
";

/// Reads a `STRING`-declared column as a `String` regardless of the storage
/// class SQLite's NUMERIC affinity coerced it to (e.g. a signal `Code` of
/// `"1"` may be stored as an `INTEGER`), mirroring how the reference
/// implementation's driver performs an implicit string conversion on scan.
fn text_column(row: &rusqlite::Row<'_>, idx: usize, col_name: &'static str) -> rusqlite::Result<String> {
    use rusqlite::types::ValueRef;
    match row.get_ref(idx)? {
        ValueRef::Text(t) => Ok(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Integer(i) => Ok(i.to_string()),
        ValueRef::Real(r) => Ok(r.to_string()),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            col_name.to_string(),
            other.data_type(),
        )),
    }
}

/// A signal's metadata row as read back from `Signals`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub name: String,
    pub var_type: i32,
    pub code: String,
    pub size: i32,
}

pub struct Store {
    conn: Connection,
    status: Mutex<String>,
}

impl Store {
    /// Opens (creating if necessary) the store at `name`, an `rusqlite`
    /// connection string. Schema creation is idempotent: a store already
    /// holding data is attached to as-is.
    pub fn open(name: &str) -> Result<Store, StoreError> {
        let conn = Connection::open(name).map_err(|source| StoreError::Open {
            name: name.to_string(),
            source,
        })?;
        // The reference implementation's sqlite driver does not enforce
        // foreign keys by default; rusqlite's bundled sqlite is compiled
        // with SQLITE_DEFAULT_FOREIGN_KEYS=1, which would otherwise reject
        // this schema's non-unique `Code` reference. Match the reference
        // driver's behavior explicitly.
        conn.execute_batch("PRAGMA foreign_keys = OFF;")
            .map_err(StoreError::Schema)?;
        conn.execute_batch(SCHEMA).map_err(StoreError::Schema)?;
        Ok(Store {
            conn,
            status: Mutex::new(String::new()),
        })
    }

    /// Opens a fresh, uniquely-named in-memory store. Convenience wrapper
    /// around [`new_mem_name`] + [`Store::open`] for tests and fixtures.
    ///
    /// # Example
    ///
    /// ```
    /// use vcdquery::store::Store;
    ///
    /// let store = Store::open_in_memory().unwrap();
    /// store.insert_signal("/top/clk", 0, "!", 1).unwrap();
    /// assert_eq!(store.find_signal_by_name("/top/clk").unwrap().unwrap().code, "!");
    /// ```
    pub fn open_in_memory() -> Result<Store, StoreError> {
        Store::open(&new_mem_name())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn begin(&self) -> Result<rusqlite::Transaction<'_>, StoreError> {
        self.conn.unchecked_transaction().map_err(StoreError::Transaction)
    }

    pub fn insert_signal(
        &self,
        name: &str,
        var_type: i32,
        code: &str,
        size: i32,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO Signals(Name, Type, Code, Size) VALUES(?1, ?2, ?3, ?4)",
                rusqlite::params![name, var_type, code, size],
            )
            .map_err(|source| StoreError::InsertSignal {
                name: name.to_string(),
                source,
            })?;
        Ok(())
    }

    pub fn insert_value(&self, timestamp: i64, code: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO Svalues(Timestamp, Code, Value) VALUES(?1, ?2, ?3)",
                rusqlite::params![timestamp, code, value],
            )
            .map_err(|source| StoreError::InsertValue {
                code: code.to_string(),
                timestamp,
                source,
            })?;
        Ok(())
    }

    pub fn find_signal_by_name(&self, name: &str) -> Result<Option<SignalRow>, StoreError> {
        self.conn
            .query_row(
                "SELECT Name, Type, Code, Size FROM Signals WHERE Name = ?1 LIMIT 1",
                [name],
                |row| {
                    Ok(SignalRow {
                        name: text_column(row, 0, "Name")?,
                        var_type: row.get(1)?,
                        code: text_column(row, 2, "Code")?,
                        size: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::Query)
    }

    /// All signals in declaration order, for the catalogue export collaborator.
    pub fn all_signals(&self) -> Result<Vec<SignalRow>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT Name, Type, Code, Size FROM Signals ORDER BY Name")
            .map_err(StoreError::Query)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SignalRow {
                    name: text_column(row, 0, "Name")?,
                    var_type: row.get(1)?,
                    code: text_column(row, 2, "Code")?,
                    size: row.get(3)?,
                })
            })
            .map_err(StoreError::Query)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Query)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO Meta(Key, Value) VALUES(?1, ?2)
                 ON CONFLICT(Key) DO UPDATE SET Value = excluded.Value",
                rusqlite::params![key, value],
            )
            .map_err(StoreError::Query)?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row("SELECT Value FROM Meta WHERE Key = ?1", [key], |row| {
                text_column(row, 0, "Value")
            })
            .optional()
            .map_err(StoreError::Query)
    }

    pub fn get_status(&self) -> String {
        self.status.lock().unwrap().clone()
    }

    pub fn set_status(&self, status: impl Into<String>) {
        *self.status.lock().unwrap() = status.into();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let name = new_mem_name();
        let s1 = Store::open(&name).unwrap();
        s1.insert_signal("/top/clk", 1, "!", 1).unwrap();
        // A second open against the same shared-cache in-memory name attaches
        // to existing data rather than re-creating the schema; `s1` must stay
        // alive, since a shared in-memory database is freed once its last
        // connection closes.
        let s2 = Store::open(&name).unwrap();
        let row = s2.find_signal_by_name("/top/clk").unwrap().unwrap();
        assert_eq!(row.code, "!");
    }

    #[test]
    fn mem_names_are_unique() {
        assert_ne!(new_mem_name(), new_mem_name());
    }

    #[test]
    fn meta_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_meta("timescale_unit").unwrap(), None);
        store.set_meta("timescale_unit", "ns").unwrap();
        assert_eq!(
            store.get_meta("timescale_unit").unwrap(),
            Some("ns".to_string())
        );
    }
}
