//! SQLite connection, schema setup and statistics

use super::schema;
use crate::{Error, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

/// SQLite-backed storage for the code model
pub struct SqliteStore {
    pub(crate) conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open a database that must already exist on disk.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::MissingDatabase(path.to_path_buf()));
        }
        Self::open(path)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", true)?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(&stmt, [])?;
        }
        Ok(())
    }

    // ========== Options ==========

    pub fn db_option(&self, key: i64) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT value FROM db_option WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    pub fn set_db_option(&self, key: i64, value: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO db_option (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // ========== Raw access ==========

    /// Run an arbitrary statement and return every cell rendered as text.
    pub fn raw_query(&self, sql: &str) -> Result<RawQueryResult> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(render_cell(row.get_ref(i)?));
            }
            data.push(cells);
        }
        Ok(RawQueryResult { columns, data })
    }

    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let mut tables = Vec::with_capacity(schema::COUNTED_TABLES.len());
        for table in schema::COUNTED_TABLES {
            tables.push((table.to_string(), self.count_rows(table)?));
        }
        Ok(DbStats {
            tables,
            version: self.db_option(schema::KEY_VERSION)?,
            state: self
                .db_option(schema::KEY_DATABASE_STATE)?
                .map(crate::kinds::State::from_i64),
        })
    }
}

fn render_cell(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Result of [`SqliteStore::raw_query`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawQueryResult {
    pub columns: Vec<String>,
    pub data: Vec<Vec<String>>,
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    /// Row count per table
    pub tables: Vec<(String, usize)>,
    pub version: Option<i64>,
    pub state: Option<crate::kinds::State>,
}

impl DbStats {
    pub fn count(&self, table: &str) -> usize {
        self.tables
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        for (table, count) in &self.tables {
            writeln!(f, "  {table}: {count}")?;
        }
        match self.state {
            Some(state) => writeln!(f, "  state: {state}"),
            None => writeln!(f, "  state: unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_existing_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        match SqliteStore::open_existing(&path) {
            Err(Error::MissingDatabase(p)) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_schema_is_reentrant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codebase.db");
        SqliteStore::open(&path).unwrap();
        let db = SqliteStore::open_existing(&path).unwrap();
        assert_eq!(db.count_rows("source_package").unwrap(), 0);
    }

    #[test]
    fn test_raw_query_renders_cells() {
        let db = SqliteStore::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO source_package (name, qualified_name, disk_path) VALUES ('one', 'groups/one', '')",
                [],
            )
            .unwrap();
        let result = db
            .raw_query("SELECT id, qualified_name, parent_id FROM source_package")
            .unwrap();
        assert_eq!(result.columns, vec!["id", "qualified_name", "parent_id"]);
        assert_eq!(result.data, vec![vec!["1".to_string(), "groups/one".into(), String::new()]]);

        assert!(db.raw_query("SELECT * FROM no_such_table").is_err());
    }

    #[test]
    fn test_db_options() {
        let db = SqliteStore::open_in_memory().unwrap();
        assert_eq!(db.db_option(schema::KEY_VERSION).unwrap(), None);
        db.set_db_option(schema::KEY_VERSION, schema::CURRENT_VERSION).unwrap();
        db.set_db_option(schema::KEY_VERSION, schema::CURRENT_VERSION).unwrap();
        assert_eq!(db.db_option(schema::KEY_VERSION).unwrap(), Some(3));
        assert_eq!(db.stats().unwrap().version, Some(3));
    }
}
