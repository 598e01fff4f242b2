//! Backing store access and the process-lifetime table cache.
//!
//! The store seam is a small trait so tests can substitute fixtures; the
//! shipped implementation reads a SQLite database and loads whole tables
//! into memory (no pagination, no pushdown filtering).

use crate::error::Result;
use crate::table::{Cell, Table};
use log::{debug, error};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;

/// Source of raw tables.
pub trait TableStore {
    /// Names of every table in the store.
    fn table_names(&self) -> Result<Vec<String>>;

    /// Loads one table fully into memory.
    fn fetch_table(&self, name: &str) -> Result<Table>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Direct access to the underlying connection, mainly for seeding
    /// fixtures in tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl TableStore for SqliteStore {
    fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn fetch_table(&self, name: &str) -> Result<Table> {
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM \"{}\"", name))?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|c| c.to_lowercase())
            .collect();
        let width = columns.len();

        let mut table = Table::new(name, columns);
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(match row.get_ref(i)? {
                    ValueRef::Null => Cell::Null,
                    ValueRef::Integer(v) => Cell::Integer(v),
                    ValueRef::Real(v) => Cell::Real(v),
                    ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(_) => Cell::Null,
                });
            }
            table.rows.push(cells);
        }
        Ok(table)
    }
}

/// Read-through cache over a [`TableStore`], keyed by real table name.
///
/// A table, once loaded, is never re-fetched for the lifetime of the cache;
/// staleness is accepted and freshness is owned by whoever created the
/// store. Callers always receive a clone and may mutate it freely. The
/// cache is a single-consumer object: `&mut self` access enforces the
/// serialized-access assumption of the original design.
pub struct TableCache {
    store: Box<dyn TableStore>,
    tables: HashMap<String, Table>,
}

impl TableCache {
    pub fn new(store: Box<dyn TableStore>) -> Self {
        Self {
            store,
            tables: HashMap::new(),
        }
    }

    /// Resolves a partial table name case-insensitively against the cache
    /// and then the store; the first real name containing the fragment
    /// wins. Store failures are logged and collapse to `None` so callers
    /// treat them as "metric undefined for this run".
    pub fn load(&mut self, partial: &str) -> Option<Table> {
        let needle = partial.to_lowercase();

        for (name, table) in &self.tables {
            if name.to_lowercase().contains(&needle) {
                return Some(table.clone());
            }
        }

        let names = match self.store.table_names() {
            Ok(names) => names,
            Err(e) => {
                error!("failed to enumerate tables while resolving '{}': {}", partial, e);
                return None;
            }
        };
        let real_name = names.into_iter().find(|n| n.to_lowercase().contains(&needle))?;

        match self.store.fetch_table(&real_name) {
            Ok(mut table) => {
                table.columns.push("origin".to_string());
                for row in &mut table.rows {
                    row.push(Cell::Text(real_name.clone()));
                }
                debug!("loaded table '{}' ({} rows) for '{}'", real_name, table.len(), partial);
                self.tables.insert(real_name, table.clone());
                Some(table)
            }
            Err(e) => {
                error!("failed to load table '{}': {}", real_name, e);
                None
            }
        }
    }
}
