use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::enrich::EnrichedRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset not found at {0}")]
    DatasetMissing(PathBuf),
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// How a bulk load writes into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Create-and-populate: existing rows (if any) are replaced.
    Truncate,
    /// Add rows, leaving existing ones untouched.
    Append,
}

#[derive(Debug, Clone, Copy)]
pub struct TableMeta {
    pub row_count: u64,
}

/// Analytical-store capability. The pipeline only reads existing keys and
/// bulk-loads rows through this seam; the merge decision itself lives in
/// `sync`.
pub trait Warehouse {
    fn dataset_exists(&self) -> Result<bool, StoreError>;
    fn create_dataset(&mut self) -> Result<(), StoreError>;
    /// None when the dataset or the table does not exist yet.
    fn table_meta(&self, table: &str) -> Result<Option<TableMeta>, StoreError>;
    /// All `link` values currently present.
    fn query_links(&self, table: &str) -> Result<Vec<String>, StoreError>;
    /// Returns the number of rows written.
    fn bulk_load(
        &mut self,
        table: &str,
        rows: &[EnrichedRecord],
        mode: LoadMode,
    ) -> Result<usize, StoreError>;
}

// ── SQLite warehouse ──

/// One dataset = one database file. Tables live inside it with the persisted
/// article schema.
pub struct SqliteWarehouse {
    db_path: PathBuf,
}

impl SqliteWarehouse {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        SqliteWarehouse {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Read-only handle; the dataset file must already exist.
    fn open_existing(&self) -> Result<Connection, StoreError> {
        if !self.db_path.exists() {
            return Err(StoreError::DatasetMissing(self.db_path.clone()));
        }
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    /// Writable handle, creating the file on first use.
    fn open_writable(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            rusqlite::params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn init_table(conn: &Connection, table: &str) -> Result<(), StoreError> {
        conn.execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS {table} (
                title            TEXT NOT NULL,
                kicker           TEXT NOT NULL DEFAULT '',
                image_url        TEXT NOT NULL DEFAULT '',
                link             TEXT NOT NULL UNIQUE,
                title_word_count INTEGER NOT NULL,
                title_char_count INTEGER NOT NULL,
                capitalized_words TEXT NOT NULL DEFAULT '',
                persons          TEXT NOT NULL DEFAULT '',
                organizations    TEXT NOT NULL DEFAULT '',
                locations        TEXT NOT NULL DEFAULT '',
                loaded_at        TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_loaded_at ON {table}(loaded_at);
            "
        ))?;
        Ok(())
    }
}

impl Warehouse for SqliteWarehouse {
    fn dataset_exists(&self) -> Result<bool, StoreError> {
        Ok(self.db_path.exists())
    }

    fn create_dataset(&mut self) -> Result<(), StoreError> {
        let _conn = self.open_writable()?;
        info!("dataset ready at {}", self.db_path.display());
        Ok(())
    }

    fn table_meta(&self, table: &str) -> Result<Option<TableMeta>, StoreError> {
        let conn = match self.open_existing() {
            Ok(conn) => conn,
            Err(StoreError::DatasetMissing(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if !Self::table_exists(&conn, table)? {
            return Ok(None);
        }
        let row_count: u64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(Some(TableMeta { row_count }))
    }

    fn query_links(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.open_existing()?;
        let mut stmt = conn.prepare(&format!("SELECT link FROM {table}"))?;
        let links = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(links)
    }

    fn bulk_load(
        &mut self,
        table: &str,
        rows: &[EnrichedRecord],
        mode: LoadMode,
    ) -> Result<usize, StoreError> {
        let conn = self.open_writable()?;
        Self::init_table(&conn, table)?;

        let tx = conn.unchecked_transaction()?;
        if mode == LoadMode::Truncate {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {table}
                 (title, kicker, image_url, link, title_word_count, title_char_count,
                  capitalized_words, persons, organizations, locations)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ))?;
            for r in rows {
                written += stmt.execute(rusqlite::params![
                    r.article.title,
                    r.article.kicker,
                    r.article.image_url,
                    r.article.link,
                    r.title_word_count as i64,
                    r.title_char_count as i64,
                    r.capitalized_words,
                    r.persons,
                    r.organizations,
                    r.locations,
                ])?;
            }
        }
        tx.commit()?;

        debug!("bulk load ({mode:?}) wrote {written} rows into {table}");
        Ok(written)
    }
}

// ── Reporting queries ──

#[derive(Debug, Serialize)]
pub struct TableStats {
    pub row_count: u64,
    pub newest_load: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoredRow {
    pub title: String,
    pub kicker: String,
    pub link: String,
    pub title_word_count: i64,
    pub persons: String,
    pub organizations: String,
    pub locations: String,
    pub loaded_at: String,
}

impl SqliteWarehouse {
    pub fn stats(&self, table: &str) -> Result<Option<TableStats>, StoreError> {
        let conn = match self.open_existing() {
            Ok(conn) => conn,
            Err(StoreError::DatasetMissing(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if !Self::table_exists(&conn, table)? {
            return Ok(None);
        }
        let (row_count, newest_load) = conn.query_row(
            &format!("SELECT COUNT(*), MAX(loaded_at) FROM {table}"),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(Some(TableStats {
            row_count,
            newest_load,
        }))
    }

    pub fn fetch_overview(&self, table: &str, limit: usize) -> Result<Vec<StoredRow>, StoreError> {
        let conn = match self.open_existing() {
            Ok(conn) => conn,
            Err(StoreError::DatasetMissing(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        if !Self::table_exists(&conn, table)? {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT title, kicker, link, title_word_count, persons, organizations,
                    locations, loaded_at
             FROM {table}
             ORDER BY loaded_at DESC, rowid DESC
             LIMIT {limit}"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredRow {
                    title: row.get(0)?,
                    kicker: row.get(1)?,
                    link: row.get(2)?,
                    title_word_count: row.get(3)?,
                    persons: row.get(4)?,
                    organizations: row.get(5)?,
                    locations: row.get(6)?,
                    loaded_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ── Tests ──
