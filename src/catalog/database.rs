//! SQLite-backed catalog.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{CatalogError, CatalogSink, FileRecord, FileStatus};
use crate::classify::ClassificationResult;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id               INTEGER PRIMARY KEY,
    original_path    TEXT NOT NULL UNIQUE,
    original_name    TEXT NOT NULL,
    new_name         TEXT,
    suggested_name   TEXT,
    category         TEXT,
    classification   TEXT,
    quick_hash       TEXT,
    content_hash     TEXT,
    status           TEXT NOT NULL DEFAULT 'pending',
    first_seen       TEXT NOT NULL,
    last_modified    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_content_hash ON files(content_hash);
CREATE INDEX IF NOT EXISTS idx_files_quick_hash ON files(quick_hash);
CREATE INDEX IF NOT EXISTS idx_files_status ON files(status);
CREATE INDEX IF NOT EXISTS idx_files_original_name ON files(original_name);

CREATE TABLE IF NOT EXISTS tags (
    id       INTEGER PRIMARY KEY,
    name     TEXT NOT NULL UNIQUE,
    category TEXT
);

CREATE TABLE IF NOT EXISTS file_tags (
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    tag_id  INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (file_id, tag_id)
);
CREATE INDEX IF NOT EXISTS idx_file_tags_tag_id ON file_tags(tag_id);
";

/// A file row read back from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: i64,
    pub original_path: String,
    pub original_name: String,
    pub new_name: Option<String>,
    pub suggested_name: Option<String>,
    pub category: Option<String>,
    pub quick_fingerprint: Option<String>,
    pub full_fingerprint: Option<String>,
    pub status: FileStatus,
    /// Tag names in lexical order
    pub tags: Vec<String>,
    pub first_seen: String,
    pub last_modified: String,
}

/// Catalog stored in a SQLite database file.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog").finish_non_exhaustive()
    }
}

impl SqliteCatalog {
    /// Open or create the catalog at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the directory or database cannot be
    /// created or migrated.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let catalog = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        catalog.initialize()?;
        log::debug!("Opened catalog at {}", path.display());
        Ok(catalog)
    }

    /// Open a throwaway in-memory catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let catalog = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        catalog.initialize()?;
        Ok(catalog)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::Poisoned)
    }

    fn initialize(&self) -> Result<(), CatalogError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            log::warn!(
                "Catalog schema version {} is newer than supported version {}",
                version,
                SCHEMA_VERSION
            );
        }
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        log::trace!("Catalog schema initialized (version {})", SCHEMA_VERSION);
        Ok(())
    }

    /// Number of files in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on query failure.
    pub fn count(&self) -> Result<usize, CatalogError> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Look up a file by its original path.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on query failure.
    pub fn get(&self, original_path: &Path) -> Result<Option<StoredFile>, CatalogError> {
        let conn = self.connection()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM files WHERE original_path = ?1",
                params![path_text(original_path)],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => load_file(&conn, id).map(Some),
            None => Ok(None),
        }
    }

    /// All files whose full-content fingerprint equals `hex`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on query failure.
    pub fn find_by_full_fingerprint(&self, hex: &str) -> Result<Vec<StoredFile>, CatalogError> {
        let conn = self.connection()?;
        let ids: Vec<i64> = {
            let mut stmt = conn.prepare("SELECT id FROM files WHERE content_hash = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![hex], |row| row.get(0))?;
            let ids = rows.collect::<Result<Vec<i64>, _>>()?;
            ids
        };
        ids.into_iter().map(|id| load_file(&conn, id)).collect()
    }

    /// Stored classification for `original_path`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on query or decode failure.
    pub fn classification(
        &self,
        original_path: &Path,
    ) -> Result<Option<ClassificationResult>, CatalogError> {
        let conn = self.connection()?;
        let json: Option<Option<String>> = conn
            .query_row(
                "SELECT classification FROM files WHERE original_path = ?1",
                params![path_text(original_path)],
                |row| row.get(0),
            )
            .optional()?;
        match json.flatten() {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }
}

impl CatalogSink for SqliteCatalog {
    fn record(&self, record: &FileRecord) -> Result<i64, CatalogError> {
        let classification = record
            .classification
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let category = record.classification.as_ref().map(|c| c.category.clone());
        let now = chrono::Utc::now().to_rfc3339();

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO files (original_path, original_name, new_name, suggested_name, category, \
             classification, quick_hash, content_hash, status, first_seen, last_modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10) \
             ON CONFLICT(original_path) DO UPDATE SET \
             original_name = excluded.original_name, new_name = excluded.new_name, \
             suggested_name = excluded.suggested_name, category = excluded.category, \
             classification = excluded.classification, quick_hash = excluded.quick_hash, \
             content_hash = excluded.content_hash, status = excluded.status, \
             last_modified = excluded.last_modified",
            params![
                path_text(&record.original_path),
                record.original_name,
                record.new_name,
                record.suggested_name,
                category,
                classification,
                record.quick_fingerprint,
                record.full_fingerprint,
                record.status.as_str(),
                now,
            ],
        )?;
        let file_id: i64 = tx.query_row(
            "SELECT id FROM files WHERE original_path = ?1",
            params![path_text(&record.original_path)],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM file_tags WHERE file_id = ?1", params![file_id])?;
        if let Some(result) = &record.classification {
            for tag in &result.tags {
                let kind = if result.creator.as_deref() == Some(tag.as_str()) {
                    Some("creator")
                } else {
                    None
                };
                tx.execute(
                    "INSERT INTO tags (name, category) VALUES (?1, ?2) \
                     ON CONFLICT(name) DO UPDATE SET category = COALESCE(tags.category, excluded.category)",
                    params![tag, kind],
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO file_tags (file_id, tag_id) \
                     SELECT ?1, id FROM tags WHERE name = ?2",
                    params![file_id, tag],
                )?;
            }
        }
        tx.commit()?;

        log::debug!(
            "Catalogued {} ({})",
            record.original_path.display(),
            record.status
        );
        Ok(file_id)
    }

    fn update_status(
        &self,
        original_path: &Path,
        new_name: Option<&str>,
        status: FileStatus,
    ) -> Result<bool, CatalogError> {
        let conn = self.connection()?;
        let changed = conn.execute(
            "UPDATE files SET new_name = ?1, status = ?2, last_modified = ?3 \
             WHERE original_path = ?4",
            params![
                new_name,
                status.as_str(),
                chrono::Utc::now().to_rfc3339(),
                path_text(original_path)
            ],
        )?;
        Ok(changed > 0)
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn load_file(conn: &Connection, id: i64) -> Result<StoredFile, CatalogError> {
    let (mut file, status) = conn.query_row(
        "SELECT id, original_path, original_name, new_name, suggested_name, category, \
         quick_hash, content_hash, status, first_seen, last_modified FROM files WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                StoredFile {
                    id: row.get(0)?,
                    original_path: row.get(1)?,
                    original_name: row.get(2)?,
                    new_name: row.get(3)?,
                    suggested_name: row.get(4)?,
                    category: row.get(5)?,
                    quick_fingerprint: row.get(6)?,
                    full_fingerprint: row.get(7)?,
                    status: FileStatus::Pending,
                    tags: Vec::new(),
                    first_seen: row.get(9)?,
                    last_modified: row.get(10)?,
                },
                row.get::<_, String>(8)?,
            ))
        },
    )?;
    file.status = status.parse()?;

    let mut stmt = conn.prepare(
        "SELECT t.name FROM tags t JOIN file_tags ft ON ft.tag_id = t.id \
         WHERE ft.file_id = ?1 ORDER BY t.name",
    )?;
    let rows = stmt.query_map(params![id], |row| row.get(0))?;
    file.tags = rows.collect::<Result<_, _>>()?;
    Ok(file)
}
