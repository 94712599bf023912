//! Persistence collaborator: the repository contract and its SQLite implementation

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::models::{MediaId, MediaKind, MediaRecord, Thumbnail};

/// Durable CRUD store for media records.
///
/// The catalog only mirrors what is stored here; callers persist first and
/// then apply the change to the catalog.
pub trait MediaRepository: Send + Sync {
    /// All stored records, in insertion order
    fn fetch_all(&self) -> Result<Vec<MediaRecord>, StoreError>;

    /// Store a new record and return its canonical stored form
    fn insert(&self, record: &MediaRecord) -> Result<MediaRecord, StoreError>;

    /// Replace a stored record and return its canonical stored form
    fn update(&self, record: &MediaRecord) -> Result<MediaRecord, StoreError>;

    /// Remove a record. Returns false if it was not stored.
    fn delete(&self, record: &MediaRecord) -> Result<bool, StoreError>;
}

const SELECT_COLUMNS: &str = "id, name, kind, file_path, original_file_path, file_size, mime_type,
     thumbnail_path, thumbnail_width, thumbnail_height, creation_date, modification_date,
     where_from, is_favorite";

/// SQLite-backed media repository
pub struct MediaDatabase {
    conn: Mutex<Connection>,
}

impl MediaDatabase {
    /// Open or create database
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS media (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                file_path BLOB NOT NULL,
                original_file_path BLOB NOT NULL,
                file_size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                thumbnail_path BLOB NOT NULL,
                thumbnail_width INTEGER NOT NULL,
                thumbnail_height INTEGER NOT NULL,
                creation_date TEXT NOT NULL,
                modification_date TEXT,
                where_from TEXT,
                is_favorite INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_media_creation_date ON media(creation_date);
            CREATE INDEX IF NOT EXISTS idx_media_is_favorite ON media(is_favorite);
            ",
        )?;
        Ok(())
    }

    fn get_with(conn: &Connection, id: &MediaId) -> Result<Option<MediaRecord>, StoreError> {
        let sql = format!("SELECT {} FROM media WHERE id = ?1", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, [id.to_string()], StoredRow::from_row)
            .optional()?;
        row.map(StoredRow::into_record).transpose()
    }
}

impl MediaRepository for MediaDatabase {
    fn fetch_all(&self) -> Result<Vec<MediaRecord>, StoreError> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM media ORDER BY seq", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], StoredRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn insert(&self, record: &MediaRecord) -> Result<MediaRecord, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO media
             (id, name, kind, file_path, original_file_path, file_size, mime_type,
              thumbnail_path, thumbnail_width, thumbnail_height, creation_date,
              modification_date, where_from, is_favorite)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.id.to_string(),
                record.name,
                record.kind.as_str(),
                path_to_sql(&record.file_path),
                path_to_sql(&record.original_file_path),
                record.file_size as i64,
                record.mime_type,
                path_to_sql(&record.thumbnail.file_path),
                record.thumbnail.width,
                record.thumbnail.height,
                date_to_sql(&record.creation_date),
                record.modification_date.as_ref().map(date_to_sql),
                record.where_from,
                record.is_favorite,
            ],
        )?;
        Self::get_with(&conn, &record.id)?.ok_or(StoreError::NotFound(record.id))
    }

    fn update(&self, record: &MediaRecord) -> Result<MediaRecord, StoreError> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE media SET
                name = ?2, kind = ?3, file_path = ?4, original_file_path = ?5, file_size = ?6,
                mime_type = ?7, thumbnail_path = ?8, thumbnail_width = ?9, thumbnail_height = ?10,
                creation_date = ?11, modification_date = ?12, where_from = ?13, is_favorite = ?14
             WHERE id = ?1",
            params![
                record.id.to_string(),
                record.name,
                record.kind.as_str(),
                path_to_sql(&record.file_path),
                path_to_sql(&record.original_file_path),
                record.file_size as i64,
                record.mime_type,
                path_to_sql(&record.thumbnail.file_path),
                record.thumbnail.width,
                record.thumbnail.height,
                date_to_sql(&record.creation_date),
                record.modification_date.as_ref().map(date_to_sql),
                record.where_from,
                record.is_favorite,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(record.id));
        }
        Self::get_with(&conn, &record.id)?.ok_or(StoreError::NotFound(record.id))
    }

    fn delete(&self, record: &MediaRecord) -> Result<bool, StoreError> {
        let changed = self
            .conn()
            .execute("DELETE FROM media WHERE id = ?1", [record.id.to_string()])?;
        Ok(changed > 0)
    }
}

impl std::fmt::Debug for MediaDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDatabase").finish_non_exhaustive()
    }
}

/// Raw column values, converted into a record outside the rusqlite row closure
struct StoredRow {
    id: String,
    name: String,
    kind: String,
    file_path: Vec<u8>,
    original_file_path: Vec<u8>,
    file_size: i64,
    mime_type: String,
    thumbnail_path: Vec<u8>,
    thumbnail_width: u32,
    thumbnail_height: u32,
    creation_date: String,
    modification_date: Option<String>,
    where_from: Option<String>,
    is_favorite: bool,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            file_path: path_column(row, 3)?,
            original_file_path: path_column(row, 4)?,
            file_size: row.get(5)?,
            mime_type: row.get(6)?,
            thumbnail_path: path_column(row, 7)?,
            thumbnail_width: row.get(8)?,
            thumbnail_height: row.get(9)?,
            creation_date: row.get(10)?,
            modification_date: row.get(11)?,
            where_from: row.get(12)?,
            is_favorite: row.get(13)?,
        })
    }

    fn into_record(self) -> Result<MediaRecord, StoreError> {
        let id = self.id.parse::<MediaId>().map_err(|_| StoreError::Corrupt {
            column: "id",
            value: self.id.clone(),
        })?;
        let kind = MediaKind::parse(&self.kind).ok_or_else(|| StoreError::Corrupt {
            column: "kind",
            value: self.kind.clone(),
        })?;
        let modification_date = self
            .modification_date
            .as_deref()
            .map(|value| date_from_sql("modification_date", value))
            .transpose()?;

        Ok(MediaRecord {
            id,
            name: self.name,
            kind,
            file_path: path_from_sql(self.file_path),
            original_file_path: path_from_sql(self.original_file_path),
            file_size: self.file_size as u64,
            mime_type: self.mime_type,
            thumbnail: Thumbnail {
                file_path: path_from_sql(self.thumbnail_path),
                width: self.thumbnail_width,
                height: self.thumbnail_height,
            },
            creation_date: date_from_sql("creation_date", &self.creation_date)?,
            modification_date,
            where_from: self.where_from,
            is_favorite: self.is_favorite,
        })
    }
}

// Paths are stored as raw OS bytes so names that are not valid UTF-8 survive a round trip.
#[cfg(unix)]
fn path_to_sql(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_sql(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

// TODO: store WTF-16 units on Windows; lossy UTF-8 until then.
#[cfg(not(unix))]
fn path_to_sql(path: &Path) -> Vec<u8> {
    path.to_string_lossy().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_from_sql(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Path column as bytes, whether SQLite holds it as a blob or as text
fn path_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Vec<u8>> {
    match row.get_ref(index)? {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Ok(bytes.to_vec()),
        other => Err(rusqlite::Error::InvalidColumnType(
            index,
            "path".to_string(),
            other.data_type(),
        )),
    }
}

// Nanosecond precision keeps stored dates field-for-field equal on read-back.
fn date_to_sql(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn date_from_sql(column: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            column,
            value: value.to_string(),
        })
}
