//! SQLite-backed vector index using the sqlite-vec extension.
//!
//! Layout per logical table `T`:
//!
//! ```text
//! T       (id TEXT PRIMARY KEY, source TEXT, chunk_index INTEGER,
//!          start_offset INTEGER, content TEXT)
//! T_vec   vec0 virtual table (embedding float[D]), rowid-joined to T
//! ```
//!
//! The dimensionality `D` is fixed when the table is first written and
//! recovered from the virtual table's schema on reopen; any write or search
//! with a different dimensionality is rejected. Rows are append-only: a new
//! upsert never replaces or deduplicates earlier entries.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};
use uuid::Uuid;

use crate::chunking::Chunk;
use crate::types::RagError;

/// Handle to one logical chunk table inside a SQLite database.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Connection,
    table: String,
    dimensions: Option<usize>,
}

impl SqliteVectorIndex {
    /// Opens the database, creating parent directories and the file as
    /// needed. The chunk table itself is created lazily by the first
    /// [`upsert`](Self::upsert).
    pub async fn create_or_open(path: impl AsRef<Path>, table: &str) -> Result<Self, RagError> {
        validate_table_name(table)?;
        register_sqlite_vec()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = Connection::open(path.to_path_buf())
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        verify_vec_extension(&conn).await?;
        let dimensions = table_dimensions(&conn, table).await?;

        Ok(Self {
            conn,
            table: table.to_string(),
            dimensions,
        })
    }

    /// Reopens a previously written table without re-embedding anything.
    ///
    /// Returns `Ok(None)` when there is nothing to reopen: the database file
    /// does not exist, the table was never created, or it holds zero rows.
    /// An empty table carries no retrievable content, so for the caller's
    /// state machine it is the same as no table at all.
    pub async fn open_existing(
        path: impl AsRef<Path>,
        table: &str,
    ) -> Result<Option<Self>, RagError> {
        validate_table_name(table)?;
        let path: PathBuf = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(None);
        }

        register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        verify_vec_extension(&conn).await?;

        if !table_exists(&conn, table).await? {
            return Ok(None);
        }
        let dimensions = table_dimensions(&conn, table).await?;
        if dimensions.is_none() {
            return Err(RagError::Storage(format!(
                "table '{table}' exists but its embedding table is missing"
            )));
        }

        let index = Self {
            conn,
            table: table.to_string(),
            dimensions,
        };
        if index.count().await? == 0 {
            return Ok(None);
        }
        Ok(Some(index))
    }

    /// Dimensionality of stored vectors, once known.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Appends chunk rows and their vectors in one transaction.
    ///
    /// Creates the backing tables on first use, sizing the vector column
    /// from the first vector. All-or-nothing: a failure mid-batch rolls the
    /// whole call back. Fails with [`RagError::Schema`] when any vector's
    /// dimensionality disagrees with the table.
    pub async fn upsert(&mut self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), RagError> {
        if chunks.len() != vectors.len() {
            return Err(RagError::Storage(format!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let dimensions = first.len();
        for vector in vectors {
            if vector.len() != dimensions {
                return Err(RagError::Schema {
                    expected: dimensions,
                    actual: vector.len(),
                });
            }
        }
        if let Some(existing) = self.dimensions {
            if existing != dimensions {
                return Err(RagError::Schema {
                    expected: existing,
                    actual: dimensions,
                });
            }
        }

        let mut rows = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let embedding_json = serde_json::to_string(vector)
                .map_err(|err| RagError::Storage(err.to_string()))?;
            rows.push((
                Uuid::new_v4().to_string(),
                chunk.source.clone(),
                chunk.chunk_index as i64,
                chunk.start_offset as i64,
                chunk.content.clone(),
                embedding_json,
            ));
        }

        let table = self.table.clone();
        self.conn
            .call::<_, _, tokio_rusqlite::rusqlite::Error>(move |conn| {
                conn.execute(
                    &format!(
                        "CREATE TABLE IF NOT EXISTS {table} (
                            id TEXT PRIMARY KEY,
                            source TEXT,
                            chunk_index INTEGER,
                            start_offset INTEGER,
                            content TEXT
                        )"
                    ),
                    [],
                )
                ?;
                conn.execute(
                    &format!("CREATE INDEX IF NOT EXISTS idx_{table}_source ON {table}(source)"),
                    [],
                )
                ?;
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE IF NOT EXISTS {table}_vec \
                         USING vec0(embedding float[{dimensions}])"
                    ),
                    [],
                )
                ?;

                let tx = conn.transaction()?;
                for (id, source, chunk_index, start_offset, content, embedding_json) in rows {
                    tx.execute(
                        &format!(
                            "INSERT INTO {table} (id, source, chunk_index, start_offset, content) \
                             VALUES (?1, ?2, ?3, ?4, ?5)"
                        ),
                        (&id, &source, chunk_index, start_offset, &content),
                    )
                    ?;
                    let rowid = tx.last_insert_rowid();
                    tx.execute(
                        &format!("INSERT INTO {table}_vec (rowid, embedding) VALUES (?1, ?2)"),
                        (rowid, &embedding_json),
                    )
                    ?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        self.dimensions = Some(dimensions);
        tracing::debug!(table = %self.table, rows = chunks.len(), "appended chunk vectors");
        Ok(())
    }

    /// Returns up to `k` nearest chunks by L2 distance, ascending.
    ///
    /// Fewer than `k` rows returns everything; zero rows is
    /// [`RagError::EmptyIndex`]; a query vector of the wrong dimensionality
    /// is [`RagError::Schema`].
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>, RagError> {
        let Some(dimensions) = self.dimensions else {
            return Err(RagError::EmptyIndex);
        };
        if query.len() != dimensions {
            return Err(RagError::Schema {
                expected: dimensions,
                actual: query.len(),
            });
        }
        if self.count().await? == 0 {
            return Err(RagError::EmptyIndex);
        }

        let query_json =
            serde_json::to_string(query).map_err(|err| RagError::Storage(err.to_string()))?;
        let table = self.table.clone();
        self.conn
            .call::<_, _, tokio_rusqlite::rusqlite::Error>(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT c.source, c.chunk_index, c.start_offset, c.content, \
                                vec_distance_L2(v.embedding, vec_f32(?1)) AS distance \
                         FROM {table} c \
                         JOIN {table}_vec v ON v.rowid = c.rowid \
                         ORDER BY distance ASC \
                         LIMIT {k}"
                    ))
                    ?;
                let rows = stmt
                    .query_map([&query_json], |row| {
                        let chunk = Chunk {
                            source: row.get(0)?,
                            chunk_index: row.get::<_, i64>(1)? as usize,
                            start_offset: row.get::<_, i64>(2)? as usize,
                            content: row.get(3)?,
                        };
                        let distance: f32 = row.get(4)?;
                        Ok((chunk, distance))
                    })
                    ?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Number of chunk rows in the table. Zero when the table is missing.
    pub async fn count(&self) -> Result<usize, RagError> {
        if !table_exists(&self.conn, &self.table).await? {
            return Ok(0);
        }
        let table = self.table.clone();
        self.conn
            .call::<_, _, tokio_rusqlite::rusqlite::Error>(move |conn| {
                let count: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })
                    ?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}

fn validate_table_name(table: &str) -> Result<(), RagError> {
    let mut chars = table.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(RagError::Config(format!(
            "table name '{table}' must be a plain identifier"
        )))
    }
}

/// Registers the sqlite-vec extension for every subsequent connection.
/// Process-wide, runs once.
fn register_sqlite_vec() -> Result<(), RagError> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

    let result = REGISTERED.get_or_init(|| unsafe {
        type SqliteExtensionInit = unsafe extern "C" fn(
            *mut ffi::sqlite3,
            *mut *mut c_char,
            *const ffi::sqlite3_api_routines,
        ) -> i32;

        let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
        let init_fn: SqliteExtensionInit =
            transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
        let rc = ffi::sqlite3_auto_extension(Some(init_fn));
        if rc != ffi::SQLITE_OK {
            Err(format!("failed to register sqlite-vec extension (code {rc})"))
        } else {
            Ok(())
        }
    });
    result.clone().map_err(RagError::Storage)
}

async fn verify_vec_extension(conn: &Connection) -> Result<(), RagError> {
    conn.call(|conn| {
        let result = conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0));
        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        }
    })
    .await
    .map_err(|err| RagError::Storage(format!("sqlite-vec extension unavailable: {err}")))
}

async fn table_exists(conn: &Connection, table: &str) -> Result<bool, RagError> {
    let table = table.to_string();
    conn.call::<_, _, tokio_rusqlite::rusqlite::Error>(move |conn| {
        let found = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [&table],
                |_| Ok(()),
            )
            .optional()
            ?;
        Ok(found.is_some())
    })
    .await
    .map_err(|err| RagError::Storage(err.to_string()))
}

/// Reads the stored vector dimensionality from the embedding table's schema.
async fn table_dimensions(conn: &Connection, table: &str) -> Result<Option<usize>, RagError> {
    static DIMENSION_PATTERN: OnceLock<Regex> = OnceLock::new();

    let vec_table = format!("{table}_vec");
    let sql: Option<String> = conn
        .call::<_, _, tokio_rusqlite::rusqlite::Error>(move |conn| {
            let sql = conn
                .query_row(
                    "SELECT sql FROM sqlite_master WHERE name = ?1",
                    [&vec_table],
                    |row| row.get(0),
                )
                .optional()
                ?;
            Ok(sql)
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

    let Some(sql) = sql else {
        return Ok(None);
    };
    let pattern = DIMENSION_PATTERN
        .get_or_init(|| Regex::new(r"float\[(\d+)\]").expect("dimension pattern is valid"));
    let dimensions = pattern
        .captures(&sql)
        .and_then(|captures| captures.get(1))
        .and_then(|group| group.as_str().parse::<usize>().ok())
        .ok_or_else(|| {
            RagError::Storage(format!("cannot read vector dimensionality from '{sql}'"))
        })?;
    Ok(Some(dimensions))
}
