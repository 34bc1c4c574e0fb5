use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Books imported from KOReader, keyed by file MD5
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                koreader_id INTEGER,
                title TEXT NOT NULL,
                authors TEXT,
                series TEXT,
                language TEXT,
                total_pages INTEGER NOT NULL DEFAULT 0,
                total_read_pages INTEGER NOT NULL DEFAULT 0,
                total_read_time INTEGER NOT NULL DEFAULT 0,
                highlights INTEGER NOT NULL DEFAULT 0,
                notes INTEGER NOT NULL DEFAULT 0,
                last_open INTEGER,
                status TEXT NOT NULL DEFAULT 'reading',
                sync_status TEXT NOT NULL DEFAULT 'pending',
                sync_error TEXT,
                synced_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Reading sessions (one row per KOReader page stat)
            CREATE TABLE IF NOT EXISTS reading_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id TEXT NOT NULL,
                page INTEGER,
                start_time INTEGER NOT NULL,
                duration INTEGER,
                total_pages INTEGER,
                UNIQUE (book_id, start_time),
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Local book -> Hardcover mapping
            CREATE TABLE IF NOT EXISTS book_mappings (
                local_book_id TEXT PRIMARY KEY,
                remote_book_id INTEGER NOT NULL,
                remote_edition_id INTEGER,
                book_title TEXT,
                author TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (local_book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_last_open ON books(last_open);
            CREATE INDEX IF NOT EXISTS idx_sessions_book ON reading_sessions(book_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_start ON reading_sessions(start_time);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== IMPORT ==========

    /// Import books and reading sessions from a KOReader `statistics.sqlite3`.
    ///
    /// Books are upserted by MD5; sessions already present are skipped.
    pub fn import_statistics(&self, path: &Path) -> Result<ImportStats> {
        if !path.is_file() {
            return Err(AppError::NotFound(format!(
                "Statistics database not found: {}",
                path.display()
            )));
        }

        let mut conn = self.conn.lock();
        conn.execute(
            "ATTACH DATABASE ?1 AS koreader",
            params![path.to_string_lossy().to_string()],
        )
        .map_err(|e| {
            AppError::Internal(format!(
                "Failed to attach statistics database {}: {}",
                path.display(),
                e
            ))
        })?;

        let result = import_attached(&mut conn, now_timestamp());

        if let Err(e) = conn.execute_batch("DETACH DATABASE koreader") {
            tracing::warn!(error = %e, "Failed to detach statistics database");
        }

        let stats =
            result.map_err(|e| AppError::Internal(format!("Failed to import statistics: {}", e)))?;
        tracing::info!(books = stats.books, sessions = stats.sessions, "Imported KOReader statistics");
        Ok(stats)
    }

    // ========== BOOK OPERATIONS ==========

    /// List books, most recently opened first, optionally filtered by title
    /// or author. Returns the page and the total number of matches.
    pub fn list_books(
        &self,
        query: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<BookSummary>, usize)> {
        let conn = self.conn.lock();
        let pattern = query.map(|q| format!("%{}%", q.trim()));

        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM books
                 WHERE ?1 IS NULL OR title LIKE ?1 OR authors LIKE ?1",
                params![pattern],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to count books: {}", e)))?;

        let mut stmt = conn
            .prepare(
                "SELECT b.id, b.title, b.authors, b.last_open, b.status, b.sync_status,
                        m.local_book_id IS NOT NULL
                 FROM books b
                 LEFT JOIN book_mappings m ON m.local_book_id = b.id
                 WHERE ?1 IS NULL OR b.title LIKE ?1 OR b.authors LIKE ?1
                 ORDER BY b.last_open DESC NULLS LAST, b.title
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params![pattern, limit as i64, offset as i64], |row| {
                Ok(BookSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    authors: row.get(2)?,
                    last_open: row.get(3)?,
                    status: row.get(4)?,
                    sync_status: row.get(5)?,
                    mapped: row.get(6)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok((books, total as usize))
    }

    /// Get a book by ID.
    pub fn get_book(&self, id: &str) -> Result<Option<BookSummary>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT b.id, b.title, b.authors, b.last_open, b.status, b.sync_status,
                    m.local_book_id IS NOT NULL
             FROM books b
             LEFT JOIN book_mappings m ON m.local_book_id = b.id
             WHERE b.id = ?1",
            params![id],
            |row| {
                Ok(BookSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    authors: row.get(2)?,
                    last_open: row.get(3)?,
                    status: row.get(4)?,
                    sync_status: row.get(5)?,
                    mapped: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// Mapped books ordered by last open, newest first.
    pub fn recent_mapped_books(&self, limit: usize) -> Result<Vec<TrackedBook>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT b.id, b.title, b.authors, b.total_pages, b.total_read_pages,
                        b.total_read_time, b.last_open, m.remote_book_id, m.remote_edition_id,
                        (SELECT MIN(rs.start_time) FROM reading_sessions rs
                         WHERE rs.book_id = b.id)
                 FROM books b
                 JOIN book_mappings m ON m.local_book_id = b.id
                 ORDER BY b.last_open DESC NULLS LAST
                 LIMIT ?1",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params![limit as i64], |row| {
                Ok(TrackedBook {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    authors: row.get(2)?,
                    total_pages: row.get(3)?,
                    read_pages: row.get(4)?,
                    read_time: row.get(5)?,
                    last_open: row.get(6)?,
                    remote_book_id: row.get(7)?,
                    remote_edition_id: row.get(8)?,
                    first_session: row.get(9)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to list mapped books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect mapped books: {}", e)))?;

        Ok(books)
    }

    /// Mark a book as synced and clear its last error.
    pub fn mark_synced(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_timestamp();
        conn.execute(
            "UPDATE books SET sync_status = 'synced', sync_error = NULL,
                    synced_at = ?1, updated_at = ?1
             WHERE id = ?2",
            params![now, id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to mark book synced: {}", e)))?;
        Ok(())
    }

    /// Record a failed sync attempt.
    pub fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE books SET sync_status = 'failed', sync_error = ?1, updated_at = ?2
             WHERE id = ?3",
            params![error, now_timestamp(), id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to mark book failed: {}", e)))?;
        Ok(())
    }

    /// Sync status and last error of a book.
    pub fn sync_status(&self, id: &str) -> Result<Option<(String, Option<String>)>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT sync_status, sync_error FROM books WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get sync status: {}", e)))
    }

    /// Count books, sessions and mappings.
    pub fn counts(&self) -> Result<Counts> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT (SELECT COUNT(*) FROM books),
                    (SELECT COUNT(*) FROM reading_sessions),
                    (SELECT COUNT(*) FROM book_mappings)",
            [],
            |row| {
                Ok(Counts {
                    books: row.get::<_, i64>(0)? as usize,
                    sessions: row.get::<_, i64>(1)? as usize,
                    mapped: row.get::<_, i64>(2)? as usize,
                })
            },
        )
        .map_err(|e| AppError::Internal(format!("Failed to count rows: {}", e)))
    }

    // ========== MAPPING OPERATIONS ==========

    /// Save or replace the Hardcover mapping of a book.
    pub fn save_mapping(&self, mapping: &BookMapping) -> Result<()> {
        if mapping.remote_book_id <= 0 || mapping.remote_edition_id.is_some_and(|e| e <= 0) {
            return Err(AppError::InvalidInput(
                "Hardcover IDs must be positive".to_string(),
            ));
        }

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO book_mappings
                (local_book_id, remote_book_id, remote_edition_id, book_title, author,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(local_book_id) DO UPDATE SET
                remote_book_id = excluded.remote_book_id,
                remote_edition_id = excluded.remote_edition_id,
                book_title = excluded.book_title,
                author = excluded.author,
                updated_at = excluded.updated_at",
            params![
                mapping.local_book_id,
                mapping.remote_book_id,
                mapping.remote_edition_id,
                mapping.book_title,
                mapping.author,
                mapping.created_at,
                mapping.updated_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save mapping: {}", e)))?;
        Ok(())
    }

    /// Get the Hardcover mapping of a book.
    pub fn get_mapping(&self, local_book_id: &str) -> Result<Option<BookMapping>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT local_book_id, remote_book_id, remote_edition_id, book_title, author,
                    created_at, updated_at
             FROM book_mappings WHERE local_book_id = ?1",
            params![local_book_id],
            |row| {
                Ok(BookMapping {
                    local_book_id: row.get(0)?,
                    remote_book_id: row.get(1)?,
                    remote_edition_id: row.get(2)?,
                    book_title: row.get(3)?,
                    author: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get mapping: {}", e)))
    }

    /// Remove the mapping of a book.
    pub fn delete_mapping(&self, local_book_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM book_mappings WHERE local_book_id = ?1",
                params![local_book_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to delete mapping: {}", e)))?;
        Ok(rows > 0)
    }
}

/// Copy rows out of the attached `koreader` schema in one transaction.
fn import_attached(conn: &mut Connection, now: i64) -> rusqlite::Result<ImportStats> {
    let tx = conn.transaction()?;

    let books = tx.execute(
        "INSERT INTO books (
            id, koreader_id, title, authors, series, language,
            total_pages, total_read_pages, total_read_time, highlights, notes,
            last_open, status, created_at, updated_at
         )
         SELECT
            md5, id, COALESCE(title, ''), authors, series, language,
            COALESCE(pages, 0), COALESCE(total_read_pages, 0), COALESCE(total_read_time, 0),
            COALESCE(highlights, 0), COALESCE(notes, 0),
            last_open,
            CASE
                WHEN pages > 0 AND (
                    CAST(COALESCE(total_read_pages, 0) AS REAL) / pages >= 0.98 OR
                    pages - COALESCE(total_read_pages, 0) <= 15
                ) THEN 'finished'
                ELSE 'reading'
            END,
            ?1, ?1
         FROM koreader.book
         WHERE md5 IS NOT NULL AND md5 != ''
         ON CONFLICT(id) DO UPDATE SET
            koreader_id = excluded.koreader_id,
            title = excluded.title,
            authors = excluded.authors,
            series = excluded.series,
            language = excluded.language,
            total_pages = excluded.total_pages,
            total_read_pages = excluded.total_read_pages,
            total_read_time = excluded.total_read_time,
            highlights = excluded.highlights,
            notes = excluded.notes,
            last_open = excluded.last_open,
            status = excluded.status,
            updated_at = excluded.updated_at",
        params![now],
    )?;

    let sessions = tx.execute(
        "INSERT OR IGNORE INTO reading_sessions (book_id, page, start_time, duration, total_pages)
         SELECT b.md5, psd.page, psd.start_time, psd.duration, psd.total_pages
         FROM koreader.page_stat_data psd
         JOIN koreader.book b ON psd.id_book = b.id
         WHERE b.md5 IS NOT NULL AND b.md5 != ''",
        [],
    )?;

    tx.commit()?;
    Ok(ImportStats { books, sessions })
}
