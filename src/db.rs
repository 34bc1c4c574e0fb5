mod schema;

pub use schema::Database;

use crate::sync::{LocalReadingState, ReadingStatus, percentage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Book imported from KOReader, as listed for mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSummary {
    /// MD5 of the book file (KOReader's identity).
    pub id: String,
    /// Book title.
    pub title: String,
    /// Authors as KOReader stores them.
    pub authors: Option<String>,
    /// Last time the book was opened.
    pub last_open: Option<i64>,
    /// Locally classified status.
    pub status: String,
    /// Sync status: "pending", "synced" or "failed".
    pub sync_status: String,
    /// Whether the book is mapped to Hardcover.
    pub mapped: bool,
}

/// Mapping from a local book to Hardcover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMapping {
    /// Local book ID (MD5).
    pub local_book_id: String,
    /// Hardcover book ID.
    pub remote_book_id: i64,
    /// Hardcover edition ID.
    pub remote_edition_id: Option<i64>,
    /// Title recorded when mapping.
    pub book_title: Option<String>,
    /// Author recorded when mapping.
    pub author: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Mapped book with everything needed to build its reading state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedBook {
    /// Local book ID (MD5).
    pub id: String,
    /// Book title.
    pub title: String,
    /// Authors.
    pub authors: Option<String>,
    /// Page count on the device.
    pub total_pages: i64,
    /// Pages read according to KOReader.
    pub read_pages: i64,
    /// Total reading time in seconds.
    pub read_time: i64,
    /// Last open timestamp.
    pub last_open: Option<i64>,
    /// Hardcover book ID.
    pub remote_book_id: i64,
    /// Hardcover edition ID.
    pub remote_edition_id: Option<i64>,
    /// Start of the first reading session.
    pub first_session: Option<i64>,
}

impl TrackedBook {
    /// Reading state to reconcile against Hardcover.
    ///
    /// Progress is the count of distinct pages read over the page count, the
    /// same rule the import uses for the stored status.
    pub fn reading_state(&self) -> LocalReadingState {
        LocalReadingState {
            remote_book_id: self.remote_book_id,
            remote_edition_id: self.remote_edition_id,
            percentage_complete: percentage(self.read_pages, self.total_pages),
            status: ReadingStatus::classify(self.read_pages, self.total_pages),
            elapsed_seconds: self.read_time,
            last_read_date: self.last_open.map(timestamp_to_date),
            start_date: self.first_session.map(timestamp_to_date),
        }
    }
}

/// Rows touched by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Books inserted or refreshed.
    pub books: usize,
    /// New reading sessions.
    pub sessions: usize,
}

/// Table sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    /// Imported books.
    pub books: usize,
    /// Imported reading sessions.
    pub sessions: usize,
    /// Books mapped to Hardcover.
    pub mapped: usize,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

/// Calendar date (UTC) of a timestamp.
pub fn timestamp_to_date(ts: i64) -> NaiveDate {
    timestamp_to_datetime(ts).date_naive()
}
