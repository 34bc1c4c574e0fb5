//! Progress reconciliation between KOReader and Hardcover.
//!
//! One reconciliation takes a [`LocalReadingState`], reads a fresh
//! [`RemoteEntitySnapshot`], and either skips (the remote is already within
//! drift tolerance) or executes a [`MutationPlan`] in order.

mod drift;
mod engine;
mod plan;
mod service;

#[cfg(test)]
pub(crate) mod fake;

pub use drift::should_skip;
pub use engine::{Reconciliation, SyncEngine};
pub use plan::{Mutation, MutationKind, MutationPlan};
pub use service::{BookOutcome, OutcomeStatus, SyncService};

use crate::hardcover::{RemoteReadRecord, RemoteUserBook, STATUS_FINISHED, STATUS_READING};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum fraction of pages read for a book to count as finished.
pub const FINISHED_FRACTION: f64 = 0.98;
/// A book with at most this many unread pages counts as finished.
pub const FINISHED_REMAINING_PAGES: i64 = 15;

/// Local reading status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    /// Still reading.
    Reading,
    /// Finished.
    Finished,
}

impl ReadingStatus {
    /// Hardcover status id for this status.
    pub fn status_id(self) -> i64 {
        match self {
            ReadingStatus::Reading => STATUS_READING,
            ReadingStatus::Finished => STATUS_FINISHED,
        }
    }

    /// Classify from page counts: finished once nearly every page is read.
    pub fn classify(read_pages: i64, total_pages: i64) -> Self {
        if total_pages > 0
            && (read_pages as f64 / total_pages as f64 >= FINISHED_FRACTION
                || total_pages - read_pages <= FINISHED_REMAINING_PAGES)
        {
            ReadingStatus::Finished
        } else {
            ReadingStatus::Reading
        }
    }

    /// Parse the stored form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reading" => Some(ReadingStatus::Reading),
            "finished" => Some(ReadingStatus::Finished),
            _ => None,
        }
    }

    /// Stored form.
    pub fn as_str(self) -> &'static str {
        match self {
            ReadingStatus::Reading => "reading",
            ReadingStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reading state of one mapped book as observed on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalReadingState {
    /// Hardcover book ID.
    pub remote_book_id: i64,
    /// Hardcover edition ID, if mapped to a specific edition.
    pub remote_edition_id: Option<i64>,
    /// Percentage complete (0-100).
    pub percentage_complete: f64,
    /// Reading status.
    pub status: ReadingStatus,
    /// Total time spent reading, in seconds.
    pub elapsed_seconds: i64,
    /// Date the book was last opened.
    pub last_read_date: Option<NaiveDate>,
    /// Date of the first reading session.
    pub start_date: Option<NaiveDate>,
}

impl LocalReadingState {
    /// Page to report given the remote page count.
    ///
    /// Truncates; an unknown or non-positive page count yields page 0.
    pub fn target_page(&self, total_pages: Option<i64>) -> i64 {
        match total_pages {
            Some(total) if total > 0 => (total as f64 * self.percentage_complete / 100.0) as i64,
            _ => 0,
        }
    }

    /// Start date as the remote stores it.
    pub fn started_at(&self) -> Option<String> {
        self.start_date.map(format_date)
    }

    /// Finish date as the remote should store it. Only finished books have one.
    pub fn finished_at(&self) -> Option<String> {
        match self.status {
            ReadingStatus::Finished => self.last_read_date.map(format_date),
            ReadingStatus::Reading => None,
        }
    }
}

/// Remote state of a book, read fresh at the start of each reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteEntitySnapshot {
    /// Page count of the edition, or of the book when the edition has none.
    pub total_pages: Option<i64>,
    /// Shelf entry, absent if the book was never added.
    pub user_book: Option<RemoteUserBook>,
}

impl RemoteEntitySnapshot {
    /// Latest read record of the shelf entry.
    pub fn latest_read(&self) -> Option<&RemoteReadRecord> {
        self.user_book.as_ref().and_then(|ub| ub.latest_read.as_ref())
    }

    /// Whether a positive page count was resolved.
    pub fn has_page_count(&self) -> bool {
        self.total_pages.is_some_and(|p| p > 0)
    }
}

/// Percentage of pages read; zero when the page count is unknown.
pub fn percentage(read_pages: i64, total_pages: i64) -> f64 {
    if total_pages <= 0 {
        return 0.0;
    }
    read_pages as f64 / total_pages as f64 * 100.0
}

/// Calendar date in the remote's `date` format.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
