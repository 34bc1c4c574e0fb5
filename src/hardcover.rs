//! Hardcover remote entities and the GraphQL client.
//!
//! [`RemoteApi`] is the seam between the reconciliation engine and the
//! network: [`HardcoverClient`] talks to the real endpoint, tests drive the
//! engine with an in-memory fake.

mod client;
mod queries;

pub use client::HardcoverClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Hardcover status id for "currently reading".
pub const STATUS_READING: i64 = 2;
/// Hardcover status id for "read".
pub const STATUS_FINISHED: i64 = 3;

/// Errors surfaced by the remote API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connectivity failure, timeout or transient server error.
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or rejected credential.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The API rejected the request.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl RemoteError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }
}

/// Result type alias for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Most recent read record of a user-book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteReadRecord {
    /// Read record ID.
    pub id: i64,
    /// Pages read.
    pub progress_pages: Option<i64>,
    /// Seconds spent reading.
    pub progress_seconds: Option<i64>,
    /// Start date (`YYYY-MM-DD`).
    pub started_at: Option<String>,
    /// Finish date (`YYYY-MM-DD`).
    pub finished_at: Option<String>,
}

/// A book on the account's shelf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteUserBook {
    /// User-book ID.
    pub id: i64,
    /// Shelf status id.
    pub status_id: i64,
    /// Edition the user is tracking, if any.
    pub edition_id: Option<i64>,
    /// Latest read record, if any.
    pub latest_read: Option<RemoteReadRecord>,
}

/// Fields written to a read record.
///
/// Serializes to the variables of the read-record mutation. `None` fields are
/// left out entirely so the remote value is not touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// Pages read.
    #[serde(rename = "pages", skip_serializing_if = "Option::is_none")]
    pub progress_pages: Option<i64>,
    /// Seconds spent reading.
    #[serde(rename = "seconds")]
    pub progress_seconds: i64,
    /// Start date (`YYYY-MM-DD`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// Finish date (`YYYY-MM-DD`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

/// One operation per remote capability used by the sync engine.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Page count of an edition. `Ok(None)` when the edition has no count.
    async fn edition_pages(&self, edition_id: i64) -> RemoteResult<Option<i64>>;

    /// Page count of a canonical book. `Ok(None)` when the book has no count.
    async fn book_pages(&self, book_id: i64) -> RemoteResult<Option<i64>>;

    /// The user's shelf entry for a book, with its latest read record.
    async fn user_book(&self, book_id: i64) -> RemoteResult<Option<RemoteUserBook>>;

    /// ID of the latest read record of a user-book.
    async fn latest_read_id(&self, user_book_id: i64) -> RemoteResult<Option<i64>>;

    /// Add a book to the shelf, returning the new user-book ID.
    async fn create_user_book(
        &self,
        book_id: i64,
        status_id: i64,
        edition_id: Option<i64>,
    ) -> RemoteResult<i64>;

    /// Start a new read record, returning its ID.
    async fn create_read_record(&self, user_book_id: i64) -> RemoteResult<i64>;

    /// Write progress and dates to a read record.
    async fn update_read_record(&self, read_id: i64, update: &ProgressUpdate) -> RemoteResult<()>;

    /// Change shelf status and edition.
    async fn update_user_book(
        &self,
        user_book_id: i64,
        status_id: i64,
        edition_id: Option<i64>,
    ) -> RemoteResult<()>;
}
