//! GraphQL documents and their response shapes.

use super::{RemoteReadRecord, RemoteUserBook};
use serde::Deserialize;

pub(super) const EDITION_PAGES: &str = r#"
query GetEditionPages($id: Int!) {
  editions_by_pk(id: $id) { pages }
}"#;

pub(super) const BOOK_PAGES: &str = r#"
query GetBookPages($id: Int!) {
  books_by_pk(id: $id) { pages }
}"#;

pub(super) const USER_BOOK: &str = r#"
query GetUserBookInfo($book_id: Int!) {
  me {
    user_books(where: {book_id: {_eq: $book_id}}) {
      id
      status_id
      edition_id
      user_book_reads(order_by: {id: desc}, limit: 1) {
        id
        progress_pages
        progress_seconds
        started_at
        finished_at
      }
    }
  }
}"#;

pub(super) const LATEST_READ: &str = r#"
query GetLatestRead($id: Int!) {
  user_books_by_pk(id: $id) {
    user_book_reads(order_by: {id: desc}, limit: 1) { id }
  }
}"#;

pub(super) const CREATE_USER_BOOK: &str = r#"
mutation CreateUserBook($book_id: Int!, $status_id: Int!, $edition_id: Int) {
  insert_user_book(object: {book_id: $book_id, status_id: $status_id, edition_id: $edition_id}) {
    id
    error
  }
}"#;

pub(super) const CREATE_READ_RECORD: &str = r#"
mutation CreateUserBookRead($user_book_id: Int!) {
  insert_user_book_read(user_book_id: $user_book_id, user_book_read: {}) {
    id
    error
  }
}"#;

pub(super) const UPDATE_READ_RECORD: &str = r#"
mutation UpdateUserBookRead($id: Int!, $pages: Int, $seconds: Int, $started_at: date, $finished_at: date) {
  update_user_book_read(id: $id, object: {
    progress_pages: $pages,
    progress_seconds: $seconds,
    started_at: $started_at,
    finished_at: $finished_at
  }) {
    id
    error
  }
}"#;

pub(super) const UPDATE_USER_BOOK: &str = r#"
mutation UpdateUserBook($id: Int!, $status_id: Int!, $edition_id: Int) {
  update_user_book(id: $id, object: {status_id: $status_id, edition_id: $edition_id}) {
    id
    error
  }
}"#;

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorExtensions {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Pages {
    pub pages: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct EditionPagesData {
    pub editions_by_pk: Option<Pages>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BookPagesData {
    pub books_by_pk: Option<Pages>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserBookData {
    #[serde(default)]
    pub me: Vec<Me>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Me {
    #[serde(default)]
    pub user_books: Vec<UserBookRow>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserBookRow {
    pub id: i64,
    pub status_id: i64,
    pub edition_id: Option<i64>,
    #[serde(default)]
    pub user_book_reads: Vec<ReadRow>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReadRow {
    pub id: i64,
    pub progress_pages: Option<i64>,
    pub progress_seconds: Option<i64>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl From<UserBookRow> for RemoteUserBook {
    fn from(row: UserBookRow) -> Self {
        RemoteUserBook {
            id: row.id,
            status_id: row.status_id,
            edition_id: row.edition_id,
            latest_read: row.user_book_reads.into_iter().next().map(|r| RemoteReadRecord {
                id: r.id,
                progress_pages: r.progress_pages,
                progress_seconds: r.progress_seconds,
                started_at: r.started_at,
                finished_at: r.finished_at,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct LatestReadData {
    pub user_books_by_pk: Option<ReadIds>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReadIds {
    #[serde(default)]
    pub user_book_reads: Vec<IdRow>,
}

#[derive(Debug, Deserialize)]
pub(super) struct IdRow {
    pub id: i64,
}

/// Mutation result. Hardcover reports validation failures in `error`
/// rather than in the GraphQL `errors` list.
#[derive(Debug, Deserialize)]
pub(super) struct MutationResult {
    pub id: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateUserBookData {
    pub insert_user_book: MutationResult,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateReadRecordData {
    pub insert_user_book_read: MutationResult,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateReadRecordData {
    pub update_user_book_read: MutationResult,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateUserBookData {
    pub update_user_book: MutationResult,
}
