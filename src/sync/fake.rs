//! In-memory Hardcover stand-in that records every call.

use crate::hardcover::{
    ProgressUpdate, RemoteApi, RemoteError, RemoteReadRecord, RemoteResult, RemoteUserBook,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EditionPages(i64),
    BookPages(i64),
    UserBook(i64),
    LatestReadId(i64),
    CreateUserBook {
        book_id: i64,
        status_id: i64,
        edition_id: Option<i64>,
    },
    CreateReadRecord(i64),
    UpdateReadRecord(i64, ProgressUpdate),
    UpdateUserBook {
        id: i64,
        status_id: i64,
        edition_id: Option<i64>,
    },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateUserBook { .. }
                | Call::CreateReadRecord(_)
                | Call::UpdateReadRecord(..)
                | Call::UpdateUserBook { .. }
        )
    }

    fn name(&self) -> &'static str {
        match self {
            Call::EditionPages(_) => "edition_pages",
            Call::BookPages(_) => "book_pages",
            Call::UserBook(_) => "user_book",
            Call::LatestReadId(_) => "latest_read_id",
            Call::CreateUserBook { .. } => "create_user_book",
            Call::CreateReadRecord(_) => "create_read_record",
            Call::UpdateReadRecord(..) => "update_read_record",
            Call::UpdateUserBook { .. } => "update_user_book",
        }
    }
}

#[derive(Default)]
struct State {
    book_pages: HashMap<i64, Option<i64>>,
    edition_pages: HashMap<i64, Option<i64>>,
    /// Shelf keyed by book ID.
    shelf: HashMap<i64, RemoteUserBook>,
    next_id: i64,
    calls: Vec<Call>,
    failures: HashMap<&'static str, RemoteError>,
}

/// Fake remote. Mutations change its state, so a second reconciliation sees
/// the result of the first.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
    auto_create_read: bool,
}

impl FakeRemote {
    pub fn new() -> Self {
        let remote = Self::default();
        remote.state.lock().next_id = 1000;
        remote
    }

    /// Mimic the service provisioning a read record along with a new user-book.
    pub fn auto_creating_reads() -> Self {
        Self {
            auto_create_read: true,
            ..Self::new()
        }
    }

    pub fn with_book(self, book_id: i64, pages: Option<i64>) -> Self {
        self.state.lock().book_pages.insert(book_id, pages);
        self
    }

    pub fn with_edition(self, edition_id: i64, pages: Option<i64>) -> Self {
        self.state.lock().edition_pages.insert(edition_id, pages);
        self
    }

    pub fn with_user_book(self, book_id: i64, user_book: RemoteUserBook) -> Self {
        self.state.lock().shelf.insert(book_id, user_book);
        self
    }

    /// Make every call of the named operation fail.
    pub fn failing(self, operation: &'static str, error: RemoteError) -> Self {
        self.state.lock().failures.insert(operation, error);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn user_book(&self, book_id: i64) -> Option<RemoteUserBook> {
        self.state.lock().shelf.get(&book_id).cloned()
    }

    fn record(&self, call: Call) -> RemoteResult<()> {
        let mut state = self.state.lock();
        let failure = state.failures.get(call.name()).cloned();
        state.calls.push(call);
        failure.map_or(Ok(()), Err)
    }
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn by_user_book_id(&mut self, id: i64) -> Option<&mut RemoteUserBook> {
        self.shelf.values_mut().find(|ub| ub.id == id)
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn edition_pages(&self, edition_id: i64) -> RemoteResult<Option<i64>> {
        self.record(Call::EditionPages(edition_id))?;
        self.state
            .lock()
            .edition_pages
            .get(&edition_id)
            .copied()
            .ok_or_else(|| RemoteError::NotFound(format!("edition {}", edition_id)))
    }

    async fn book_pages(&self, book_id: i64) -> RemoteResult<Option<i64>> {
        self.record(Call::BookPages(book_id))?;
        self.state
            .lock()
            .book_pages
            .get(&book_id)
            .copied()
            .ok_or_else(|| RemoteError::NotFound(format!("book {}", book_id)))
    }

    async fn user_book(&self, book_id: i64) -> RemoteResult<Option<RemoteUserBook>> {
        self.record(Call::UserBook(book_id))?;
        Ok(self.state.lock().shelf.get(&book_id).cloned())
    }

    async fn latest_read_id(&self, user_book_id: i64) -> RemoteResult<Option<i64>> {
        self.record(Call::LatestReadId(user_book_id))?;
        let mut state = self.state.lock();
        let user_book = state
            .by_user_book_id(user_book_id)
            .ok_or_else(|| RemoteError::NotFound(format!("user book {}", user_book_id)))?;
        Ok(user_book.latest_read.as_ref().map(|r| r.id))
    }

    async fn create_user_book(
        &self,
        book_id: i64,
        status_id: i64,
        edition_id: Option<i64>,
    ) -> RemoteResult<i64> {
        self.record(Call::CreateUserBook {
            book_id,
            status_id,
            edition_id,
        })?;

        let mut state = self.state.lock();
        let id = state.allocate_id();
        let latest_read = self.auto_create_read.then(|| RemoteReadRecord {
            id: state.allocate_id(),
            ..RemoteReadRecord::default()
        });
        state.shelf.insert(
            book_id,
            RemoteUserBook {
                id,
                status_id,
                edition_id,
                latest_read,
            },
        );
        Ok(id)
    }

    async fn create_read_record(&self, user_book_id: i64) -> RemoteResult<i64> {
        self.record(Call::CreateReadRecord(user_book_id))?;

        let mut state = self.state.lock();
        let id = state.allocate_id();
        let user_book = state
            .by_user_book_id(user_book_id)
            .ok_or_else(|| RemoteError::NotFound(format!("user book {}", user_book_id)))?;
        user_book.latest_read = Some(RemoteReadRecord {
            id,
            ..RemoteReadRecord::default()
        });
        Ok(id)
    }

    async fn update_read_record(&self, read_id: i64, update: &ProgressUpdate) -> RemoteResult<()> {
        self.record(Call::UpdateReadRecord(read_id, update.clone()))?;

        let mut state = self.state.lock();
        let read = state
            .shelf
            .values_mut()
            .filter_map(|ub| ub.latest_read.as_mut())
            .find(|r| r.id == read_id)
            .ok_or_else(|| RemoteError::NotFound(format!("read {}", read_id)))?;

        if update.progress_pages.is_some() {
            read.progress_pages = update.progress_pages;
        }
        read.progress_seconds = Some(update.progress_seconds);
        if update.started_at.is_some() {
            read.started_at = update.started_at.clone();
        }
        if update.finished_at.is_some() {
            read.finished_at = update.finished_at.clone();
        }
        Ok(())
    }

    async fn update_user_book(
        &self,
        user_book_id: i64,
        status_id: i64,
        edition_id: Option<i64>,
    ) -> RemoteResult<()> {
        self.record(Call::UpdateUserBook {
            id: user_book_id,
            status_id,
            edition_id,
        })?;

        let mut state = self.state.lock();
        let user_book = state
            .by_user_book_id(user_book_id)
            .ok_or_else(|| RemoteError::NotFound(format!("user book {}", user_book_id)))?;
        user_book.status_id = status_id;
        user_book.edition_id = edition_id;
        Ok(())
    }
}
