//! Batch sync of recently read, mapped books.

use super::engine::{Reconciliation, SyncEngine};
use super::plan::MutationKind;
use crate::db::Database;
use crate::error::Result;
use crate::hardcover::RemoteApi;
use serde::Serialize;

/// How one book's sync ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Hardcover was already up to date.
    UpToDate,
    /// Hardcover was updated with these mutations.
    Updated(Vec<MutationKind>),
    /// Sync failed with this error.
    Failed(String),
}

/// Result of syncing one book.
#[derive(Debug, Clone, Serialize)]
pub struct BookOutcome {
    /// Local book ID.
    pub book_id: String,
    /// Book title.
    pub title: String,
    /// Outcome.
    pub status: OutcomeStatus,
}

impl BookOutcome {
    /// Whether the book is now in sync.
    pub fn is_success(&self) -> bool {
        !matches!(self.status, OutcomeStatus::Failed(_))
    }
}

/// Syncs mapped books from the local store to Hardcover.
pub struct SyncService<'a, C: RemoteApi + ?Sized> {
    db: &'a Database,
    engine: SyncEngine<'a, C>,
}

impl<'a, C: RemoteApi + ?Sized> SyncService<'a, C> {
    /// Create a service over a database and a client.
    pub fn new(db: &'a Database, client: &'a C) -> Self {
        Self {
            db,
            engine: SyncEngine::new(client),
        }
    }

    /// Reconcile the `limit` most recently opened mapped books.
    ///
    /// Each book is reported on its own; a failed book does not stop the
    /// batch. A book is marked synced only after its reconciliation succeeds.
    pub async fn sync_progress(&self, limit: usize, force: bool) -> Result<Vec<BookOutcome>> {
        let books = self.db.recent_mapped_books(limit)?;
        tracing::info!(count = books.len(), "Found mapped books to check for sync");

        let mut outcomes = Vec::with_capacity(books.len());
        for book in books {
            let state = book.reading_state();
            tracing::info!(
                title = %book.title,
                book_id = state.remote_book_id,
                percentage = state.percentage_complete,
                status = %state.status,
                "Syncing book"
            );

            let status = match self.engine.reconcile(&state, force).await {
                Ok(result) => match self.db.mark_synced(&book.id) {
                    Ok(()) => match result {
                        Reconciliation::UpToDate => OutcomeStatus::UpToDate,
                        Reconciliation::Updated(applied) => OutcomeStatus::Updated(applied),
                    },
                    Err(e) => {
                        tracing::error!(title = %book.title, error = %e, "Failed to record sync");
                        OutcomeStatus::Failed(e.to_string())
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        title = %book.title,
                        error = %e,
                        transient = e.is_transient(),
                        "Failed to sync book"
                    );
                    if let Err(db_err) = self.db.mark_failed(&book.id, &e.to_string()) {
                        tracing::error!(error = %db_err, "Failed to record sync failure");
                    }
                    OutcomeStatus::Failed(e.to_string())
                }
            };

            outcomes.push(BookOutcome {
                book_id: book.id,
                title: book.title,
                status,
            });
        }

        Ok(outcomes)
    }
}
