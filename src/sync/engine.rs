//! Reconciliation state machine for one book.

use super::drift::should_skip;
use super::plan::{Mutation, MutationKind, MutationPlan};
use super::{LocalReadingState, RemoteEntitySnapshot};
use crate::hardcover::{RemoteApi, RemoteError, RemoteResult};

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Remote already within drift tolerance; nothing was written.
    UpToDate,
    /// Writes were issued, in this order.
    Updated(Vec<MutationKind>),
}

impl Reconciliation {
    /// Mutations that were executed.
    pub fn applied(&self) -> &[MutationKind] {
        match self {
            Reconciliation::UpToDate => &[],
            Reconciliation::Updated(kinds) => kinds,
        }
    }
}

/// IDs resolved so far while executing a plan.
#[derive(Debug, Default)]
struct Cursor {
    user_book_id: Option<i64>,
    read_id: Option<i64>,
}

impl Cursor {
    fn user_book_id(&self) -> RemoteResult<i64> {
        self.user_book_id
            .ok_or_else(|| RemoteError::NotFound("user book id unavailable".to_string()))
    }

    fn read_id(&self) -> RemoteResult<i64> {
        self.read_id
            .ok_or_else(|| RemoteError::NotFound("read record id unavailable".to_string()))
    }
}

/// Drives one book's reconciliation against a [`RemoteApi`].
///
/// Holds no state between calls; every reconciliation starts from a fresh
/// snapshot.
pub struct SyncEngine<'a, C: RemoteApi + ?Sized> {
    client: &'a C,
}

impl<'a, C: RemoteApi + ?Sized> SyncEngine<'a, C> {
    /// Create an engine over a client.
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Read the remote state of a book.
    ///
    /// The page count comes from the edition when one is mapped and falls back
    /// to the canonical book when the edition has none.
    pub async fn fetch_snapshot(
        &self,
        local: &LocalReadingState,
    ) -> RemoteResult<RemoteEntitySnapshot> {
        let mut total_pages = None;
        if let Some(edition_id) = local.remote_edition_id {
            total_pages = self.client.edition_pages(edition_id).await?;
        }
        if !total_pages.is_some_and(|p| p > 0) {
            total_pages = self.client.book_pages(local.remote_book_id).await?;
        }

        let user_book = self.client.user_book(local.remote_book_id).await?;

        Ok(RemoteEntitySnapshot {
            total_pages,
            user_book,
        })
    }

    /// Bring the remote in line with `local`.
    ///
    /// The first remote error aborts the remaining steps and is returned.
    pub async fn reconcile(
        &self,
        local: &LocalReadingState,
        forced: bool,
    ) -> RemoteResult<Reconciliation> {
        let snapshot = self.fetch_snapshot(local).await?;

        if should_skip(local, &snapshot, forced) {
            tracing::info!(book_id = local.remote_book_id, "No changes needed (up to date)");
            return Ok(Reconciliation::UpToDate);
        }

        let plan = MutationPlan::build(local, &snapshot);
        tracing::debug!(
            book_id = local.remote_book_id,
            steps = ?plan.kinds(),
            "Applying mutation plan"
        );

        let applied = self.execute(&plan, &snapshot).await?;
        Ok(Reconciliation::Updated(applied))
    }

    /// Run a plan step by step, threading newly created IDs into later steps.
    pub async fn execute(
        &self,
        plan: &MutationPlan,
        snapshot: &RemoteEntitySnapshot,
    ) -> RemoteResult<Vec<MutationKind>> {
        let mut cursor = Cursor {
            user_book_id: snapshot.user_book.as_ref().map(|ub| ub.id),
            read_id: snapshot.latest_read().map(|r| r.id),
        };
        let mut applied = Vec::with_capacity(plan.steps().len());

        for step in plan.steps() {
            match step {
                Mutation::CreateUserBook {
                    book_id,
                    status_id,
                    edition_id,
                } => {
                    let id = self
                        .client
                        .create_user_book(*book_id, *status_id, *edition_id)
                        .await?;
                    tracing::info!(book_id, user_book_id = id, "Added book to shelf");
                    cursor.user_book_id = Some(id);
                    // The service may provision a read record with the book.
                    cursor.read_id = self.client.latest_read_id(id).await?;
                }
                Mutation::CreateReadRecord => {
                    if cursor.read_id.is_some() {
                        continue;
                    }
                    let id = self
                        .client
                        .create_read_record(cursor.user_book_id()?)
                        .await?;
                    tracing::debug!(read_id = id, "Created read record");
                    cursor.read_id = Some(id);
                }
                Mutation::UpdateReadRecord(update) => {
                    self.client
                        .update_read_record(cursor.read_id()?, update)
                        .await?;
                    tracing::debug!(
                        pages = ?update.progress_pages,
                        seconds = update.progress_seconds,
                        "Updated read progress"
                    );
                }
                Mutation::UpdateUserBook {
                    status_id,
                    edition_id,
                } => {
                    self.client
                        .update_user_book(cursor.user_book_id()?, *status_id, *edition_id)
                        .await?;
                    tracing::debug!(status_id, edition_id = ?edition_id, "Updated shelf status");
                }
            }
            applied.push(step.kind());
        }

        Ok(applied)
    }
}
