//! Ordered remote mutations for one reconciliation.

use super::{LocalReadingState, RemoteEntitySnapshot};
use crate::hardcover::ProgressUpdate;
use serde::Serialize;

/// One remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Add the book to the shelf.
    CreateUserBook {
        /// Hardcover book ID.
        book_id: i64,
        /// Initial status id.
        status_id: i64,
        /// Initial edition.
        edition_id: Option<i64>,
    },
    /// Start a read record, unless one exists by the time this step runs.
    CreateReadRecord,
    /// Write progress and dates to the current read record.
    UpdateReadRecord(ProgressUpdate),
    /// Change shelf status and edition.
    UpdateUserBook {
        /// New status id.
        status_id: i64,
        /// New edition.
        edition_id: Option<i64>,
    },
}

impl Mutation {
    /// Tag without payload.
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::CreateUserBook { .. } => MutationKind::CreateUserBook,
            Mutation::CreateReadRecord => MutationKind::CreateReadRecord,
            Mutation::UpdateReadRecord(_) => MutationKind::UpdateReadRecord,
            Mutation::UpdateUserBook { .. } => MutationKind::UpdateUserBook,
        }
    }
}

/// Payload-free mutation tag, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MutationKind {
    /// See [`Mutation::CreateUserBook`].
    CreateUserBook,
    /// See [`Mutation::CreateReadRecord`].
    CreateReadRecord,
    /// See [`Mutation::UpdateReadRecord`].
    UpdateReadRecord,
    /// See [`Mutation::UpdateUserBook`].
    UpdateUserBook,
}

/// Mutations to apply, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    steps: Vec<Mutation>,
}

impl MutationPlan {
    /// Plan the writes that bring the remote in line with the local state.
    ///
    /// Status and edition are compared against the snapshot as it was before
    /// any creation: a user-book created by this plan already carries the
    /// desired values, so no status update follows it.
    ///
    /// Without a mapped edition the remote's edition is kept as is; the update
    /// never clears it.
    pub fn build(local: &LocalReadingState, remote: &RemoteEntitySnapshot) -> Self {
        let status_id = local.status.status_id();
        let mut steps = Vec::with_capacity(4);

        match &remote.user_book {
            None => {
                steps.push(Mutation::CreateUserBook {
                    book_id: local.remote_book_id,
                    status_id,
                    edition_id: local.remote_edition_id,
                });
                steps.push(Mutation::CreateReadRecord);
            }
            Some(user_book) if user_book.latest_read.is_none() => {
                steps.push(Mutation::CreateReadRecord);
            }
            Some(_) => {}
        }

        let current = remote.latest_read();
        let progress_pages = if remote.has_page_count() {
            Some(local.target_page(remote.total_pages))
        } else {
            current.and_then(|r| r.progress_pages)
        };

        steps.push(Mutation::UpdateReadRecord(ProgressUpdate {
            progress_pages,
            progress_seconds: local.elapsed_seconds,
            started_at: local
                .started_at()
                .or_else(|| current.and_then(|r| r.started_at.clone())),
            finished_at: local.finished_at(),
        }));

        if let Some(user_book) = &remote.user_book {
            // An unmapped edition keeps whatever the remote has.
            let edition_id = local.remote_edition_id.or(user_book.edition_id);
            if user_book.status_id != status_id || user_book.edition_id != edition_id {
                steps.push(Mutation::UpdateUserBook {
                    status_id,
                    edition_id,
                });
            }
        }

        Self { steps }
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[Mutation] {
        &self.steps
    }

    /// Step tags in execution order.
    pub fn kinds(&self) -> Vec<MutationKind> {
        self.steps.iter().map(Mutation::kind).collect()
    }
}
