//! Drift-tolerant comparison of local and remote progress.

use super::{LocalReadingState, ReadingStatus, RemoteEntitySnapshot};

/// Page difference below which progress counts as unchanged.
pub const PAGE_TOLERANCE: i64 = 2;
/// Reading time difference (seconds) below which progress counts as unchanged.
pub const SECONDS_TOLERANCE: i64 = 60;

/// Whether the remote already reflects the local state closely enough to
/// skip every write. `forced` never skips.
pub fn should_skip(local: &LocalReadingState, remote: &RemoteEntitySnapshot, forced: bool) -> bool {
    if forced {
        return false;
    }

    let Some(user_book) = &remote.user_book else {
        return false;
    };

    if user_book.status_id != local.status.status_id() {
        return false;
    }

    if local
        .remote_edition_id
        .is_some_and(|edition| user_book.edition_id != Some(edition))
    {
        return false;
    }

    let Some(read) = &user_book.latest_read else {
        return false;
    };

    let target_page = local.target_page(remote.total_pages);
    let page_match = read
        .progress_pages
        .is_some_and(|pages| (pages - target_page).abs() < PAGE_TOLERANCE);

    let time_match =
        (read.progress_seconds.unwrap_or(0) - local.elapsed_seconds).abs() < SECONDS_TOLERANCE;

    let start_match = read.started_at == local.started_at();

    let finish_match = match local.status {
        ReadingStatus::Finished => read.finished_at == local.finished_at(),
        ReadingStatus::Reading => true,
    };

    page_match && time_match && start_match && finish_match
}
