use crate::db::{BookMapping, Database, ImportStats, TrackedBook, now_timestamp};
use crate::error::AppError;
use crate::hardcover::{RemoteReadRecord, RemoteUserBook};
use crate::sync::fake::{Call, FakeRemote};
use crate::sync::{MutationKind, OutcomeStatus, ReadingStatus, SyncService};
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};

const JAN_01: i64 = 1_672_531_200 + 3600;
const JAN_02: i64 = 1_672_617_600 + 3600;
const JAN_05: i64 = 1_672_876_800 + 3600;
const JAN_10: i64 = 1_673_308_800 + 3600;
const JAN_11: i64 = 1_673_395_200 + 3600;
const FEB_01: i64 = 1_675_209_600 + 3600;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

/// Build a KOReader statistics database with the tables the importer reads.
fn koreader_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("statistics.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE book (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT, authors TEXT, notes INTEGER, last_open INTEGER,
            highlights INTEGER, pages INTEGER, series TEXT, language TEXT,
            md5 TEXT, total_read_time INTEGER, total_read_pages INTEGER
        );
        CREATE TABLE page_stat_data (
            id_book INTEGER,
            page INTEGER NOT NULL DEFAULT 0,
            start_time INTEGER NOT NULL DEFAULT 0,
            duration INTEGER NOT NULL DEFAULT 0,
            total_pages INTEGER NOT NULL DEFAULT 0,
            UNIQUE (id_book, page, start_time)
        );",
    )
    .unwrap();

    let books: [(i64, &str, &str, i64, i64, &str, i64, i64); 4] = [
        (1, "Book One", "Author A", JAN_05, 100, "md5_1", 3600, 50),
        (2, "Book Two", "Author B", FEB_01, 200, "md5_2", 7200, 200),
        (3, "Book Three", "Author C", JAN_10, 100, "md5_3", 3600, 70),
        (4, "Unhashed", "Author D", FEB_01, 100, "", 60, 1),
    ];
    for (id, title, authors, last_open, pages, md5, time, read) in books {
        conn.execute(
            "INSERT INTO book (id, title, authors, notes, last_open, highlights, pages,
                               series, language, md5, total_read_time, total_read_pages)
             VALUES (?1, ?2, ?3, 0, ?4, 0, ?5, NULL, 'en', ?6, ?7, ?8)",
            params![id, title, authors, last_open, pages, md5, time, read],
        )
        .unwrap();
    }

    let sessions: [(i64, i64, i64, i64); 8] = [
        (1, 1, JAN_01, 100),
        (1, 2, JAN_01 + 60, 100),
        (1, 3, JAN_01 + 120, 100),
        (2, 1, JAN_01 + 7200, 200),
        (3, 10, JAN_02, 100),
        (3, 99, JAN_10, 100),
        // Reflowed to a different page count
        (3, 150, JAN_11, 300),
        (4, 1, JAN_01, 100),
    ];
    for (book, page, start, total) in sessions {
        conn.execute(
            "INSERT INTO page_stat_data (id_book, page, start_time, duration, total_pages)
             VALUES (?1, ?2, ?3, 30, ?4)",
            params![book, page, start, total],
        )
        .unwrap();
    }

    path
}

fn imported_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let fixture = koreader_fixture(dir.path());
    let db = test_db();
    db.import_statistics(&fixture).unwrap();
    (dir, db)
}

fn map(db: &Database, local_id: &str, book_id: i64, edition_id: Option<i64>) {
    db.save_mapping(&BookMapping {
        local_book_id: local_id.to_string(),
        remote_book_id: book_id,
        remote_edition_id: edition_id,
        book_title: None,
        author: None,
        created_at: now_timestamp(),
        updated_at: now_timestamp(),
    })
    .unwrap();
}

#[test]
fn import_books_and_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = koreader_fixture(dir.path());
    let db = test_db();

    let stats = db.import_statistics(&fixture).unwrap();
    assert_eq!(
        stats,
        ImportStats {
            books: 3,
            sessions: 7,
        }
    );

    let counts = db.counts().unwrap();
    assert_eq!(counts.books, 3);
    assert_eq!(counts.sessions, 7);
    assert_eq!(counts.mapped, 0);
}

#[test]
fn reimport_skips_known_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = koreader_fixture(dir.path());
    let db = test_db();

    db.import_statistics(&fixture).unwrap();
    let again = db.import_statistics(&fixture).unwrap();

    assert_eq!(again.sessions, 0);
    assert_eq!(db.counts().unwrap().sessions, 7);
    assert_eq!(db.counts().unwrap().books, 3);
}

#[test]
fn import_classifies_status() {
    let (_dir, db) = imported_db();

    assert_eq!(db.get_book("md5_1").unwrap().unwrap().status, "reading");
    assert_eq!(db.get_book("md5_2").unwrap().unwrap().status, "finished");
    assert_eq!(db.get_book("md5_3").unwrap().unwrap().status, "reading");
    assert!(db.get_book("").unwrap().is_none());
}

#[test]
fn import_missing_file_fails() {
    let db = test_db();
    let result = db.import_statistics(Path::new("/non/existent/statistics.sqlite3"));
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn import_leaves_database_usable_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("empty.sqlite3");
    Connection::open(&bogus)
        .unwrap()
        .execute_batch("CREATE TABLE unrelated (x INTEGER);")
        .unwrap();

    let db = test_db();
    assert!(db.import_statistics(&bogus).is_err());

    // The attachment was released, so a real import still works
    let fixture = koreader_fixture(dir.path());
    assert_eq!(db.import_statistics(&fixture).unwrap().books, 3);
}

#[test]
fn list_books_filters_and_pages() {
    let (_dir, db) = imported_db();
    map(&db, "md5_2", 1002, None);

    let (books, total) = db.list_books(None, 2, 0).unwrap();
    assert_eq!(total, 3);
    assert_eq!(books.len(), 2);
    assert_eq!(books[0].id, "md5_2");
    assert!(books[0].mapped);
    assert_eq!(books[1].id, "md5_3");
    assert!(!books[1].mapped);

    let (rest, _) = db.list_books(None, 2, 2).unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, "md5_1");

    let (found, total) = db.list_books(Some("author c"), 10, 0).unwrap();
    assert_eq!(total, 1);
    assert_eq!(found[0].title, "Book Three");
}

#[test]
fn mapping_upsert_and_delete() {
    let (_dir, db) = imported_db();

    map(&db, "md5_1", 1001, None);
    map(&db, "md5_1", 1005, Some(77));

    let mapping = db.get_mapping("md5_1").unwrap().unwrap();
    assert_eq!(mapping.remote_book_id, 1005);
    assert_eq!(mapping.remote_edition_id, Some(77));
    assert_eq!(db.counts().unwrap().mapped, 1);

    assert!(db.delete_mapping("md5_1").unwrap());
    assert!(!db.delete_mapping("md5_1").unwrap());
    assert!(db.get_mapping("md5_1").unwrap().is_none());
}

#[test]
fn mapping_rejects_invalid_ids() {
    let (_dir, db) = imported_db();
    let result = db.save_mapping(&BookMapping {
        local_book_id: "md5_1".to_string(),
        remote_book_id: 0,
        remote_edition_id: None,
        book_title: None,
        author: None,
        created_at: now_timestamp(),
        updated_at: now_timestamp(),
    });
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
}

#[test]
fn recent_mapped_books_newest_first() {
    let (_dir, db) = imported_db();
    map(&db, "md5_1", 1001, None);
    map(&db, "md5_2", 1002, Some(999));
    map(&db, "md5_3", 1003, None);

    let books = db.recent_mapped_books(10).unwrap();
    let ids: Vec<_> = books.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["md5_2", "md5_3", "md5_1"]);

    let limited = db.recent_mapped_books(1).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].remote_edition_id, Some(999));
}

#[test]
fn unmapped_books_are_not_tracked() {
    let (_dir, db) = imported_db();
    map(&db, "md5_1", 1001, None);

    let books = db.recent_mapped_books(10).unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].id, "md5_1");
}

#[test]
fn reading_state_from_sessions() {
    let (_dir, db) = imported_db();
    map(&db, "md5_1", 1001, None);

    let book = db.recent_mapped_books(1).unwrap().remove(0);
    let state = book.reading_state();

    assert_eq!(state.remote_book_id, 1001);
    assert_eq!(state.percentage_complete, 50.0);
    assert_eq!(state.status, ReadingStatus::Reading);
    assert_eq!(state.elapsed_seconds, 3600);
    assert_eq!(state.start_date, NaiveDate::from_ymd_opt(2023, 1, 1));
    assert_eq!(state.last_read_date, NaiveDate::from_ymd_opt(2023, 1, 5));
}

#[test]
fn page_jump_does_not_change_progress() {
    let (_dir, db) = imported_db();
    map(&db, "md5_3", 1003, None);

    let book = db.recent_mapped_books(1).unwrap().remove(0);
    // Sessions reached page 99 of 100, but only 70 pages were read
    let state = book.reading_state();
    assert_eq!(state.percentage_complete, 70.0);
    assert_eq!(state.status, ReadingStatus::Reading);
    assert_eq!(state.finished_at(), None);
    assert_eq!(state.start_date, NaiveDate::from_ymd_opt(2023, 1, 2));

    let stored = db.get_book("md5_3").unwrap().unwrap();
    assert_eq!(stored.status, state.status.as_str());
}

#[test]
fn glance_at_last_page_stays_reading() {
    let book = TrackedBook {
        id: "md5_x".to_string(),
        title: "Skimmed".to_string(),
        authors: None,
        total_pages: 300,
        read_pages: 5,
        read_time: 600,
        last_open: Some(JAN_05),
        remote_book_id: 1001,
        remote_edition_id: None,
        first_session: Some(JAN_01),
    };

    let state = book.reading_state();
    assert!((state.percentage_complete - 5.0 / 3.0).abs() < 1e-9);
    assert_eq!(state.status, ReadingStatus::Reading);
    assert_eq!(state.finished_at(), None);
}

fn remote_for_fixture() -> FakeRemote {
    FakeRemote::new()
        .with_book(1001, Some(100))
        .with_book(1002, Some(300))
        .with_edition(999, Some(200))
        .with_user_book(
            1002,
            RemoteUserBook {
                id: 20,
                status_id: 3,
                edition_id: Some(999),
                latest_read: Some(RemoteReadRecord {
                    id: 21,
                    progress_pages: Some(200),
                    progress_seconds: Some(7200),
                    started_at: Some("2023-01-01".to_string()),
                    finished_at: Some("2023-02-01".to_string()),
                }),
            },
        )
}

#[tokio::test]
async fn batch_reports_each_book() {
    let (_dir, db) = imported_db();
    map(&db, "md5_1", 1001, None);
    map(&db, "md5_2", 1002, Some(999));
    // Unknown on the remote
    map(&db, "md5_3", 1003, None);

    let remote = remote_for_fixture();
    let service = SyncService::new(&db, &remote);
    let outcomes = service.sync_progress(10, false).await.unwrap();

    let titles: Vec<_> = outcomes.iter().map(|o| o.title.as_str()).collect();
    assert_eq!(titles, vec!["Book Two", "Book Three", "Book One"]);

    assert_eq!(outcomes[0].status, OutcomeStatus::UpToDate);
    assert!(matches!(outcomes[1].status, OutcomeStatus::Failed(_)));
    assert!(!outcomes[1].is_success());
    assert_eq!(
        outcomes[2].status,
        OutcomeStatus::Updated(vec![
            MutationKind::CreateUserBook,
            MutationKind::CreateReadRecord,
            MutationKind::UpdateReadRecord,
        ])
    );

    assert_eq!(
        db.sync_status("md5_2").unwrap().unwrap(),
        ("synced".to_string(), None)
    );
    assert_eq!(db.sync_status("md5_1").unwrap().unwrap().0, "synced");
    let (status, error) = db.sync_status("md5_3").unwrap().unwrap();
    assert_eq!(status, "failed");
    assert!(error.unwrap().contains("1003"));
}

#[tokio::test]
async fn second_batch_issues_no_mutations() {
    let (_dir, db) = imported_db();
    map(&db, "md5_1", 1001, None);
    map(&db, "md5_2", 1002, Some(999));

    let remote = remote_for_fixture();
    let service = SyncService::new(&db, &remote);

    service.sync_progress(10, false).await.unwrap();
    remote.clear_calls();

    let outcomes = service.sync_progress(10, false).await.unwrap();
    assert!(
        outcomes
            .iter()
            .all(|o| o.status == OutcomeStatus::UpToDate)
    );
    assert!(remote.mutations().is_empty());
}

#[tokio::test]
async fn batch_respects_limit() {
    let (_dir, db) = imported_db();
    map(&db, "md5_1", 1001, None);
    map(&db, "md5_2", 1002, Some(999));

    let remote = remote_for_fixture();
    let service = SyncService::new(&db, &remote);
    let outcomes = service.sync_progress(1, false).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].book_id, "md5_2");
    assert!(!remote.calls().contains(&Call::UserBook(1001)));
    assert_eq!(db.sync_status("md5_1").unwrap().unwrap().0, "pending");
}
