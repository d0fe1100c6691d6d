use pairlog_core::db::schema::SCHEMA_VERSION;
use pairlog_core::db::{open_db, open_db_in_memory, DbError};
use chrono::{DateTime, Duration, Utc};
use pairlog_core::{
    Author, LoadWindow, LocalProvider, Record, RecordDraft, RecordProvider, RecordStore,
    TimePeriod,
};
use std::sync::Arc;

#[test]
fn open_sets_user_version_and_creates_slot_table() {
    let conn = open_db_in_memory().unwrap();

    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);

    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv_slots';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 1);
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.sqlite3");
    {
        let conn = open_db(&path).unwrap();
        conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION + 1))
            .unwrap();
    }

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::SchemaTooNew { found: 2, supported: 1 }));
}

#[tokio::test]
async fn records_survive_reopening_the_slot_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.sqlite3");

    let created = {
        let store = RecordStore::new(LocalProvider::open(&path).unwrap());
        store
            .create(RecordDraft::new(Author::Girl, TimePeriod::Afternoon).with_text("picnic"))
            .await
            .unwrap()
    };

    let store = RecordStore::new(LocalProvider::open(&path).unwrap());
    let count = store.load(LoadWindow::default()).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(store.snapshot()[0], created);
}

#[tokio::test]
async fn slot_keys_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.sqlite3");

    let ours = LocalProvider::open(&path).unwrap();
    let store = RecordStore::new(ours);
    store
        .create(RecordDraft::new(Author::Boy, TimePeriod::Noon).with_text("lunch"))
        .await
        .unwrap();

    let other = LocalProvider::open(&path).unwrap().with_slot_key("another_pair");
    assert_eq!(other.slot_key(), "another_pair");
    assert_eq!(other.fingerprint().await.unwrap().count, 0);
}

fn numbered(id: i64) -> Record {
    Record::from_draft(
        id,
        RecordDraft::new(Author::Girl, TimePeriod::Morning).with_text(format!("entry {id}")),
        Utc::now(),
    )
}

fn long_ago() -> DateTime<Utc> {
    Utc::now() - Duration::days(1)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_inserts_are_all_persisted() {
    let provider = Arc::new(LocalProvider::open_in_memory().unwrap());

    let tasks: Vec<_> = (1..=200)
        .map(|id| {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move { provider.insert(&numbered(id)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = provider.fetch_since(long_ago()).await.unwrap();
    assert_eq!(stored.len(), 200);
    assert_eq!(provider.fingerprint().await.unwrap().count, 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_handles_on_one_file_keep_every_insert() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.sqlite3");
    let ours = Arc::new(LocalProvider::open(&path).unwrap());
    let theirs = Arc::new(LocalProvider::open(&path).unwrap());

    let tasks: Vec<_> = (1..=60)
        .map(|id| {
            let provider = if id % 2 == 0 {
                Arc::clone(&ours)
            } else {
                Arc::clone(&theirs)
            };
            tokio::spawn(async move { provider.insert(&numbered(id)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = ours.fetch_since(long_ago()).await.unwrap();
    assert_eq!(stored.len(), 60);
}
