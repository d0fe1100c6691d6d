//! Local durable provider: one string-keyed slot holding the full record set.
//!
//! # Responsibility
//! - Persist the whole record set as JSON under a single key.
//! - Serve window reads by filtering the decoded set in memory.
//!
//! # Invariants
//! - Only read-whole / write-whole access; no per-record rows.
//! - The stored array is kept newest-first.
//! - Read-modify-write runs under one connection lock and one IMMEDIATE
//!   transaction, so acknowledged inserts are never overwritten.
//! - SQLite work runs on the blocking pool, off the async executor.

use super::{sort_newest_first, Fingerprint, ProviderError, ProviderResult, RecordProvider};
use crate::db::{open_db, open_db_in_memory};
use crate::model::record::Record;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Slot key used when configuration does not name one.
pub const DEFAULT_SLOT_KEY: &str = "couple_records";

/// SQLite-backed key/value slot provider.
pub struct LocalProvider {
    conn: Arc<Mutex<Connection>>,
    slot_key: String,
}

impl LocalProvider {
    /// Opens (or creates) the slot database at `path`.
    pub fn open(path: impl AsRef<Path>) -> ProviderResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> ProviderResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            slot_key: DEFAULT_SLOT_KEY.to_string(),
        }
    }

    pub fn with_slot_key(mut self, slot_key: impl Into<String>) -> Self {
        self.slot_key = slot_key.into();
        self
    }

    pub fn slot_key(&self) -> &str {
        &self.slot_key
    }

    /// Runs `work` on the blocking pool with the connection locked for its
    /// whole duration.
    async fn with_slot<T, F>(&self, work: F) -> ProviderResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> ProviderResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let slot_key = self.slot_key.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| ProviderError::Unavailable("local slot connection lock poisoned"))?;
            work(&mut conn, &slot_key)
        })
        .await
        .map_err(|_| ProviderError::Unavailable("local slot task did not complete"))?
    }
}

fn read_slot(conn: &Connection, slot_key: &str) -> ProviderResult<Vec<Record>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM kv_slots WHERE key = ?1;",
            params![slot_key],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(json) => serde_json::from_str(&json).map_err(|err| {
            ProviderError::Decode(format!("slot `{slot_key}` is not a record array: {err}"))
        }),
        None => Ok(Vec::new()),
    }
}

fn write_slot(conn: &Connection, slot_key: &str, records: &[Record]) -> ProviderResult<()> {
    let json = serde_json::to_string(records)?;
    conn.execute(
        "INSERT INTO kv_slots (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![slot_key, json],
    )?;
    debug!(
        "event=slot_write module=provider status=ok provider=local count={} bytes={}",
        records.len(),
        json.len()
    );
    Ok(())
}

#[async_trait]
impl RecordProvider for LocalProvider {
    fn provider_id(&self) -> &str {
        "local"
    }

    async fn fetch_since(&self, cutoff: DateTime<Utc>) -> ProviderResult<Vec<Record>> {
        self.with_slot(move |conn, slot_key| {
            let mut records = read_slot(conn, slot_key)?;
            records.retain(|record| record.created_at >= cutoff);
            sort_newest_first(&mut records);
            Ok(records)
        })
        .await
    }

    async fn insert(&self, record: &Record) -> ProviderResult<Record> {
        let record = record.clone();
        self.with_slot(move |conn, slot_key| {
            // Immediate: other handles on the same file wait instead of
            // reading the array this write is about to replace.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut records = read_slot(&tx, slot_key)?;
            if records.iter().any(|existing| existing.id == record.id) {
                return Err(ProviderError::DuplicateId(record.id));
            }
            records.insert(0, record.clone());
            sort_newest_first(&mut records);
            write_slot(&tx, slot_key, &records)?;
            tx.commit()?;
            Ok(record)
        })
        .await
    }

    async fn delete_all(&self) -> ProviderResult<()> {
        self.with_slot(|conn, slot_key| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            write_slot(&tx, slot_key, &[])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn fingerprint(&self) -> ProviderResult<Fingerprint> {
        self.with_slot(|conn, slot_key| Ok(Fingerprint::of(&read_slot(conn, slot_key)?)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::LocalProvider;
    use crate::model::record::{Author, Record, RecordDraft, TimePeriod};
    use crate::provider::{ProviderError, RecordProvider};
    use chrono::{Duration, TimeZone, Utc};

    fn record(id: i64, hours_ago: i64) -> Record {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        Record::from_draft(
            id,
            RecordDraft::new(Author::Boy, TimePeriod::Evening).with_text(format!("entry {id}")),
            now - Duration::hours(hours_ago),
        )
    }

    #[tokio::test]
    async fn fetch_since_filters_by_cutoff_and_orders_newest_first() {
        let provider = LocalProvider::open_in_memory().unwrap();
        provider.insert(&record(1, 200)).await.unwrap();
        provider.insert(&record(2, 5)).await.unwrap();
        provider.insert(&record(3, 1)).await.unwrap();

        let cutoff = Utc.with_ymd_and_hms(2026, 10, 9, 12, 0, 0).unwrap();
        let loaded = provider.fetch_since(cutoff).await.unwrap();
        let ids: Vec<i64> = loaded.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let provider = LocalProvider::open_in_memory().unwrap();
        provider.insert(&record(7, 1)).await.unwrap();
        let err = provider.insert(&record(7, 2)).await.unwrap_err();
        assert!(matches!(err, ProviderError::DuplicateId(7)));
    }

    #[tokio::test]
    async fn corrupt_slot_surfaces_decode_error() {
        let provider = LocalProvider::open_in_memory().unwrap();
        provider
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO kv_slots (key, value) VALUES ('couple_records', '{not json');",
                [],
            )
            .unwrap();

        let err = provider.fingerprint().await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
