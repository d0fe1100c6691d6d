//! Persistence provider contract and implementations.
//!
//! # Responsibility
//! - Define the one pluggable boundary between the record store and storage.
//! - Host the local (SQLite slot) and remote (HTTP table) implementations.
//!
//! # Invariants
//! - Providers return records newest-first by `created_at`.
//! - Provider errors never cross the store boundary unwrapped; the store
//!   converts them into `StoreError` kinds.

use crate::config::{PairlogConfig, ProviderConfig};
use crate::db::DbError;
use crate::model::record::{Record, RecordId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod local;
pub mod remote;

pub use local::LocalProvider;
pub use remote::RemoteProvider;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Provider handle selected at startup from configuration.
pub type SharedProvider = Arc<dyn RecordProvider>;

/// Transport-level failure raised by a provider.
#[derive(Debug)]
pub enum ProviderError {
    Db(DbError),
    Http(reqwest::Error),
    Status { code: u16, body: String },
    Decode(String),
    Serialize(serde_json::Error),
    DuplicateId(RecordId),
    Unavailable(&'static str),
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Http(err) => write!(f, "request failed: {err}"),
            Self::Status { code, body } => write!(f, "provider responded {code}: {body}"),
            Self::Decode(message) => write!(f, "invalid provider data: {message}"),
            Self::Serialize(err) => write!(f, "record encoding failed: {err}"),
            Self::DuplicateId(id) => write!(f, "record id already stored: {id}"),
            Self::Unavailable(reason) => write!(f, "provider unavailable: {reason}"),
        }
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Http(err) => Some(err),
            Self::Serialize(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ProviderError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ProviderError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Cheap summary of a provider's full record set.
///
/// Two fingerprints differ whenever a record was inserted or the set was
/// cleared, which is all the change notifier needs to trigger a reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fingerprint {
    pub count: usize,
    pub newest_id: Option<RecordId>,
    pub newest_created_at: Option<DateTime<Utc>>,
}

impl Fingerprint {
    pub fn from_entries(entries: impl IntoIterator<Item = (RecordId, DateTime<Utc>)>) -> Self {
        entries
            .into_iter()
            .fold(Self::default(), |mut acc, (id, created_at)| {
                acc.count += 1;
                acc.newest_id = Some(acc.newest_id.map_or(id, |current| current.max(id)));
                acc.newest_created_at = Some(
                    acc.newest_created_at
                        .map_or(created_at, |current| current.max(created_at)),
                );
                acc
            })
    }

    pub fn of(records: &[Record]) -> Self {
        Self::from_entries(records.iter().map(|record| (record.id, record.created_at)))
    }
}

/// Storage backend for journal records.
///
/// Implementations must behave identically from the store's point of view;
/// only failure likelihood and latency differ.
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Short stable identifier used in logs (`local`, `remote`).
    fn provider_id(&self) -> &str;

    /// Records with `created_at >= cutoff`, newest-first.
    async fn fetch_since(&self, cutoff: DateTime<Utc>) -> ProviderResult<Vec<Record>>;

    /// Persists one record and returns the stored shape (server fields win).
    async fn insert(&self, record: &Record) -> ProviderResult<Record>;

    /// Removes every record.
    async fn delete_all(&self) -> ProviderResult<()>;

    async fn fingerprint(&self) -> ProviderResult<Fingerprint>;
}

#[async_trait]
impl<P: RecordProvider + ?Sized> RecordProvider for Arc<P> {
    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    async fn fetch_since(&self, cutoff: DateTime<Utc>) -> ProviderResult<Vec<Record>> {
        (**self).fetch_since(cutoff).await
    }

    async fn insert(&self, record: &Record) -> ProviderResult<Record> {
        (**self).insert(record).await
    }

    async fn delete_all(&self) -> ProviderResult<()> {
        (**self).delete_all().await
    }

    async fn fingerprint(&self) -> ProviderResult<Fingerprint> {
        (**self).fingerprint().await
    }
}

/// Opens the provider named by `config`.
pub fn open_provider(config: &PairlogConfig) -> ProviderResult<SharedProvider> {
    match &config.provider {
        ProviderConfig::Local { path, slot_key } => {
            let provider = LocalProvider::open(path)?.with_slot_key(slot_key.as_str());
            Ok(Arc::new(provider))
        }
        ProviderConfig::Remote(settings) => {
            let provider = RemoteProvider::new(settings, config.request_timeout())?;
            Ok(Arc::new(provider))
        }
    }
}

/// Sorts newest-first (ties broken by id) and drops later duplicates by id.
pub(crate) fn sort_newest_first(records: &mut Vec<Record>) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    let mut seen = std::collections::HashSet::with_capacity(records.len());
    records.retain(|record| seen.insert(record.id));
}
