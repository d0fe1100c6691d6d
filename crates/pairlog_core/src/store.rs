//! Canonical in-memory record set synchronized with one provider.
//!
//! # Responsibility
//! - Load a trailing window of records, create records, clear all records.
//! - Convert provider failures into the store error taxonomy.
//!
//! # Invariants
//! - The set is newest-first by `created_at` and unique by `id`.
//! - The set only changes after the provider call succeeded.
//! - The set lock is held for the swap only, never across a provider call.
//! - Every provider call is bounded by `request_timeout`.

use crate::clock::{Clock, SystemClock};
use crate::model::record::{Record, RecordDraft, RecordId, RecordValidationError};
use crate::provider::{sort_newest_first, ProviderError, RecordProvider};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation names used in errors and log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Load,
    Create,
    ClearAll,
}

impl StoreOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Create => "create",
            Self::ClearAll => "clear_all",
        }
    }
}

/// Failure taxonomy exposed to the presentation side.
#[derive(Debug)]
pub enum StoreError {
    /// Draft had neither text nor image; the provider was never contacted.
    InvalidRecord(RecordValidationError),
    /// Load failed; callers present an empty or last-known set.
    StoreUnavailable(ProviderError),
    /// Create or clear-all failed; the set is unchanged.
    PersistError(ProviderError),
    /// The change notifier could not attach.
    SubscriptionError(ProviderError),
    Timeout {
        operation: StoreOperation,
        after: Duration,
    },
}

impl StoreError {
    /// Stable machine-readable code for logs and adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRecord(_) => "invalid_record",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::PersistError(_) => "persist_error",
            Self::SubscriptionError(_) => "subscription_error",
            Self::Timeout { .. } => "timeout",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRecord(err) => write!(f, "{err}"),
            Self::StoreUnavailable(err) => write!(f, "records could not be loaded: {err}"),
            Self::PersistError(err) => write!(f, "change could not be saved: {err}"),
            Self::SubscriptionError(err) => write!(f, "live updates unavailable: {err}"),
            Self::Timeout { operation, after } => write!(
                f,
                "{} timed out after {} ms",
                operation.as_str(),
                after.as_millis()
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRecord(err) => Some(err),
            Self::StoreUnavailable(err) | Self::PersistError(err) | Self::SubscriptionError(err) => {
                Some(err)
            }
            Self::Timeout { .. } => None,
        }
    }
}

impl From<RecordValidationError> for StoreError {
    fn from(value: RecordValidationError) -> Self {
        Self::InvalidRecord(value)
    }
}

/// Trailing window of days fetched by `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadWindow {
    days: u32,
}

impl LoadWindow {
    pub fn days(days: u32) -> Self {
        Self { days: days.max(1) }
    }

    pub fn day_count(&self) -> u32 {
        self.days
    }

    /// Oldest `created_at` included when loading at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::days(i64::from(self.days))
    }
}

impl Default for LoadWindow {
    fn default() -> Self {
        Self::days(crate::config::DEFAULT_LOAD_WINDOW_DAYS)
    }
}

/// Record set owner backed by a pluggable provider.
pub struct RecordStore<P: RecordProvider> {
    provider: P,
    clock: Arc<dyn Clock>,
    records: Mutex<Arc<Vec<Record>>>,
    last_id: AtomicI64,
    request_timeout: Duration,
}

impl<P: RecordProvider> RecordStore<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            clock: Arc::new(SystemClock),
            records: Mutex::new(Arc::new(Vec::new())),
            last_id: AtomicI64::new(0),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Consistent view of the current set; never blocks on provider I/O.
    pub fn snapshot(&self) -> Arc<Vec<Record>> {
        Arc::clone(&self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Replaces the set with the provider's records inside `window`.
    ///
    /// Returns the number of loaded records. On failure the set is unchanged.
    pub async fn load(&self, window: LoadWindow) -> StoreResult<usize> {
        let started_at = Instant::now();
        let cutoff = window.cutoff(self.clock.now());

        let fetched = self
            .bounded(StoreOperation::Load, self.provider.fetch_since(cutoff))
            .await
            .and_then(|result| result.map_err(StoreError::StoreUnavailable));
        let mut records = match fetched {
            Ok(records) => records,
            Err(err) => {
                self.log_failure(StoreOperation::Load, &err, started_at);
                return Err(err);
            }
        };

        sort_newest_first(&mut records);
        if let Some(max_id) = records.iter().map(|record| record.id).max() {
            self.last_id.fetch_max(max_id, Ordering::SeqCst);
        }
        let count = records.len();
        self.replace(records);

        info!(
            "event=store_load module=store status=ok provider={} window_days={} count={} duration_ms={}",
            self.provider.provider_id(),
            window.day_count(),
            count,
            started_at.elapsed().as_millis()
        );
        Ok(count)
    }

    /// Validates, persists and prepends one record.
    pub async fn create(&self, draft: RecordDraft) -> StoreResult<Record> {
        let started_at = Instant::now();
        let draft = draft.normalized();
        if let Err(err) = draft.validate() {
            warn!(
                "event=store_create module=store status=rejected error_code=invalid_record author={}",
                draft.author
            );
            return Err(err.into());
        }

        let now = self.clock.now();
        let record = Record::from_draft(self.next_id(now), draft, now);

        let stored = match self
            .bounded(StoreOperation::Create, self.provider.insert(&record))
            .await
            .and_then(|result| result.map_err(StoreError::PersistError))
        {
            Ok(stored) => stored,
            Err(err) => {
                self.log_failure(StoreOperation::Create, &err, started_at);
                return Err(err);
            }
        };

        self.last_id.fetch_max(stored.id, Ordering::SeqCst);
        self.update(|records| {
            records.retain(|existing| existing.id != stored.id);
            records.insert(0, stored.clone());
        });

        info!(
            "event=store_create module=store status=ok provider={} id={} author={} period={} has_image={} duration_ms={}",
            self.provider.provider_id(),
            stored.id,
            stored.author,
            stored.time_period,
            stored.has_image(),
            started_at.elapsed().as_millis()
        );
        Ok(stored)
    }

    /// Deletes every record at the provider, then empties the set.
    pub async fn clear_all(&self) -> StoreResult<()> {
        let started_at = Instant::now();
        if let Err(err) = self
            .bounded(StoreOperation::ClearAll, self.provider.delete_all())
            .await
            .and_then(|result| result.map_err(StoreError::PersistError))
        {
            self.log_failure(StoreOperation::ClearAll, &err, started_at);
            return Err(err);
        }

        self.replace(Vec::new());
        info!(
            "event=store_clear module=store status=ok provider={} duration_ms={}",
            self.provider.provider_id(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    async fn bounded<T>(
        &self,
        operation: StoreOperation,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> StoreResult<Result<T, ProviderError>> {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout {
                operation,
                after: self.request_timeout,
            })
    }

    /// Millisecond timestamp, bumped past the last assigned or loaded id.
    fn next_id(&self, now: DateTime<Utc>) -> RecordId {
        let candidate = now.timestamp_millis();
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        candidate.max(previous.saturating_add(1))
    }

    fn replace(&self, records: Vec<Record>) {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(records);
    }

    fn update(&self, apply: impl FnOnce(&mut Vec<Record>)) {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::clone(&guard);
        apply(&mut next);
        *guard = Arc::new(next);
    }

    fn log_failure(&self, operation: StoreOperation, err: &StoreError, started_at: Instant) {
        error!(
            "event=store_{} module=store status=error provider={} error_code={} duration_ms={} error={}",
            operation.as_str(),
            self.provider.provider_id(),
            err.code(),
            started_at.elapsed().as_millis(),
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadWindow, RecordStore};
    use crate::clock::ManualClock;
    use crate::provider::LocalProvider;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[test]
    fn load_window_cutoff_is_trailing_days() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        assert_eq!(
            LoadWindow::default().cutoff(now),
            Utc.with_ymd_and_hms(2026, 10, 9, 12, 0, 0).unwrap()
        );
        assert_eq!(LoadWindow::days(0).day_count(), 1);
    }

    #[test]
    fn next_id_is_strictly_increasing_within_one_millisecond() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let store = RecordStore::new(LocalProvider::open_in_memory().unwrap())
            .with_clock(Arc::new(ManualClock::new(now)));
        let first = store.next_id(now);
        let second = store.next_id(now);
        assert_eq!(first, now.timestamp_millis());
        assert_eq!(second, first + 1);
    }
}
