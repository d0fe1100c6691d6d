//! Application state owned by a presentation adapter.
//!
//! # Responsibility
//! - Hold the store, the feed's filter state and the selected author.
//! - Expose the adapter-facing calls and emit `CoreEvent`s after each change.
//! - React to change notifications with one idempotent reload.
//!
//! # Invariants
//! - Every failure is reported as a `Notice`; none is fatal.
//! - A failed reload keeps the last-known-good set.

use crate::clock::Clock;
use crate::config::{PairlogConfig, DEFAULT_POLL_INTERVAL_MS};
use crate::filter::{select_display_records, AuthorFilter, FilterState, ScopeFilter};
use crate::model::day::CalendarDay;
use crate::model::record::{Author, Record, RecordDraft, TimePeriod};
use crate::notifier::{ChangeFeed, ChangeSubscription, PollingChangeFeed};
use crate::provider::{open_provider, ProviderResult, RecordProvider, SharedProvider};
use crate::report::{
    build_daily_report, count_by_author, format_share_text, report_heading, share_date_label,
    AuthorCounts, DailyReport,
};
use crate::store::{LoadWindow, RecordStore, StoreError, StoreResult};
use chrono::FixedOffset;
use log::{info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// User-visible toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Notice shown for a failed store operation.
    pub fn from_store_error(err: &StoreError) -> Self {
        match err {
            StoreError::InvalidRecord(_) => Self::error("Write something or attach an image first."),
            StoreError::StoreUnavailable(_) => {
                Self::warning("Could not load records; check the network connection.")
            }
            StoreError::PersistError(_) => {
                Self::error("Could not save the change; check the network connection.")
            }
            StoreError::SubscriptionError(_) => {
                Self::warning("Live updates are unavailable; records refresh on reload.")
            }
            StoreError::Timeout { .. } => Self::error("The request timed out; please retry."),
        }
    }
}

/// Core to adapter notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// The record set changed; re-render feed, stats and report.
    RecordsChanged,
    Notice(Notice),
}

#[derive(Debug, Clone, Copy)]
struct ViewState {
    filters: FilterState,
    current_author: Author,
}

/// Journal session: the one place adapter state lives.
pub struct Session<P: RecordProvider> {
    store: RecordStore<P>,
    window: LoadWindow,
    offset: FixedOffset,
    poll_interval: Duration,
    view: Mutex<ViewState>,
    events: mpsc::UnboundedSender<CoreEvent>,
}

impl<P: RecordProvider> Session<P> {
    /// Creates a session and the receiver adapters render from.
    pub fn new(
        store: RecordStore<P>,
        window: LoadWindow,
        offset: FixedOffset,
    ) -> (Self, mpsc::UnboundedReceiver<CoreEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            store,
            window,
            offset,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            view: Mutex::new(ViewState {
                filters: FilterState::default(),
                current_author: Author::Girl,
            }),
            events,
        };
        (session, receiver)
    }

    pub fn store(&self) -> &RecordStore<P> {
        &self.store
    }

    /// Interval polling change feeds use for this session.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The shared calendar day for "today" right now.
    pub fn today(&self) -> CalendarDay {
        CalendarDay::containing(self.clock().now(), self.offset)
    }

    pub fn filters(&self) -> FilterState {
        self.view_state().filters
    }

    pub fn set_author_filter(&self, author: AuthorFilter) {
        self.update_view(|view| view.filters.author = author);
    }

    pub fn set_scope_filter(&self, scope: ScopeFilter) {
        self.update_view(|view| view.filters.scope = scope);
    }

    pub fn current_author(&self) -> Author {
        self.view_state().current_author
    }

    /// Selects who new entries are written as.
    pub fn set_current_author(&self, author: Author) {
        self.update_view(|view| view.current_author = author);
    }

    /// Draft pre-filled with the selected author.
    pub fn draft(&self, time_period: TimePeriod) -> RecordDraft {
        RecordDraft::new(self.current_author(), time_period)
    }

    /// Loads the trailing window. Failures become a warning notice and the
    /// set keeps its last-known-good contents (empty before the first load).
    pub async fn load_records(&self) -> usize {
        match self.store.load(self.window).await {
            Ok(count) => {
                self.emit(CoreEvent::RecordsChanged);
                count
            }
            Err(err) => {
                self.notify(Notice::from_store_error(&err));
                self.store.len()
            }
        }
    }

    pub async fn create_record(&self, draft: RecordDraft) -> StoreResult<Record> {
        match self.store.create(draft).await {
            Ok(record) => {
                self.emit(CoreEvent::RecordsChanged);
                self.notify(Notice::info("Record saved."));
                Ok(record)
            }
            Err(err) => {
                self.notify(Notice::from_store_error(&err));
                Err(err)
            }
        }
    }

    /// Deletes every record. Confirmation is the adapter's job.
    pub async fn clear_all_records(&self) -> StoreResult<()> {
        match self.store.clear_all().await {
            Ok(()) => {
                self.emit(CoreEvent::RecordsChanged);
                self.notify(Notice::info("All records cleared."));
                Ok(())
            }
            Err(err) => {
                self.notify(Notice::from_store_error(&err));
                Err(err)
            }
        }
    }

    /// The single reaction to "remote set may have changed": full reload.
    pub async fn handle_remote_change(&self) -> usize {
        match self.store.load(self.window).await {
            Ok(count) => {
                self.emit(CoreEvent::RecordsChanged);
                self.notify(Notice::info("New records synced."));
                count
            }
            Err(err) => {
                warn!(
                    "event=remote_change module=session status=error error_code={} error={}",
                    err.code(),
                    err
                );
                self.notify(Notice::from_store_error(&err));
                self.store.len()
            }
        }
    }

    /// Attaches to `feed`. Failure is non-fatal: logged, a warning notice is
    /// emitted, and the session keeps working without live updates.
    pub async fn attach_change_feed<F: ChangeFeed + ?Sized>(
        &self,
        feed: &F,
    ) -> StoreResult<ChangeSubscription> {
        feed.subscribe().await.map_err(|source| {
            let err = StoreError::SubscriptionError(source);
            warn!(
                "event=feed_attach module=session status=error error_code={} error={}",
                err.code(),
                err
            );
            self.notify(Notice::from_store_error(&err));
            err
        })
    }

    /// Reloads on every event until the subscription ends.
    pub async fn run_change_listener(&self, mut subscription: ChangeSubscription) {
        while let Some(event) = subscription.next().await {
            info!(
                "event=remote_change module=session status=start source={}",
                event.source
            );
            self.handle_remote_change().await;
        }
        info!("event=change_listener module=session status=stopped");
    }

    /// Feed records for the current filters, newest-first.
    pub fn display_records(&self) -> Vec<Record> {
        let snapshot = self.store.snapshot();
        select_display_records(&snapshot, &self.filters(), &self.today())
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn count_by_author(&self) -> AuthorCounts {
        count_by_author(&self.store.snapshot())
    }

    pub fn build_daily_report(&self) -> DailyReport {
        build_daily_report(&self.store.snapshot(), &self.today())
    }

    /// Heading for today's report.
    pub fn report_heading(&self) -> String {
        report_heading(self.today().date())
    }

    /// Clipboard text for today's report.
    pub fn format_share_text(&self) -> String {
        let today = self.today();
        let report = build_daily_report(&self.store.snapshot(), &today);
        format_share_text(&report, &share_date_label(today.date()))
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        self.store.clock()
    }

    fn view_state(&self) -> ViewState {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn view_state_mut(&self) -> std::sync::MutexGuard<'_, ViewState> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_view(&self, apply: impl FnOnce(&mut ViewState)) {
        apply(&mut self.view_state_mut());
    }

    fn notify(&self, notice: Notice) {
        self.emit(CoreEvent::Notice(notice));
    }

    fn emit(&self, event: CoreEvent) {
        // Adapter may have dropped its receiver during shutdown.
        let _ = self.events.send(event);
    }
}

impl Session<SharedProvider> {
    /// Opens the configured provider and wires a session around it.
    pub fn open(
        config: &PairlogConfig,
    ) -> ProviderResult<(Self, mpsc::UnboundedReceiver<CoreEvent>)> {
        let provider = open_provider(config)?;
        info!(
            "event=session_open module=session status=ok provider={} window_days={} poll_interval_ms={}",
            provider.provider_id(),
            config.load_window_days,
            config.poll_interval_ms
        );
        let store = RecordStore::new(provider).with_request_timeout(config.request_timeout());
        let (mut session, events) = Self::new(store, config.load_window(), config.shared_offset());
        session.poll_interval = config.poll_interval();
        Ok((session, events))
    }

    /// Polling change feed over this session's provider at the configured
    /// `poll_interval_ms`.
    pub fn polling_feed(&self) -> PollingChangeFeed {
        PollingChangeFeed::new(SharedProvider::clone(self.store.provider()), self.poll_interval)
    }
}
