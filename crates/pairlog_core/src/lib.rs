//! Core logic for pairlog, a two-person shared journal.
//! This crate owns record invariants, provider sync, feed filtering and
//! daily reports; presentation adapters only render and forward actions.

pub mod clock;
pub mod config;
pub mod db;
pub mod filter;
pub mod logging;
pub mod model;
pub mod notifier;
pub mod provider;
pub mod report;
pub mod session;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, PairlogConfig, ProviderConfig, RemoteSettings};
pub use filter::{select_display_records, AuthorFilter, FilterState, ScopeFilter};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::day::CalendarDay;
pub use model::record::{Author, Record, RecordDraft, RecordId, RecordValidationError, TimePeriod};
pub use notifier::{
    ChangeEvent, ChangeFeed, ChangeSubscription, ManualChangeFeed, PollingChangeFeed,
};
pub use provider::{
    open_provider, Fingerprint, LocalProvider, ProviderError, ProviderResult, RecordProvider,
    RemoteProvider, SharedProvider,
};
pub use report::{
    build_daily_report, count_by_author, format_share_text, report_heading, share_date_label,
    AuthorCounts, DailyReport,
};
pub use session::{CoreEvent, Notice, Session, Severity};
pub use store::{LoadWindow, RecordStore, StoreError, StoreOperation, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
