//! Aggregates and the daily report.
//!
//! # Responsibility
//! - Count records per author across the whole set.
//! - Build the per-day report and its shareable text.
//!
//! # Invariants
//! - `AuthorCounts::total()` equals the number of counted records.
//! - Formatting is pure: same inputs, same bytes, on any host locale.

use crate::model::day::CalendarDay;
use crate::model::record::{Author, Record};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

const SHARE_TITLE: &str = "📝 情侣日常报告";
const SHARE_TAGLINE: &str = "记录我们的每一天 💕";

/// Per-author tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthorCounts {
    pub girl: usize,
    pub boy: usize,
}

impl AuthorCounts {
    pub fn get(&self, author: Author) -> usize {
        match author {
            Author::Girl => self.girl,
            Author::Boy => self.boy,
        }
    }

    pub fn total(&self) -> usize {
        self.girl + self.boy
    }

    fn bump(&mut self, author: Author) {
        match author {
            Author::Girl => self.girl += 1,
            Author::Boy => self.boy += 1,
        }
    }
}

/// Summary tally over the full set, ignoring any scope filter.
pub fn count_by_author(records: &[Record]) -> AuthorCounts {
    records.iter().fold(AuthorCounts::default(), |mut counts, record| {
        counts.bump(record.author);
        counts
    })
}

/// One calendar day's records and counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub counts: AuthorCounts,
    /// The day's records, oldest first, for narrative display.
    pub records: Vec<Record>,
}

impl DailyReport {
    /// True when the day has no records; adapters render an empty state.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records_by(&self, author: Author) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(move |record| record.author == author)
    }
}

/// Builds the report for `day` from the full set.
///
/// The set is newest-first; the report lists the same records in reverse so
/// the day reads from morning to night. Ties keep set order.
pub fn build_daily_report(records: &[Record], day: &CalendarDay) -> DailyReport {
    let mut todays: Vec<Record> = records
        .iter()
        .filter(|record| day.contains(&record.created_at))
        .cloned()
        .collect();
    todays.sort_by_key(|record| record.created_at);

    DailyReport {
        date: day.date(),
        counts: count_by_author(&todays),
        records: todays,
    }
}

/// Short shareable summary of a report.
pub fn format_share_text(report: &DailyReport, date_label: &str) -> String {
    format!(
        "{SHARE_TITLE} {date_label}\n{}的记录: {}条\n{}的记录: {}条\n\n{SHARE_TAGLINE}",
        Author::Girl.label(),
        report.counts.girl,
        Author::Boy.label(),
        report.counts.boy,
    )
}

/// Numeric date label, e.g. `2026/10/16`.
pub fn share_date_label(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.year(), date.month(), date.day())
}

/// Long heading shown above the report, e.g. `2026年10月16日星期五`.
pub fn report_heading(date: NaiveDate) -> String {
    format!(
        "{}年{}月{}日{}",
        date.year(),
        date.month(),
        date.day(),
        weekday_label(date.weekday())
    )
}

fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "星期一",
        Weekday::Tue => "星期二",
        Weekday::Wed => "星期三",
        Weekday::Thu => "星期四",
        Weekday::Fri => "星期五",
        Weekday::Sat => "星期六",
        Weekday::Sun => "星期日",
    }
}
