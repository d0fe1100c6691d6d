//! Display filtering over the record set.
//!
//! # Invariants
//! - Output is a subsequence of the input in input order.
//! - The author and scope axes are independent; composition order is irrelevant.
//! - No match is an empty list, never an error.

use crate::model::day::CalendarDay;
use crate::model::record::{Author, Record};

/// Author axis of the feed filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthorFilter {
    #[default]
    All,
    Only(Author),
}

impl AuthorFilter {
    pub fn matches(self, author: Author) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == author,
        }
    }

    /// Parses `all` or an author wire name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "all" => Some(Self::All),
            other => Author::parse(other).map(Self::Only),
        }
    }
}

/// Time axis of the feed filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScopeFilter {
    #[default]
    Today,
    AllTime,
}

impl ScopeFilter {
    pub fn matches(self, record: &Record, today: &CalendarDay) -> bool {
        match self {
            Self::Today => today.contains(&record.created_at),
            Self::AllTime => true,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "today" => Some(Self::Today),
            "all" | "all_time" => Some(Self::AllTime),
            _ => None,
        }
    }
}

/// Both filter axes as chosen in the feed view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterState {
    pub author: AuthorFilter,
    pub scope: ScopeFilter,
}

impl FilterState {
    pub fn new(author: AuthorFilter, scope: ScopeFilter) -> Self {
        Self { author, scope }
    }

    pub fn matches(&self, record: &Record, today: &CalendarDay) -> bool {
        self.author.matches(record.author) && self.scope.matches(record, today)
    }
}

/// Records to show in the feed for `filters`, preserving set order.
pub fn select_display_records<'a>(
    records: &'a [Record],
    filters: &FilterState,
    today: &CalendarDay,
) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|record| filters.matches(record, today))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{AuthorFilter, ScopeFilter};
    use crate::model::record::Author;

    #[test]
    fn parse_accepts_view_names() {
        assert_eq!(AuthorFilter::parse("all"), Some(AuthorFilter::All));
        assert_eq!(
            AuthorFilter::parse("boy"),
            Some(AuthorFilter::Only(Author::Boy))
        );
        assert_eq!(AuthorFilter::parse("both"), None);
        assert_eq!(ScopeFilter::parse("today"), Some(ScopeFilter::Today));
        assert_eq!(ScopeFilter::parse("all"), Some(ScopeFilter::AllTime));
    }

    #[test]
    fn defaults_match_initial_feed_view() {
        let state = super::FilterState::default();
        assert_eq!(state.author, AuthorFilter::All);
        assert_eq!(state.scope, ScopeFilter::Today);
    }
}
