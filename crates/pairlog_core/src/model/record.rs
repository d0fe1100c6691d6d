//! Journal record domain model.
//!
//! # Responsibility
//! - Define the canonical record shared by every provider and view.
//! - Own the single write-side validation rule for new entries.
//!
//! # Invariants
//! - A record carries non-empty `text` or a present `image`, never neither.
//! - `author` and `time_period` are always drawn from their closed sets.
//! - Records are immutable after creation; there is no edit path.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Creation-time-derived identifier (epoch milliseconds, bumped on collision).
pub type RecordId = i64;

/// One of the two fixed participants of a shared journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    /// First user; the journal owner's own entries.
    Girl,
    /// Second user; the partner's entries.
    Boy,
}

impl Author {
    pub const ALL: [Author; 2] = [Author::Girl, Author::Boy];

    /// Stable wire name used by every provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Girl => "girl",
            Self::Boy => "boy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "girl" => Some(Self::Girl),
            "boy" => Some(Self::Boy),
            _ => None,
        }
    }

    /// Short display label shown next to each entry.
    pub fn label(self) -> &'static str {
        match self {
            Self::Girl => "我",
            Self::Boy => "他",
        }
    }
}

impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse, user-chosen part of the day an entry belongs to.
///
/// Never derived from the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Morning,
    Noon,
    Afternoon,
    Evening,
    Night,
}

impl TimePeriod {
    pub const ALL: [TimePeriod; 5] = [
        TimePeriod::Morning,
        TimePeriod::Noon,
        TimePeriod::Afternoon,
        TimePeriod::Evening,
        TimePeriod::Night,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Noon => "noon",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "morning" => Some(Self::Morning),
            "noon" => Some(Self::Noon),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            "night" => Some(Self::Night),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "早晨",
            Self::Noon => "中午",
            Self::Afternoon => "下午",
            Self::Evening => "晚上",
            Self::Night => "深夜",
        }
    }
}

impl Display for TimePeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failure for record drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordValidationError {
    /// Both `text` and `image` are absent.
    MissingContent,
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingContent => write!(f, "record requires non-empty text or an image"),
        }
    }
}

impl Error for RecordValidationError {}

/// Canonical journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub author: Author,
    pub time_period: TimePeriod,
    /// Trimmed text body; empty only when `image` is present.
    pub text: String,
    /// Opaque image payload (typically a data URL), passed through unchanged.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    /// UTC calendar date of `created_at`, mirrored to the remote table.
    pub record_date: NaiveDate,
}

impl Record {
    /// Materializes a validated draft with identity and creation time.
    pub fn from_draft(id: RecordId, draft: RecordDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            author: draft.author,
            time_period: draft.time_period,
            text: draft.text,
            image: draft.image,
            created_at,
            record_date: created_at.date_naive(),
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// User input for a new record, before identity and timestamp are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub author: Author,
    pub time_period: TimePeriod,
    pub text: String,
    pub image: Option<String>,
}

impl RecordDraft {
    pub fn new(author: Author, time_period: TimePeriod) -> Self {
        Self {
            author,
            time_period,
            text: String::new(),
            image: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Trims text and drops an empty image payload.
    pub fn normalized(mut self) -> Self {
        let trimmed = self.text.trim();
        if trimmed.len() != self.text.len() {
            self.text = trimmed.to_string();
        }
        if self.image.as_deref().is_some_and(str::is_empty) {
            self.image = None;
        }
        self
    }

    /// Checks the content rule on an already normalized draft.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.text.is_empty() && self.image.is_none() {
            return Err(RecordValidationError::MissingContent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Author, RecordDraft, RecordValidationError, TimePeriod};

    #[test]
    fn draft_without_text_or_image_is_rejected() {
        let draft = RecordDraft::new(Author::Girl, TimePeriod::Morning)
            .with_text("   \n")
            .normalized();
        assert_eq!(draft.validate(), Err(RecordValidationError::MissingContent));

        let empty_image = RecordDraft::new(Author::Boy, TimePeriod::Night)
            .with_image("")
            .normalized();
        assert!(empty_image.image.is_none());
        assert!(empty_image.validate().is_err());
    }

    #[test]
    fn image_only_draft_is_valid() {
        let draft = RecordDraft::new(Author::Boy, TimePeriod::Evening)
            .with_image("data:image/png;base64,AAAA")
            .normalized();
        assert!(draft.validate().is_ok());
        assert!(draft.text.is_empty());
    }

    #[test]
    fn wire_names_round_trip_through_parse() {
        for author in Author::ALL {
            assert_eq!(Author::parse(author.as_str()), Some(author));
        }
        for period in TimePeriod::ALL {
            assert_eq!(TimePeriod::parse(period.as_str()), Some(period));
        }
        assert_eq!(Author::parse("cat"), None);
        assert_eq!(TimePeriod::parse("dusk"), None);
    }

    #[test]
    fn serde_uses_lowercase_wire_names() {
        let json = serde_json::to_string(&(Author::Girl, TimePeriod::Afternoon))
            .expect("enums should serialize");
        assert_eq!(json, r#"["girl","afternoon"]"#);
    }
}
