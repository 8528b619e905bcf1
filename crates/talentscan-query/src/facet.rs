//! Filter facet selections.
//!
//! Each facet is an independent dimension of the mailbox filter. A facet
//! left at its default selection contributes nothing to the compiled query.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::{ParseFacetError, Result};

/// Predefined subject keyword groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeywordPreset {
    /// Job applications and recruitment mail.
    Job,
    /// Sales conversations.
    Sales,
    /// Marketing campaigns.
    Marketing,
    /// Invoices and billing.
    Invoice,
    /// Reports and reviews.
    Reports,
    /// Project updates.
    Projects,
    /// Meeting invitations.
    Meetings,
}

impl KeywordPreset {
    /// All presets in display order.
    pub const ALL: [Self; 7] = [
        Self::Job,
        Self::Sales,
        Self::Marketing,
        Self::Invoice,
        Self::Reports,
        Self::Projects,
        Self::Meetings,
    ];

    /// Option key as used by the filter UI.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Sales => "sales",
            Self::Marketing => "marketing",
            Self::Invoice => "invoice",
            Self::Reports => "reports",
            Self::Projects => "projects",
            Self::Meetings => "meetings",
        }
    }

    /// Provider query fragment for this preset.
    #[must_use]
    pub const fn query(self) -> &'static str {
        match self {
            Self::Job => {
                "subject:(job OR application OR resume OR cv OR hiring OR vacancy OR career OR \
                 candidate OR role OR position OR developer OR engineer OR opportunity OR opening \
                 OR recruitment OR interview)"
            }
            Self::Sales => "subject:(sales OR quotation OR proposal OR pricing OR order OR deal)",
            Self::Marketing => {
                "subject:(marketing OR campaign OR leads OR promotion OR newsletter)"
            }
            Self::Invoice => "subject:(invoice OR payment OR bill OR receipt OR amount OR due)",
            Self::Reports => {
                "subject:(report OR analysis OR summary OR review OR monthly OR weekly)"
            }
            Self::Projects => {
                "subject:(project OR milestone OR deliverable OR deadline OR update)"
            }
            Self::Meetings => "subject:(meeting OR call OR schedule OR agenda OR invite)",
        }
    }
}

impl fmt::Display for KeywordPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for KeywordPreset {
    type Err = ParseFacetError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|preset| preset.key() == key)
            .ok_or_else(|| ParseFacetError::unknown("keyword", s))
    }
}

/// Keyword facet selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum KeywordSelection {
    /// No keyword filter.
    #[default]
    None,
    /// One of the predefined keyword groups.
    Preset(KeywordPreset),
    /// Free-text subject phrase. Blank text contributes nothing.
    Custom(String),
}

impl KeywordSelection {
    /// Returns true if nothing is selected.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Time range facet selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimeRange {
    /// No age restriction.
    #[default]
    AllTime,
    /// Received within the last day.
    Today,
    /// Received within the last 3 days.
    Last3Days,
    /// Received within the last 7 days.
    Last7Days,
    /// Received within the last 30 days.
    Last30Days,
    /// Received within the last 90 days.
    Last3Months,
    /// Received within the last 180 days.
    Last6Months,
    /// Received within the last 365 days.
    LastYear,
    /// Explicit date window. Without a start date the range contributes nothing.
    Custom {
        /// Inclusive start date.
        from: Option<NaiveDate>,
        /// Exclusive end date.
        to: Option<NaiveDate>,
    },
}

impl TimeRange {
    /// Option key as used by the filter UI.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::AllTime => "",
            Self::Today => "today",
            Self::Last3Days => "3days",
            Self::Last7Days => "7days",
            Self::Last30Days => "30days",
            Self::Last3Months => "3months",
            Self::Last6Months => "6months",
            Self::LastYear => "year",
            Self::Custom { .. } => "custom",
        }
    }

    /// Relative-age fragment for preset ranges, `None` for all-time and custom.
    #[must_use]
    pub const fn preset_query(&self) -> Option<&'static str> {
        match self {
            Self::AllTime | Self::Custom { .. } => None,
            Self::Today => Some("newer_than:1d"),
            Self::Last3Days => Some("newer_than:3d"),
            Self::Last7Days => Some("newer_than:7d"),
            Self::Last30Days => Some("newer_than:30d"),
            Self::Last3Months => Some("newer_than:90d"),
            Self::Last6Months => Some("newer_than:180d"),
            Self::LastYear => Some("newer_than:365d"),
        }
    }

    /// Builds a custom range from `YYYY-MM-DD` strings. Blank strings mean "unset".
    ///
    /// # Errors
    ///
    /// Returns an error if a non-blank value is not a valid date.
    pub fn custom_from_strs(from: &str, to: &str) -> Result<Self> {
        Ok(Self::Custom {
            from: parse_optional_date(from)?,
            to: parse_optional_date(to)?,
        })
    }
}

fn parse_optional_date(value: &str) -> Result<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ParseFacetError::InvalidDate {
            value: value.to_string(),
        })
}

impl FromStr for TimeRange {
    type Err = ParseFacetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" | "alltime" => Ok(Self::AllTime),
            "today" => Ok(Self::Today),
            "3days" => Ok(Self::Last3Days),
            "7days" => Ok(Self::Last7Days),
            "30days" => Ok(Self::Last30Days),
            "3months" => Ok(Self::Last3Months),
            "6months" => Ok(Self::Last6Months),
            "year" => Ok(Self::LastYear),
            "custom" => Ok(Self::Custom {
                from: None,
                to: None,
            }),
            _ => Err(ParseFacetError::unknown("time range", s)),
        }
    }
}

/// Attachment kinds. Selections are OR-combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttachmentKind {
    /// Any attachment at all. Subsumes every other kind.
    Any,
    /// PDF documents.
    Pdf,
    /// Word documents.
    Word,
    /// Spreadsheets.
    Excel,
    /// Images.
    Images,
}

impl AttachmentKind {
    /// All kinds in display order.
    pub const ALL: [Self; 5] = [Self::Any, Self::Pdf, Self::Word, Self::Excel, Self::Images];

    /// Option key as used by the filter UI.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Pdf => "pdf",
            Self::Word => "word",
            Self::Excel => "excel",
            Self::Images => "images",
        }
    }

    /// Filename term for this kind, or `None` when any filename matches.
    #[must_use]
    pub const fn query(self) -> Option<&'static str> {
        match self {
            Self::Any => None,
            Self::Pdf => Some("filename:pdf"),
            Self::Word => Some("(filename:doc OR filename:docx)"),
            Self::Excel => Some("(filename:xlsx OR filename:xls OR filename:csv)"),
            Self::Images => Some("(filename:jpg OR filename:png OR filename:jpeg)"),
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AttachmentKind {
    type Err = ParseFacetError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == key)
            .ok_or_else(|| ParseFacetError::unknown("attachment", s))
    }
}

/// Named job boards a message can come from. Selections are OR-combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceBoard {
    /// LinkedIn.
    Linkedin,
    /// Indeed.
    Indeed,
    /// Naukri.
    Naukri,
    /// Monster.
    Monster,
    /// Glassdoor.
    Glassdoor,
}

impl SourceBoard {
    /// All boards in display order.
    pub const ALL: [Self; 5] = [
        Self::Linkedin,
        Self::Indeed,
        Self::Naukri,
        Self::Monster,
        Self::Glassdoor,
    ];

    /// Option key as used by the filter UI.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Linkedin => "linkedin",
            Self::Indeed => "indeed",
            Self::Naukri => "naukri",
            Self::Monster => "monster",
            Self::Glassdoor => "glassdoor",
        }
    }

    /// Sender term for this board.
    #[must_use]
    pub const fn query(self) -> &'static str {
        match self {
            Self::Linkedin => "from:linkedin",
            Self::Indeed => "from:indeed",
            Self::Naukri => "from:naukri",
            Self::Monster => "from:monster",
            Self::Glassdoor => "from:glassdoor",
        }
    }
}

impl fmt::Display for SourceBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SourceBoard {
    type Err = ParseFacetError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|board| board.key() == key)
            .ok_or_else(|| ParseFacetError::unknown("source", s))
    }
}

/// Mailbox states. Each selected status is its own AND-ed term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MailStatus {
    /// Not yet read.
    Unread,
    /// Already read.
    Read,
    /// Starred by the user.
    Starred,
    /// Marked important.
    Important,
    /// Still in the inbox.
    Inbox,
}

impl MailStatus {
    /// All statuses in display order.
    pub const ALL: [Self; 5] = [
        Self::Unread,
        Self::Read,
        Self::Starred,
        Self::Important,
        Self::Inbox,
    ];

    /// Option key as used by the filter UI.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Starred => "starred",
            Self::Important => "important",
            Self::Inbox => "inbox",
        }
    }

    /// Query term for this status.
    #[must_use]
    pub const fn query(self) -> &'static str {
        match self {
            Self::Unread => "is:unread",
            Self::Read => "is:read",
            Self::Starred => "is:starred",
            Self::Important => "is:important",
            Self::Inbox => "in:inbox",
        }
    }
}

impl fmt::Display for MailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MailStatus {
    type Err = ParseFacetError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.key() == key)
            .ok_or_else(|| ParseFacetError::unknown("status", s))
    }
}

/// The complete set of facet selections for one scan.
///
/// Multi-select facets are kept as ordered sets, so the order in which the
/// user picked options never changes the compiled query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterFacets {
    /// Keyword selection.
    pub keyword: KeywordSelection,
    /// Time range selection.
    pub time_range: TimeRange,
    /// Selected attachment kinds.
    pub attachments: BTreeSet<AttachmentKind>,
    /// Selected job boards.
    pub sources: BTreeSet<SourceBoard>,
    /// Free-text sender address, OR-ed with the selected boards.
    pub source_address: String,
    /// Selected mailbox statuses.
    pub statuses: BTreeSet<MailStatus>,
}

impl FilterFacets {
    /// Creates an empty selection (compiles to "no filter").
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a keyword preset.
    #[must_use]
    pub fn with_keyword_preset(mut self, preset: KeywordPreset) -> Self {
        self.keyword = KeywordSelection::Preset(preset);
        self
    }

    /// Selects a custom subject keyword.
    #[must_use]
    pub fn with_custom_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = KeywordSelection::Custom(keyword.into());
        self
    }

    /// Selects a time range.
    #[must_use]
    pub const fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }

    /// Adds an attachment kind.
    #[must_use]
    pub fn with_attachment(mut self, kind: AttachmentKind) -> Self {
        self.attachments.insert(kind);
        self
    }

    /// Adds a job board source.
    #[must_use]
    pub fn with_source(mut self, board: SourceBoard) -> Self {
        self.sources.insert(board);
        self
    }

    /// Sets the custom sender address.
    #[must_use]
    pub fn with_source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = address.into();
        self
    }

    /// Adds a mailbox status.
    #[must_use]
    pub fn with_status(mut self, status: MailStatus) -> Self {
        self.statuses.insert(status);
        self
    }

    /// Number of facets with a non-default selection.
    #[must_use]
    pub fn active_count(&self) -> usize {
        [
            !self.keyword.is_none(),
            self.time_range != TimeRange::AllTime,
            !self.attachments.is_empty(),
            !self.sources.is_empty() || !self.source_address.trim().is_empty(),
            !self.statuses.is_empty(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    /// Clears every facet back to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
