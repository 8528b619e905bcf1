//! Candidate records and search parameters.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Server-side candidate identifier. Older servers issue integers, newer ones strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateId {
    /// Numeric id.
    Number(i64),
    /// Opaque string id.
    Text(String),
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A candidate record as returned by the server.
///
/// Only the fields the client reads are typed; everything else the server
/// sends is kept in [`extra`](Self::extra) for presentation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Candidate {
    /// Record id.
    #[serde(default)]
    pub id: Option<CandidateId>,
    /// Stable identifier tied to the source message.
    #[serde(default)]
    pub unique_id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Contact address.
    #[serde(default)]
    pub email: Option<String>,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Current job title.
    #[serde(default)]
    pub current_designation: Option<String>,
    /// Current employer.
    #[serde(default)]
    pub current_company: Option<String>,
    /// Subject of the source message.
    #[serde(default)]
    pub email_subject: Option<String>,
    /// Creation timestamp (ISO 8601).
    #[serde(default)]
    pub created_at: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Candidate {
    /// Parses [`created_at`](Self::created_at) as a UTC timestamp.
    ///
    /// Accepts RFC 3339 and the offset-less ISO form servers commonly emit.
    #[must_use]
    pub fn created_at_time(&self) -> Option<NaiveDateTime> {
        let raw = self.created_at.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.naive_utc())
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
    }

    /// Name to display, falling back to the contact address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Unknown")
    }
}

/// Saved-record search parameters. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidateQuery {
    /// Free-text match on name, email, phone and subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// CV freshness bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_freshness: Option<String>,
    /// Experience bucket (`0-1`, `1-3`, `3-5`, `5-10`, `10+`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<String>,
    /// Degree substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education_degree: Option<String>,
    /// Location substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residence_location: Option<String>,
    /// Gender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Language the CV is written in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_language: Option<String>,
    /// Nationality substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    /// Minimum age, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_min: Option<u32>,
    /// Maximum age, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_max: Option<u32>,
    /// Spoken language substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<String>,
    /// Marital status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<String>,
    /// Career level (`entry`, `mid`, `senior`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career_level: Option<String>,
    /// Field of study substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    /// Records to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    /// Maximum records to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl CandidateQuery {
    /// Query matching `text` against name, email, phone and subject.
    #[must_use]
    pub fn search(text: impl Into<String>) -> Self {
        Self::default().with_search(text)
    }

    /// Sets the free-text search, ignoring blank input.
    #[must_use]
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        let text = text.trim();
        self.search = (!text.is_empty()).then(|| text.to_string());
        self
    }

    /// Restricts to candidates aged `min..=max`. Either bound may be open.
    #[must_use]
    pub const fn with_age(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.age_min = min;
        self.age_max = max;
        self
    }

    /// Sets the page window.
    #[must_use]
    pub fn with_page(mut self, skip: u32, limit: u32) -> Self {
        self.skip = Some(skip);
        self.limit = Some(limit);
        self
    }
}
