//! Scan progress and state types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::candidates::Candidate;

/// Server-reported scan status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// No scan has run since the last reset.
    #[default]
    Idle,
    /// Searching the mailbox.
    Fetching,
    /// Ingesting matched messages.
    Processing,
    /// Finished successfully.
    Complete,
    /// Finished with an error.
    Error,
    /// A status this client does not know. Treated as still running.
    #[serde(other)]
    Unknown,
}

impl ScanStatus {
    /// Returns true for statuses after which polling stops.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Unknown => "unknown",
        })
    }
}

/// Body of `GET /scan-progress`. Fields are surfaced as the server reports them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanProgress {
    /// Server batch identifier of the running scan.
    pub batch_id: Option<String>,
    /// Scan status.
    pub status: ScanStatus,
    /// Messages matched by the query.
    pub total_emails: u64,
    /// Messages processed so far.
    pub processed_emails: u64,
    /// Candidate records created.
    pub candidates_added: u64,
    /// Messages skipped (duplicates, no attachment).
    pub skipped: u64,
    /// Messages that failed to process.
    pub errors: u64,
    /// Subject of the message being processed.
    pub current_subject: String,
    /// Human-readable status line.
    pub message: String,
}

impl ScanProgress {
    /// Percentage of matched messages processed, if the total is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> Option<f64> {
        (self.total_emails > 0).then(|| {
            (self.processed_emails.min(self.total_emails) as f64 / self.total_emails as f64)
                * 100.0
        })
    }

    /// Number of records this scan added, as a collection length.
    #[must_use]
    pub fn added(&self) -> usize {
        usize::try_from(self.candidates_added).unwrap_or(usize::MAX)
    }
}

/// Why a scan ended in the error state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    /// No session token; nothing was sent to the server.
    Unauthenticated,
    /// The start request was refused or could not be sent.
    RequestFailed(String),
    /// The server reported an error while scanning.
    Remote(String),
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("Session expired. Please login again."),
            Self::RequestFailed(reason) | Self::Remote(reason) => f.write_str(reason),
        }
    }
}

/// Non-fatal condition reported alongside a successful scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanNotice {
    /// The scan completed but its new records could not be fetched.
    PartialSuccess {
        /// Records the server reported as added.
        candidates_added: u64,
        /// Why the fetch failed.
        reason: String,
    },
}

impl fmt::Display for ScanNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartialSuccess {
                candidates_added,
                reason,
            } => write!(
                f,
                "Scan complete, {candidates_added} candidates added, but they could not be loaded: {reason}"
            ),
        }
    }
}

/// Client-side scan state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Nothing running.
    #[default]
    Idle,
    /// Start request in flight.
    Starting,
    /// Polling progress.
    Polling,
    /// Finished successfully; results are available.
    Complete,
    /// Finished with a failure.
    Error(ScanFailure),
}

impl ScanState {
    /// Returns true while a scan is starting or polling.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Starting | Self::Polling)
    }

    /// Returns true for `Complete` and `Error`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error(_))
    }
}

/// Everything a presentation layer needs to render the scan panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanSnapshot {
    /// Current state.
    pub state: ScanState,
    /// Most recent progress report.
    pub progress: Option<ScanProgress>,
    /// Records added by the last completed scan.
    pub results: Vec<Candidate>,
    /// Non-fatal notice from the last completed scan.
    pub notice: Option<ScanNotice>,
    /// Scan this snapshot belongs to. Increases with every start.
    pub generation: u64,
    /// Last applied progress response within the generation.
    pub sequence: u64,
}

impl ScanSnapshot {
    /// Applies a progress response unless it belongs to an older scan or is
    /// older than the last applied response. Returns true if applied.
    pub fn apply_progress(
        &mut self,
        generation: u64,
        sequence: u64,
        progress: ScanProgress,
    ) -> bool {
        if generation != self.generation || sequence <= self.sequence {
            return false;
        }
        self.sequence = sequence;
        self.progress = Some(progress);
        true
    }
}

/// Final outcome of a scan, delivered through [`ScanHandle::finished`](super::ScanHandle::finished).
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    /// Terminal progress report.
    pub progress: ScanProgress,
    /// Records added by this scan, newest first.
    pub candidates: Vec<Candidate>,
    /// Non-fatal notice.
    pub notice: Option<ScanNotice>,
}

impl ScanReport {
    /// Returns true if the server reported success.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.progress.status == ScanStatus::Complete
    }
}
