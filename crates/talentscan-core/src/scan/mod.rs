//! Mailbox scan orchestration.
//!
//! A [`ScanSession`] starts a server-side scan, polls its progress until a
//! terminal status, then reconciles the records the scan added. State is
//! published as [`ScanSnapshot`]s on a watch channel.

mod model;
mod session;

pub use model::{
    ScanFailure, ScanNotice, ScanProgress, ScanReport, ScanSnapshot, ScanState, ScanStatus,
};
pub use session::{ScanHandle, ScanSession, ScanTimings};
pub(crate) use session::SCAN_REQUEST_FAILED;

use async_trait::async_trait;
use serde::Serialize;

use crate::Result;

/// Body of `POST /scan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRequest<'a> {
    /// Provider search query; `None` scans without a filter.
    pub search_query: Option<&'a str>,
    /// Acting recruiter.
    pub recruiter_id: Option<&'a str>,
}

/// Server endpoints driving a scan.
#[async_trait]
pub trait ScanApi: Send + Sync {
    /// Starts a scan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`](crate::Error::Unauthenticated) if the
    /// token was rejected, [`Error::RequestFailed`](crate::Error::RequestFailed)
    /// for any other non-success status, or a transport error.
    async fn start_scan(&self, request: &ScanRequest<'_>, token: &str) -> Result<()>;

    /// Fetches the current progress report.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be parsed.
    async fn progress(&self) -> Result<ScanProgress>;

    /// Resets the server-side scan state.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn reset_session(&self) -> Result<()>;
}
