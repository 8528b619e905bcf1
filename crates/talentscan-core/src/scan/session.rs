//! Scan state machine.
//!
//! ```text
//! idle -> starting -> polling -> complete | error -> (display grace) -> idle
//! ```
//!
//! Each start bumps a generation number. Every snapshot write is tagged with
//! the generation that produced it and dropped if a newer scan has started,
//! so an abandoned loop can never overwrite the current one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use talentscan_auth::SessionStore;
use talentscan_query::CompiledQuery;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::model::{
    ScanFailure, ScanNotice, ScanProgress, ScanReport, ScanSnapshot, ScanState, ScanStatus,
};
use super::{ScanApi, ScanRequest};
use crate::candidates::{Candidate, CandidateRepository};
use crate::error::{Error, Result};

/// Reason shown when the start request does not succeed.
pub(crate) const SCAN_REQUEST_FAILED: &str = "scan request failed";

/// Timing of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTimings {
    /// Delay between progress polls.
    pub poll_interval: Duration,
    /// Delay before retrying after a failed poll.
    pub retry_interval: Duration,
    /// How long a terminal state is shown before resetting to idle.
    pub display_grace: Duration,
}

impl Default for ScanTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            retry_interval: Duration::from_millis(1000),
            display_grace: Duration::from_secs(5),
        }
    }
}

/// Handle to a running scan.
///
/// Dropping the handle does not stop the scan; the session keeps polling
/// and publishing snapshots.
#[derive(Debug)]
pub struct ScanHandle {
    generation: u64,
    cancel: CancellationToken,
    report: oneshot::Receiver<ScanReport>,
}

impl ScanHandle {
    /// Generation of the scan this handle controls.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Stops polling. The server-side scan job keeps running.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Returns true once polling has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the terminal report. Returns `None` if polling was stopped first.
    pub async fn finished(self) -> Option<ScanReport> {
        self.report.await.ok()
    }
}

struct ActiveScan {
    cancel: CancellationToken,
    /// `None` while the start request is still in flight.
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Control {
    generation: u64,
    active: Option<ActiveScan>,
}

struct Shared {
    api: Arc<dyn ScanApi>,
    candidates: Arc<dyn CandidateRepository>,
    timings: ScanTimings,
    state: watch::Sender<ScanSnapshot>,
}

impl Shared {
    /// Modifies the snapshot if it still belongs to `generation`.
    fn update(&self, generation: u64, modify: impl FnOnce(&mut ScanSnapshot)) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.generation != generation {
                return false;
            }
            modify(snapshot);
            true
        })
    }

    async fn run(&self, generation: u64, report: oneshot::Sender<ScanReport>) {
        let (sequence, progress) = self.poll_until_terminal(generation).await;
        let outcome = self.finish(generation, sequence, progress).await;
        // The caller may have dropped its handle; the snapshot already has everything
        let _ = report.send(outcome);

        tokio::time::sleep(self.timings.display_grace).await;
        self.update(generation, reset_to_idle);
    }

    async fn poll_until_terminal(&self, generation: u64) -> (u64, ScanProgress) {
        let mut sequence = 0;
        loop {
            let delay = match self.api.progress().await {
                Ok(progress) => {
                    sequence += 1;
                    debug!(
                        generation,
                        sequence,
                        status = %progress.status,
                        processed = progress.processed_emails,
                        total = progress.total_emails,
                        "Scan progress"
                    );
                    if progress.status.is_terminal() {
                        return (sequence, progress);
                    }
                    self.state
                        .send_if_modified(|s| s.apply_progress(generation, sequence, progress));
                    self.timings.poll_interval
                }
                Err(e) => {
                    debug!("Progress poll failed, retrying: {e}");
                    self.timings.retry_interval
                }
            };
            tokio::time::sleep(delay).await;
        }
    }

    async fn finish(&self, generation: u64, sequence: u64, progress: ScanProgress) -> ScanReport {
        let (state, candidates, notice) = if progress.status == ScanStatus::Complete {
            info!(
                candidates_added = progress.candidates_added,
                "Scan complete"
            );
            let (candidates, notice) = self.fetch_added(&progress).await;
            (ScanState::Complete, candidates, notice)
        } else {
            let reason = if progress.message.trim().is_empty() {
                "Scan failed".to_string()
            } else {
                progress.message.clone()
            };
            warn!("Scan failed on the server: {reason}");
            (
                ScanState::Error(ScanFailure::Remote(reason)),
                Vec::new(),
                None,
            )
        };

        self.update(generation, |snapshot| {
            snapshot.state = state;
            snapshot.sequence = sequence;
            snapshot.progress = Some(progress.clone());
            snapshot.results.clone_from(&candidates);
            snapshot.notice.clone_from(&notice);
        });

        ScanReport {
            progress,
            candidates,
            notice,
        }
    }

    /// Fetches the records this scan added: the head of the newest-first collection.
    async fn fetch_added(&self, progress: &ScanProgress) -> (Vec<Candidate>, Option<ScanNotice>) {
        let added = progress.added();
        if added == 0 {
            return (Vec::new(), None);
        }

        match self.candidates.fetch_recent(added).await {
            Ok(mut candidates) => {
                candidates.truncate(added);
                debug!("Loaded {} new candidates", candidates.len());
                (candidates, None)
            }
            Err(e) => {
                warn!("Scan complete but new candidates could not be loaded: {e}");
                (
                    Vec::new(),
                    Some(ScanNotice::PartialSuccess {
                        candidates_added: progress.candidates_added,
                        reason: e.to_string(),
                    }),
                )
            }
        }
    }
}

fn reset_to_idle(snapshot: &mut ScanSnapshot) {
    snapshot.state = ScanState::Idle;
    snapshot.progress = None;
    snapshot.notice = None;
}

async fn poll_task(
    shared: Arc<Shared>,
    generation: u64,
    cancel: CancellationToken,
    report: oneshot::Sender<ScanReport>,
) {
    tokio::select! {
        () = cancel.cancelled() => {
            debug!("Scan {generation} polling stopped");
            shared.update(generation, reset_to_idle);
        }
        () = shared.run(generation, report) => {}
    }
}

async fn grace_task(shared: Arc<Shared>, generation: u64, cancel: CancellationToken) {
    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(shared.timings.display_grace) => {}
    }
    shared.update(generation, reset_to_idle);
}

async fn stop_active(control: &mut Control) {
    if let Some(active) = control.active.take() {
        active.cancel.cancel();
        if let Some(task) = active.task
            && let Err(e) = task.await
        {
            warn!("Scan task ended abnormally: {e}");
        }
    }
}

/// Drives one scan at a time and publishes its state.
pub struct ScanSession {
    store: Arc<SessionStore>,
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl ScanSession {
    /// Creates an idle session.
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        api: Arc<dyn ScanApi>,
        candidates: Arc<dyn CandidateRepository>,
        timings: ScanTimings,
    ) -> Self {
        let (state, _) = watch::channel(ScanSnapshot::default());
        Self {
            store,
            shared: Arc::new(Shared {
                api,
                candidates,
                timings,
                state,
            }),
            control: Mutex::new(Control::default()),
        }
    }

    /// Subscribes to snapshot updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.shared.state.subscribe()
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ScanSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Starts a scan for `query`.
    ///
    /// Any scan already being polled is stopped, and its task awaited, before
    /// the start request is sent. Without a session token the state moves
    /// straight to [`ScanFailure::Unauthenticated`] and nothing is sent.
    ///
    /// The start request can itself be abandoned by [`stop`](Self::stop),
    /// [`reset_remote`](Self::reset_remote) or a newer `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] if there is no token or the server
    /// rejected it, [`Error::Cancelled`] if the start was abandoned, or the
    /// start request's error. The published state carries the failure either
    /// way.
    pub async fn start(&self, query: &CompiledQuery) -> Result<ScanHandle> {
        let (generation, token, cancel) = {
            let mut control = self.control.lock().await;
            stop_active(&mut control).await;
            control.generation += 1;
            let generation = control.generation;

            let Some(token) = self.store.token() else {
                warn!("Scan requested without a session token");
                self.fail(&mut control, generation, ScanFailure::Unauthenticated);
                return Err(Error::Unauthenticated);
            };

            self.shared.state.send_replace(ScanSnapshot {
                state: ScanState::Starting,
                generation,
                ..ScanSnapshot::default()
            });

            let cancel = CancellationToken::new();
            control.active = Some(ActiveScan {
                cancel: cancel.clone(),
                task: None,
            });
            (generation, token, cancel)
        };

        let recruiter_id = self.store.identity().map(|identity| identity.id);
        let request = ScanRequest {
            search_query: query.as_search_query(),
            recruiter_id: recruiter_id.as_deref(),
        };
        info!(generation, query = query.as_str(), "Starting scan");

        let sent = tokio::select! {
            () = cancel.cancelled() => None,
            sent = self.shared.api.start_scan(&request, &token) => Some(sent),
        };

        let mut control = self.control.lock().await;
        let Some(sent) = sent.filter(|_| !cancel.is_cancelled()) else {
            debug!("Scan {generation} abandoned before the server accepted it");
            self.shared.update(generation, reset_to_idle);
            return Err(Error::Cancelled);
        };

        if let Err(e) = sent {
            warn!("Scan request failed: {e}");
            let failure = if matches!(e, Error::Unauthenticated) {
                if let Err(clear) = self.store.clear().await {
                    warn!("Failed to clear rejected session: {clear}");
                }
                ScanFailure::Unauthenticated
            } else {
                ScanFailure::RequestFailed(SCAN_REQUEST_FAILED.to_string())
            };
            self.fail(&mut control, generation, failure);
            return Err(e);
        }

        self.shared
            .update(generation, |snapshot| snapshot.state = ScanState::Polling);

        let (report_tx, report_rx) = oneshot::channel();
        let task = tokio::spawn(poll_task(
            Arc::clone(&self.shared),
            generation,
            cancel.clone(),
            report_tx,
        ));
        control.active = Some(ActiveScan {
            cancel: cancel.clone(),
            task: Some(task),
        });

        Ok(ScanHandle {
            generation,
            cancel,
            report: report_rx,
        })
    }

    /// Stops polling the current scan and returns to idle.
    pub async fn stop(&self) {
        let mut control = self.control.lock().await;
        stop_active(&mut control).await;
    }

    /// Resets the server-side scan state (best effort) and returns to idle.
    pub async fn reset_remote(&self) {
        let mut control = self.control.lock().await;
        stop_active(&mut control).await;
        control.generation += 1;

        if let Err(e) = self.shared.api.reset_session().await {
            warn!("Failed to reset server scan session: {e}");
        }
        self.shared.state.send_replace(ScanSnapshot {
            generation: control.generation,
            ..ScanSnapshot::default()
        });
        info!("Scan session reset");
    }

    fn fail(&self, control: &mut Control, generation: u64, failure: ScanFailure) {
        self.shared.state.send_replace(ScanSnapshot {
            state: ScanState::Error(failure),
            generation,
            ..ScanSnapshot::default()
        });

        let cancel = CancellationToken::new();
        let task = tokio::spawn(grace_task(
            Arc::clone(&self.shared),
            generation,
            cancel.clone(),
        ));
        control.active = Some(ActiveScan {
            cancel,
            task: Some(task),
        });
    }
}

impl fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSession")
            .field("timings", &self.shared.timings)
            .field("snapshot", &*self.shared.state.borrow())
            .finish_non_exhaustive()
    }
}
