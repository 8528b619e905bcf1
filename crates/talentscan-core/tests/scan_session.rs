//! Scan state machine tests against in-memory collaborators.
//!
//! Time is paused so poll intervals and the display grace period are exact.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use talentscan_auth::{Identity, Session, SessionStore};
use talentscan_core::{
    Candidate, CandidateQuery, CandidateRepository, Error, Result, ScanApi, ScanFailure,
    ScanNotice, ScanProgress, ScanRequest, ScanSession, ScanState, ScanStatus, ScanTimings,
};
use talentscan_query::{CompiledQuery, FilterFacets, MailStatus, compile};
use tokio::time::{Instant, sleep};

#[derive(Debug, Clone, PartialEq, Eq)]
struct StartCall {
    search_query: Option<String>,
    recruiter_id: Option<String>,
    token: String,
}

#[derive(Default)]
struct FakeScanApi {
    start_error: Mutex<Option<Error>>,
    hang_next_start: AtomicBool,
    script: Mutex<VecDeque<Result<ScanProgress>>>,
    starts: Mutex<Vec<StartCall>>,
    polls: Mutex<Vec<Instant>>,
    resets: Mutex<usize>,
}

impl FakeScanApi {
    fn scripted(script: Vec<Result<ScanProgress>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    fn rejecting(error: Error) -> Arc<Self> {
        Arc::new(Self {
            start_error: Mutex::new(Some(error)),
            ..Self::default()
        })
    }

    /// The next start request never gets an answer.
    fn unanswered_first() -> Arc<Self> {
        Arc::new(Self {
            hang_next_start: AtomicBool::new(true),
            ..Self::default()
        })
    }

    fn starts(&self) -> Vec<StartCall> {
        self.starts.lock().unwrap().clone()
    }

    fn polls(&self) -> Vec<Instant> {
        self.polls.lock().unwrap().clone()
    }

    fn polls_since(&self, since: Instant) -> usize {
        self.polls().into_iter().filter(|at| *at >= since).count()
    }
}

#[async_trait]
impl ScanApi for FakeScanApi {
    async fn start_scan(&self, request: &ScanRequest<'_>, token: &str) -> Result<()> {
        self.starts.lock().unwrap().push(StartCall {
            search_query: request.search_query.map(str::to_string),
            recruiter_id: request.recruiter_id.map(str::to_string),
            token: token.to_string(),
        });
        if self.hang_next_start.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        match self.start_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn progress(&self) -> Result<ScanProgress> {
        self.polls.lock().unwrap().push(Instant::now());
        // Once the script runs out the scan stays in flight
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(running(1, 10)))
    }

    async fn reset_session(&self) -> Result<()> {
        *self.resets.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
struct FakeRepository {
    newest_first: Vec<Candidate>,
    unavailable: bool,
    fetches: Mutex<Vec<usize>>,
}

impl FakeRepository {
    fn with_names(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            newest_first: names
                .iter()
                .map(|name| Candidate {
                    name: Some((*name).to_string()),
                    ..Candidate::default()
                })
                .collect(),
            ..Self::default()
        })
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            unavailable: true,
            ..Self::default()
        })
    }

    fn fetches(&self) -> Vec<usize> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateRepository for FakeRepository {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Candidate>> {
        self.fetches.lock().unwrap().push(limit);
        if self.unavailable {
            return Err(Error::RequestFailed("candidate request failed".into()));
        }
        Ok(self.newest_first.iter().take(limit).cloned().collect())
    }

    async fn search(&self, _query: &CandidateQuery) -> Result<Vec<Candidate>> {
        Ok(self.newest_first.clone())
    }
}

fn running(processed: u64, total: u64) -> ScanProgress {
    ScanProgress {
        status: ScanStatus::Processing,
        processed_emails: processed,
        total_emails: total,
        message: format!("Processing {processed}/{total}"),
        ..ScanProgress::default()
    }
}

fn complete(added: u64) -> ScanProgress {
    ScanProgress {
        status: ScanStatus::Complete,
        processed_emails: 10,
        total_emails: 10,
        candidates_added: added,
        ..ScanProgress::default()
    }
}

fn failed(message: &str) -> ScanProgress {
    ScanProgress {
        status: ScanStatus::Error,
        message: message.to_string(),
        ..ScanProgress::default()
    }
}

async fn signed_in() -> Arc<SessionStore> {
    let store = SessionStore::in_memory();
    store
        .save(Session::new(
            Identity::new("42", "ana@acme.io", "Ana"),
            Some("tok-1".into()),
        ))
        .await
        .unwrap();
    Arc::new(store)
}

fn session(
    store: &Arc<SessionStore>,
    api: &Arc<FakeScanApi>,
    repo: &Arc<FakeRepository>,
) -> ScanSession {
    ScanSession::new(
        Arc::clone(store),
        Arc::clone(api) as Arc<dyn ScanApi>,
        Arc::clone(repo) as Arc<dyn CandidateRepository>,
        ScanTimings::default(),
    )
}

fn no_filter() -> CompiledQuery {
    compile(&FilterFacets::new())
}

fn names(candidates: &[Candidate]) -> Vec<&str> {
    candidates.iter().map(Candidate::display_name).collect()
}

#[tokio::test(start_paused = true)]
async fn test_start_without_token_fails_locally() {
    let store = Arc::new(SessionStore::in_memory());
    let api = FakeScanApi::scripted(vec![]);
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);

    let result = scan.start(&no_filter()).await;

    assert!(matches!(result, Err(Error::Unauthenticated)));
    assert_eq!(
        scan.snapshot().state,
        ScanState::Error(ScanFailure::Unauthenticated)
    );
    assert!(api.starts().is_empty());
    assert!(api.polls().is_empty());

    sleep(Duration::from_millis(5001)).await;
    assert_eq!(scan.snapshot().state, ScanState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_completion_takes_head_of_collection() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![Ok(running(4, 10)), Ok(complete(3))]);
    let repo = FakeRepository::with_names(&["e", "d", "c", "b", "a"]);
    let scan = session(&store, &api, &repo);

    let handle = scan.start(&no_filter()).await.unwrap();
    let report = handle.finished().await.unwrap();

    assert!(report.succeeded());
    assert_eq!(names(&report.candidates), vec!["e", "d", "c"]);
    assert_eq!(report.notice, None);
    assert_eq!(repo.fetches(), vec![3]);

    let snapshot = scan.snapshot();
    assert_eq!(snapshot.state, ScanState::Complete);
    assert_eq!(snapshot.results, report.candidates);
    assert_eq!(snapshot.progress.unwrap().candidates_added, 3);
}

#[tokio::test(start_paused = true)]
async fn test_nothing_added_skips_fetch() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![Ok(complete(0))]);
    let repo = FakeRepository::with_names(&["a"]);
    let scan = session(&store, &api, &repo);

    let report = scan
        .start(&no_filter())
        .await
        .unwrap()
        .finished()
        .await
        .unwrap();

    assert!(report.succeeded());
    assert!(report.candidates.is_empty());
    assert!(repo.fetches().is_empty());
    assert!(scan.snapshot().results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_progress_is_streamed_while_polling() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![Ok(running(2, 10)), Ok(running(5, 10))]);
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);
    let mut updates = scan.subscribe();

    let _handle = scan.start(&no_filter()).await.unwrap();

    sleep(Duration::from_millis(10)).await;
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.state, ScanState::Polling);
    assert_eq!(snapshot.progress.unwrap().processed_emails, 2);
    assert_eq!(snapshot.sequence, 1);

    sleep(Duration::from_millis(500)).await;
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.progress.unwrap().processed_emails, 5);
    assert_eq!(snapshot.sequence, 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_leaves_one_poll_loop() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![]);
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);

    let first = scan.start(&no_filter()).await.unwrap();
    sleep(Duration::from_millis(600)).await;

    let restarted_at = Instant::now();
    let second = scan.start(&no_filter()).await.unwrap();
    sleep(Duration::from_millis(1250)).await;

    assert!(first.is_stopped());
    assert!(!second.is_stopped());
    assert!(second.generation() > first.generation());
    // Ticks at +0, +500 and +1000 from the second loop only
    assert_eq!(api.polls_since(restarted_at), 3);
    assert_eq!(api.starts().len(), 2);
    assert_eq!(scan.snapshot().generation, second.generation());
    assert_eq!(first.finished().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_is_partial_success() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![Ok(complete(2))]);
    let repo = FakeRepository::unavailable();
    let scan = session(&store, &api, &repo);

    let report = scan
        .start(&no_filter())
        .await
        .unwrap()
        .finished()
        .await
        .unwrap();

    assert!(report.succeeded());
    assert!(report.candidates.is_empty());
    assert!(matches!(
        report.notice,
        Some(ScanNotice::PartialSuccess {
            candidates_added: 2,
            ..
        })
    ));

    let snapshot = scan.snapshot();
    assert_eq!(snapshot.state, ScanState::Complete);
    assert_eq!(snapshot.notice, report.notice);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_state_resets_after_grace() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![Ok(complete(1))]);
    let repo = FakeRepository::with_names(&["a", "b"]);
    let scan = session(&store, &api, &repo);

    scan.start(&no_filter())
        .await
        .unwrap()
        .finished()
        .await
        .unwrap();

    sleep(Duration::from_millis(4900)).await;
    assert_eq!(scan.snapshot().state, ScanState::Complete);

    sleep(Duration::from_millis(200)).await;
    let snapshot = scan.snapshot();
    assert_eq!(snapshot.state, ScanState::Idle);
    assert_eq!(snapshot.progress, None);
    assert_eq!(names(&snapshot.results), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_clears_session() {
    let store = signed_in().await;
    let api = FakeScanApi::rejecting(Error::Unauthenticated);
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);

    let result = scan.start(&no_filter()).await;

    assert!(matches!(result, Err(Error::Unauthenticated)));
    assert!(!store.is_signed_in());
    assert_eq!(
        scan.snapshot().state,
        ScanState::Error(ScanFailure::Unauthenticated)
    );
    assert!(api.polls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refused_start_uses_generic_reason() {
    let store = signed_in().await;
    let api = FakeScanApi::rejecting(Error::RequestFailed("HTTP 500".into()));
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);

    assert!(scan.start(&no_filter()).await.is_err());

    assert!(store.is_signed_in());
    assert_eq!(
        scan.snapshot().state,
        ScanState::Error(ScanFailure::RequestFailed("scan request failed".into()))
    );
    assert!(api.polls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_server_error_is_remote_failure() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![Ok(failed("IMAP login failed"))]);
    let repo = FakeRepository::with_names(&["a"]);
    let scan = session(&store, &api, &repo);

    let report = scan
        .start(&no_filter())
        .await
        .unwrap()
        .finished()
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert!(repo.fetches().is_empty());
    assert_eq!(
        scan.snapshot().state,
        ScanState::Error(ScanFailure::Remote("IMAP login failed".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_server_error_without_message() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![Ok(failed(""))]);
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);

    scan.start(&no_filter())
        .await
        .unwrap()
        .finished()
        .await
        .unwrap();

    assert_eq!(
        scan.snapshot().state,
        ScanState::Error(ScanFailure::Remote("Scan failed".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_backs_off() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![
        Err(Error::RequestFailed("progress request failed".into())),
        Ok(running(1, 2)),
        Ok(complete(0)),
    ]);
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);

    let started_at = Instant::now();
    scan.start(&no_filter())
        .await
        .unwrap()
        .finished()
        .await
        .unwrap();

    let offsets: Vec<u128> = api
        .polls()
        .into_iter()
        .map(|at| (at - started_at).as_millis())
        .collect();
    assert_eq!(offsets, vec![0, 1000, 1500]);
}

#[tokio::test(start_paused = true)]
async fn test_start_request_carries_query_and_identity() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![Ok(complete(0)), Ok(complete(0))]);
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);

    scan.start(&no_filter()).await.unwrap();
    let filtered = compile(&FilterFacets::new().with_status(MailStatus::Unread));
    scan.start(&filtered).await.unwrap();

    assert_eq!(
        api.starts(),
        vec![
            StartCall {
                search_query: None,
                recruiter_id: Some("42".into()),
                token: "tok-1".into(),
            },
            StartCall {
                search_query: Some("is:unread".into()),
                recruiter_id: Some("42".into()),
                token: "tok-1".into(),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_remote_stops_polling() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![]);
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);

    let handle = scan.start(&no_filter()).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    scan.reset_remote().await;
    let reset_at = Instant::now();
    sleep(Duration::from_secs(2)).await;

    assert!(handle.is_stopped());
    assert_eq!(*api.resets.lock().unwrap(), 1);
    assert_eq!(api.polls_since(reset_at), 0);

    let snapshot = scan.snapshot();
    assert_eq!(snapshot.state, ScanState::Idle);
    assert!(snapshot.generation > handle.generation());
}

#[tokio::test(start_paused = true)]
async fn test_stop_returns_to_idle() {
    let store = signed_in().await;
    let api = FakeScanApi::scripted(vec![]);
    let repo = FakeRepository::with_names(&[]);
    let scan = session(&store, &api, &repo);

    let handle = scan.start(&no_filter()).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    handle.stop();
    sleep(Duration::from_millis(10)).await;

    let stopped_at = Instant::now();
    sleep(Duration::from_secs(2)).await;

    assert_eq!(api.polls_since(stopped_at), 0);
    assert_eq!(scan.snapshot().state, ScanState::Idle);
    assert_eq!(handle.finished().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_stop_abandons_unanswered_start() {
    let store = signed_in().await;
    let api = FakeScanApi::unanswered_first();
    let repo = FakeRepository::with_names(&[]);
    let scan = Arc::new(session(&store, &api, &repo));

    let pending = tokio::spawn({
        let scan = Arc::clone(&scan);
        async move { scan.start(&no_filter()).await.map(|handle| handle.generation()) }
    });
    sleep(Duration::from_millis(10)).await;
    assert_eq!(scan.snapshot().state, ScanState::Starting);

    tokio::time::timeout(Duration::from_secs(1), scan.stop())
        .await
        .unwrap();

    assert!(matches!(pending.await.unwrap(), Err(Error::Cancelled)));
    assert_eq!(scan.snapshot().state, ScanState::Idle);
    assert!(api.polls().is_empty());

    // The session is usable again
    let handle = scan.start(&no_filter()).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(scan.snapshot().state, ScanState::Polling);
    assert_eq!(api.starts().len(), 2);
    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_newer_start_supersedes_unanswered_start() {
    let store = signed_in().await;
    let api = FakeScanApi::unanswered_first();
    let repo = FakeRepository::with_names(&[]);
    let scan = Arc::new(session(&store, &api, &repo));

    let pending = tokio::spawn({
        let scan = Arc::clone(&scan);
        async move { scan.start(&no_filter()).await.map(|handle| handle.generation()) }
    });
    sleep(Duration::from_millis(10)).await;

    let handle = tokio::time::timeout(Duration::from_secs(1), scan.start(&no_filter()))
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(pending.await.unwrap(), Err(Error::Cancelled)));

    let started_at = Instant::now();
    sleep(Duration::from_millis(1999)).await;
    // One loop polling every 500ms
    assert_eq!(api.polls_since(started_at), 4);
    let snapshot = scan.snapshot();
    assert_eq!(snapshot.state, ScanState::Polling);
    assert_eq!(snapshot.generation, handle.generation());
    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_reset_remote_abandons_unanswered_start() {
    let store = signed_in().await;
    let api = FakeScanApi::unanswered_first();
    let repo = FakeRepository::with_names(&[]);
    let scan = Arc::new(session(&store, &api, &repo));

    let pending = tokio::spawn({
        let scan = Arc::clone(&scan);
        async move { scan.start(&no_filter()).await.map(|handle| handle.generation()) }
    });
    sleep(Duration::from_millis(10)).await;

    tokio::time::timeout(Duration::from_secs(1), scan.reset_remote())
        .await
        .unwrap();

    assert!(matches!(pending.await.unwrap(), Err(Error::Cancelled)));
    assert_eq!(*api.resets.lock().unwrap(), 1);
    assert_eq!(scan.snapshot().state, ScanState::Idle);
}
