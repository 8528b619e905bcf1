//! Sign-in flows.
//!
//! Two mutually exclusive strategies implement [`Authenticator`]:
//! [`DelegatedFlow`] (provider consent page + completion message) and
//! [`DirectFlow`] (mailbox credentials). [`AuthFlow`] runs one of them at a
//! time and persists the resulting session.

mod delegated;
mod direct;

pub use delegated::DelegatedFlow;
pub use direct::{Credentials, DirectFlow};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::provider::MailProvider;
use crate::session::{Identity, Session};
use crate::store::SessionStore;

/// Response of `GET /auth/google/login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthUrlResponse {
    /// Whether the server produced a consent URL.
    #[serde(default)]
    pub success: bool,
    /// Provider consent page.
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Failure detail.
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl OAuthUrlResponse {
    /// Server-supplied failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        detail_text(self.detail.as_ref())
    }
}

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest<'a> {
    /// Always `imap` for credential logins.
    pub method: &'a str,
    /// Mailbox provider tag.
    pub provider: MailProvider,
    /// Mailbox address.
    pub email: &'a str,
    /// Account or app password.
    pub password: &'a str,
}

impl<'a> LoginRequest<'a> {
    /// Builds the IMAP login body for `credentials`.
    #[must_use]
    pub fn imap(credentials: &'a Credentials) -> Self {
        Self {
            method: "imap",
            provider: credentials.provider(),
            email: credentials.email(),
            password: credentials.password(),
        }
    }
}

impl fmt::Debug for LoginRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("method", &self.method)
            .field("provider", &self.provider)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response of `POST /auth/login`.
#[derive(Clone, Default, Deserialize)]
pub struct LoginResponse {
    /// Whether the credentials were accepted.
    #[serde(default)]
    pub success: bool,
    /// Signed-in identity.
    #[serde(default)]
    pub user: Option<Identity>,
    /// Bearer token, when the server issues one for credential logins.
    #[serde(default)]
    pub token: Option<String>,
    /// Failure detail.
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl LoginResponse {
    /// Server-supplied failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        detail_text(self.detail.as_ref())
    }
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("success", &self.success)
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("detail", &self.detail)
            .finish()
    }
}

/// `detail` is usually a string, but validation failures carry structured JSON.
fn detail_text(detail: Option<&serde_json::Value>) -> Option<String> {
    match detail? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Server endpoints used by the sign-in flows.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Requests a provider consent URL.
    ///
    /// # Errors
    ///
    /// Returns an error only if the server could not be reached. A body that
    /// cannot be parsed is reported as an unsuccessful response.
    async fn oauth_url(&self) -> Result<OAuthUrlResponse>;

    /// Submits mailbox credentials.
    ///
    /// # Errors
    ///
    /// Returns an error only if the server could not be reached. The body is
    /// parsed whatever the status code.
    async fn login(&self, request: &LoginRequest<'_>) -> Result<LoginResponse>;

    /// Ends the server-side mailbox session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn logout(&self) -> Result<()>;
}

/// HTTP implementation of [`AuthApi`].
#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: Url,
    http_client: Client,
}

impl AuthClient {
    /// Creates a client for the API rooted at `base_url` (e.g. `http://localhost:8000/api`).
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_http_client(base_url, Client::new())
    }

    /// Creates a client that shares an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn with_http_client(base_url: &str, http_client: Client) -> Result<Self> {
        Ok(Self {
            base_url: api_base(base_url)?,
            http_client,
        })
    }

    /// Creates a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is invalid or the HTTP client cannot be built.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Self::with_http_client(base_url, http_client)
    }

    /// API base URL, always ending in `/`.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

/// Parses an API base URL so that relative endpoints join below it.
///
/// # Errors
///
/// Returns an error if `base_url` is not a valid URL.
pub fn api_base(base_url: &str) -> Result<Url> {
    let mut base = base_url.trim().trim_end_matches('/').to_string();
    base.push('/');
    Ok(Url::parse(&base)?)
}

/// Reads a JSON body, falling back to `T::default()` when it does not parse.
async fn lenient_json<T: DeserializeOwned + Default>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body).unwrap_or_else(|e| {
        warn!("Unparsable response body (HTTP {status}): {e}");
        T::default()
    }))
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn oauth_url(&self) -> Result<OAuthUrlResponse> {
        let response = self
            .http_client
            .get(self.endpoint("auth/google/login")?)
            .send()
            .await?;
        lenient_json(response).await
    }

    async fn login(&self, request: &LoginRequest<'_>) -> Result<LoginResponse> {
        debug!("Submitting {} login for {}", request.provider, request.email);
        let response = self
            .http_client
            .post(self.endpoint("auth/login")?)
            .json(request)
            .send()
            .await?;
        lenient_json(response).await
    }

    async fn logout(&self) -> Result<()> {
        self.http_client
            .post(self.endpoint("auth/logout")?)
            .send()
            .await?;
        Ok(())
    }
}

/// Which strategy an attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// Provider consent page with a completion message.
    Delegated,
    /// Mailbox credentials submitted to the server.
    Direct,
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delegated => "delegated",
            Self::Direct => "direct",
        })
    }
}

/// A sign-in strategy.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Strategy kind.
    fn kind(&self) -> AuthKind;

    /// Runs the strategy to completion and returns the issued session.
    ///
    /// Implementations release every resource they acquired (listeners,
    /// subscriptions) before returning and when dropped mid-flight.
    ///
    /// # Errors
    ///
    /// Returns an error describing why sign-in did not succeed.
    async fn authenticate(&self) -> Result<Session>;
}

/// Receives the outcome of an attempt started with [`AuthFlow::begin`].
pub trait AuthCompletion: Send + Sync {
    /// Called once with the persisted session.
    fn on_success(&self, session: &Session);

    /// Called once with the failure reason.
    fn on_failure(&self, error: &Error);
}

struct Attempt {
    settled: AtomicBool,
    completion: Arc<dyn AuthCompletion>,
    done: watch::Sender<bool>,
}

impl Attempt {
    fn new(completion: Arc<dyn AuthCompletion>) -> Arc<Self> {
        let (done, _) = watch::channel(false);
        Arc::new(Self {
            settled: AtomicBool::new(false),
            completion,
            done,
        })
    }

    /// Claims the right to report the outcome. Only the first caller wins.
    fn settle(&self) -> bool {
        !self.settled.swap(true, Ordering::SeqCst)
    }

    fn abandon(&self, reason: Error) {
        if self.settle() {
            debug!("Sign-in attempt abandoned: {reason}");
            self.completion.on_failure(&reason);
        }
        self.done.send_replace(true);
    }

    async fn finished(&self) {
        let mut done = self.done.subscribe();
        // The sender lives in `self`, so this cannot fail while we wait
        let _ = done.wait_for(|finished| *finished).await;
    }
}

/// Completion of an inline attempt; only ever told why it was abandoned.
#[derive(Default)]
struct InlineCompletion {
    cancelled: AtomicBool,
}

impl InlineCompletion {
    fn reason(&self) -> Error {
        if self.cancelled.load(Ordering::SeqCst) {
            Error::Cancelled
        } else {
            Error::Superseded
        }
    }
}

impl AuthCompletion for InlineCompletion {
    fn on_success(&self, _session: &Session) {}

    fn on_failure(&self, error: &Error) {
        self.cancelled
            .store(matches!(error, Error::Cancelled), Ordering::SeqCst);
    }
}

struct ActiveAttempt {
    attempt: Arc<Attempt>,
    /// Background task for [`AuthFlow::begin`]; `None` while an inline
    /// [`AuthFlow::authenticate`] call drives the attempt.
    task: Option<JoinHandle<()>>,
}

type ActiveSlot = Arc<Mutex<Option<ActiveAttempt>>>;

fn lock_slot(slot: &Mutex<Option<ActiveAttempt>>) -> MutexGuard<'_, Option<ActiveAttempt>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Empties the slot if it still holds `attempt`.
fn release(slot: &Mutex<Option<ActiveAttempt>>, attempt: &Arc<Attempt>) {
    let mut active = lock_slot(slot);
    if active
        .as_ref()
        .is_some_and(|active| Arc::ptr_eq(&active.attempt, attempt))
    {
        *active = None;
    }
}

/// Handle to an attempt started with [`AuthFlow::begin`].
pub struct AttemptHandle {
    kind: AuthKind,
    attempt: Arc<Attempt>,
    abort: AbortHandle,
}

impl AttemptHandle {
    /// Strategy of the attempt.
    #[must_use]
    pub const fn kind(&self) -> AuthKind {
        self.kind
    }

    /// Returns true once the outcome has been reported.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.attempt.settled.load(Ordering::SeqCst)
    }

    /// Abandons the attempt. The completion receives [`Error::Cancelled`]
    /// unless the outcome was already reported.
    pub fn cancel(&self) {
        self.abort.abort();
        self.attempt.abandon(Error::Cancelled);
    }

    /// Waits until the outcome has been reported.
    pub async fn wait(&self) {
        self.attempt.finished().await;
    }
}

impl fmt::Debug for AttemptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptHandle")
            .field("kind", &self.kind)
            .field("settled", &self.is_settled())
            .finish_non_exhaustive()
    }
}

/// Runs sign-in attempts one at a time and persists their sessions.
pub struct AuthFlow {
    store: Arc<SessionStore>,
    active: ActiveSlot,
}

impl AuthFlow {
    /// Creates a coordinator writing into `store`.
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// The session store this flow writes into.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Returns true while an attempt is in flight.
    #[must_use]
    pub fn has_active_attempt(&self) -> bool {
        lock_slot(&self.active).is_some()
    }

    /// Runs `authenticator` inline, persisting the session on success.
    ///
    /// Any attempt in flight is abandoned first. The inline attempt is itself
    /// abandoned by a later [`begin`](Self::begin), [`authenticate`](Self::authenticate),
    /// [`cancel`](Self::cancel) or [`logout`](Self::logout), in which case it
    /// returns [`Error::Superseded`] or [`Error::Cancelled`] without touching
    /// the session.
    ///
    /// # Errors
    ///
    /// Returns the authenticator's error, the reason the attempt was
    /// abandoned, or a storage error if the session could not be persisted.
    pub async fn authenticate(&self, authenticator: &dyn Authenticator) -> Result<Arc<Session>> {
        self.abandon_active(Error::Superseded).await;
        let kind = authenticator.kind();

        let inline = Arc::new(InlineCompletion::default());
        let attempt = Attempt::new(Arc::clone(&inline) as Arc<dyn AuthCompletion>);
        *lock_slot(&self.active) = Some(ActiveAttempt {
            attempt: Arc::clone(&attempt),
            task: None,
        });
        debug!("Started inline {kind} sign-in attempt");

        let outcome = tokio::select! {
            outcome = authenticator.authenticate() => Some(outcome),
            () = attempt.finished() => None,
        };

        let Some(outcome) = outcome.filter(|_| attempt.settle()) else {
            debug!("Inline {kind} attempt abandoned");
            return Err(inline.reason());
        };
        release(&self.active, &attempt);
        attempt.done.send_replace(true);

        match outcome {
            Ok(session) => {
                info!("Signed in as {} ({kind})", session.user.email);
                self.store.save(session).await
            }
            Err(e) => {
                warn!("Sign-in ({kind}) failed: {e}");
                Err(e)
            }
        }
    }

    /// Starts `authenticator` in the background and reports its outcome to
    /// `completion`.
    ///
    /// An attempt already in flight is abandoned first: its completion
    /// receives [`Error::Superseded`] and its resources are released before
    /// the new attempt starts.
    pub async fn begin(
        &self,
        authenticator: Arc<dyn Authenticator>,
        completion: Arc<dyn AuthCompletion>,
    ) -> AttemptHandle {
        self.abandon_active(Error::Superseded).await;

        let kind = authenticator.kind();
        let attempt = Attempt::new(completion);

        // Hold the slot while spawning so the task cannot release it first
        let abort = {
            let mut active = lock_slot(&self.active);
            let task = tokio::spawn(run_attempt(
                Arc::clone(&self.store),
                authenticator,
                Arc::clone(&attempt),
                Arc::clone(&self.active),
            ));
            let abort = task.abort_handle();
            *active = Some(ActiveAttempt {
                attempt: Arc::clone(&attempt),
                task: Some(task),
            });
            abort
        };
        debug!("Started {kind} sign-in attempt");

        AttemptHandle {
            kind,
            attempt,
            abort,
        }
    }

    /// Abandons the attempt in flight, if any.
    pub async fn cancel(&self) {
        self.abandon_active(Error::Cancelled).await;
    }

    /// Signs out: best-effort server logout, then clears the session.
    ///
    /// # Errors
    ///
    /// Returns an error only if the persisted session could not be removed.
    pub async fn logout(&self, api: &dyn AuthApi) -> Result<()> {
        self.abandon_active(Error::Cancelled).await;
        if let Err(e) = api.logout().await {
            warn!("Server logout failed: {e}");
        }
        self.store.clear().await
    }

    async fn abandon_active(&self, reason: Error) {
        let previous = lock_slot(&self.active).take();
        if let Some(previous) = previous {
            if let Some(task) = &previous.task {
                task.abort();
            }
            previous.attempt.abandon(reason);
            // Wait for the aborted future to be dropped so its listener is gone
            if let Some(task) = previous.task {
                let _ = task.await;
            }
        }
    }
}

impl fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFlow")
            .field("store", &self.store)
            .field("active", &self.has_active_attempt())
            .finish()
    }
}

async fn run_attempt(
    store: Arc<SessionStore>,
    authenticator: Arc<dyn Authenticator>,
    attempt: Arc<Attempt>,
    slot: ActiveSlot,
) {
    let kind = authenticator.kind();
    let outcome = authenticator.authenticate().await;

    if !attempt.settle() {
        debug!("Discarding outcome of abandoned {kind} attempt");
        return;
    }
    release(&slot, &attempt);

    let outcome = match outcome {
        Ok(session) => store.save(session).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(session) => {
            info!("Signed in as {} ({kind})", session.user.email);
            attempt.completion.on_success(&session);
        }
        Err(e) => {
            warn!("Sign-in ({kind}) failed: {e}");
            attempt.completion.on_failure(&e);
        }
    }
    attempt.done.send_replace(true);
}
