//! HTTP client for the candidate API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use talentscan_auth::{AuthClient, SessionStore};
use tracing::{debug, warn};
use url::Url;

use crate::candidates::{Candidate, CandidateQuery, CandidateRepository, most_recent_first};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::scan::{SCAN_REQUEST_FAILED, ScanApi, ScanProgress, ScanRequest};

/// Client for the scan and candidate endpoints.
///
/// Sends the stored bearer token where one is held. Any `401 Unauthorized`
/// clears the session store.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http_client: Client,
    store: Arc<SessionStore>,
}

impl ApiClient {
    /// Creates a client from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, store: Arc<SessionStore>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Self::with_http_client(&config.api_url, builder.build()?, store)
    }

    /// Creates a client over an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is invalid.
    pub fn with_http_client(
        base_url: &str,
        http_client: Client,
        store: Arc<SessionStore>,
    ) -> Result<Self> {
        Ok(Self {
            base_url: talentscan_auth::flow::api_base(base_url)?,
            http_client,
            store,
        })
    }

    /// Sign-in client sharing this client's connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is rejected.
    pub fn auth_client(&self) -> Result<AuthClient> {
        Ok(AuthClient::with_http_client(
            self.base_url.as_str(),
            self.http_client.clone(),
        )?)
    }

    /// API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Maps error statuses: 401 clears the session, anything else becomes `failure`.
    async fn check(&self, response: Response, failure: &str) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Server rejected the session token, signing out");
            if let Err(e) = self.store.clear().await {
                warn!("Failed to clear session: {e}");
            }
            return Err(Error::Unauthenticated);
        }
        if !status.is_success() {
            debug!("{failure}: HTTP {status}");
            return Err(Error::RequestFailed(failure.to_string()));
        }
        Ok(response)
    }

    async fn get_candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
        let request = self.http_client.get(self.endpoint("candidates")?).query(query);
        let response = self.authorized(request).send().await?;
        let response = self.check(response, "candidate request failed").await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ScanApi for ApiClient {
    async fn start_scan(&self, request: &ScanRequest<'_>, token: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.endpoint("scan")?)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        self.check(response, SCAN_REQUEST_FAILED).await?;
        Ok(())
    }

    async fn progress(&self) -> Result<ScanProgress> {
        let response = self
            .http_client
            .get(self.endpoint("scan-progress")?)
            .send()
            .await?;
        let response = self.check(response, "progress request failed").await?;
        Ok(response.json().await?)
    }

    async fn reset_session(&self) -> Result<()> {
        let response = self
            .http_client
            .post(self.endpoint("reset-session")?)
            .send()
            .await?;
        self.check(response, "reset request failed").await?;
        Ok(())
    }
}

#[async_trait]
impl CandidateRepository for ApiClient {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Candidate>> {
        // The server pages newest first, so the first page is the recent slice
        let page = CandidateQuery::default().with_page(0, u32::try_from(limit).unwrap_or(u32::MAX));
        let mut candidates = most_recent_first(self.get_candidates(&page).await?);
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn search(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
        self.get_candidates(query).await
    }
}
