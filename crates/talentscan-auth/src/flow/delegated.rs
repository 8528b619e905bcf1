//! Delegated sign-in through the provider consent page.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::{AuthApi, AuthKind, Authenticator};
use crate::error::{Error, Result};
use crate::message::{CompletionMessage, MessageBus, OriginPolicy, Subscription};
use crate::session::Session;
use crate::surface::Surface;

/// Delegated sign-in.
///
/// Asks the server for a consent URL, shows it on a [`Surface`], then waits
/// for the first completion message from an allowed origin. The listener is
/// registered before the URL is requested and released as soon as one
/// matching message arrives, so a resent message is never observed.
pub struct DelegatedFlow {
    api: Arc<dyn AuthApi>,
    surface: Arc<dyn Surface>,
    bus: MessageBus,
    origins: OriginPolicy,
}

impl DelegatedFlow {
    /// Creates a delegated flow accepting messages from the default local origins.
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, surface: Arc<dyn Surface>, bus: MessageBus) -> Self {
        Self {
            api,
            surface,
            bus,
            origins: OriginPolicy::default(),
        }
    }

    /// Restricts accepted messages to `origins`.
    #[must_use]
    pub fn with_origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = origins;
        self
    }

    async fn consent_url(&self) -> Result<Url> {
        let response = self.api.oauth_url().await?;
        match response.auth_url.as_deref() {
            Some(url) if response.success => Ok(Url::parse(url)?),
            _ => Err(Error::Rejected(
                response
                    .reason()
                    .unwrap_or_else(|| "Failed to initiate OAuth".to_string()),
            )),
        }
    }

    async fn wait_for_completion(&self, subscription: &mut Subscription) -> Result<Session> {
        loop {
            let Some(envelope) = subscription.recv().await else {
                return Err(Error::ChannelClosed);
            };

            if !self.origins.allows(&envelope.origin) {
                debug!("Ignoring message from disallowed origin {}", envelope.origin);
                continue;
            }

            match CompletionMessage::from_envelope(&envelope) {
                Some(CompletionMessage::Success { data }) => return Ok(data),
                Some(CompletionMessage::Failure { error }) => return Err(Error::OAuth(error)),
                None => debug!("Ignoring unrelated message from {}", envelope.origin),
            }
        }
    }
}

#[async_trait]
impl Authenticator for DelegatedFlow {
    fn kind(&self) -> AuthKind {
        AuthKind::Delegated
    }

    async fn authenticate(&self) -> Result<Session> {
        let mut subscription = self.bus.subscribe();

        let url = self.consent_url().await?;
        if let Err(e) = self.surface.open(&url) {
            warn!("Could not open consent page: {e}");
            return Err(Error::PopupBlocked);
        }
        info!("Waiting for sign-in to complete in the browser");

        let outcome = self.wait_for_completion(&mut subscription).await;
        subscription.unsubscribe();
        outcome
    }
}

impl std::fmt::Debug for DelegatedFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedFlow")
            .field("origins", &self.origins)
            .finish_non_exhaustive()
    }
}
