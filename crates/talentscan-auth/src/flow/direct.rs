//! Direct sign-in with mailbox credentials.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{AuthApi, AuthKind, Authenticator, LoginRequest};
use crate::error::{Error, Result};
use crate::provider::MailProvider;
use crate::session::Session;

const GENERIC_FAILURE: &str = "Login failed";

/// Mailbox credentials for a direct login.
#[derive(Clone)]
pub struct Credentials {
    provider: MailProvider,
    email: String,
    password: String,
}

impl Credentials {
    /// Creates credentials for an explicit provider.
    #[must_use]
    pub fn new(
        provider: MailProvider,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            email: email.into(),
            password: password.into(),
        }
    }

    /// Creates credentials, inferring the provider from the address domain.
    ///
    /// Returns `None` if the domain does not identify a supported provider.
    #[must_use]
    pub fn inferred(email: impl Into<String>, password: impl Into<String>) -> Option<Self> {
        let email = email.into();
        let provider = MailProvider::from_address(&email)?;
        Some(Self::new(provider, email, password))
    }

    /// Mailbox provider.
    #[must_use]
    pub const fn provider(&self) -> MailProvider {
        self.provider
    }

    /// Mailbox address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("provider", &self.provider)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Direct sign-in: submits credentials to the login endpoint.
pub struct DirectFlow {
    api: Arc<dyn AuthApi>,
    credentials: Credentials,
}

impl DirectFlow {
    /// Creates a direct flow for `credentials`.
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, credentials: Credentials) -> Self {
        Self { api, credentials }
    }
}

#[async_trait]
impl Authenticator for DirectFlow {
    fn kind(&self) -> AuthKind {
        AuthKind::Direct
    }

    async fn authenticate(&self) -> Result<Session> {
        let request = LoginRequest::imap(&self.credentials);
        let response = self.api.login(&request).await?;

        if !response.success {
            return Err(Error::Rejected(
                response
                    .reason()
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            ));
        }

        let Some(user) = response.user else {
            return Err(Error::Rejected(GENERIC_FAILURE.to_string()));
        };

        if response.token.is_none() {
            warn!("Login for {} returned no session token", user.email);
        }
        Ok(Session::new(user, response.token))
    }
}

impl fmt::Debug for DirectFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectFlow")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_inferred_credentials() {
        let credentials = Credentials::inferred("ana@hotmail.com", "pw").unwrap();
        assert_eq!(credentials.provider(), MailProvider::Outlook);
        assert!(Credentials::inferred("ana@acme.io", "pw").is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let credentials = Credentials::new(MailProvider::Gmail, "a@gmail.com", "s3cret");
        assert!(!format!("{credentials:?}").contains("s3cret"));
    }
}
