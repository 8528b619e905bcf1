//! # talentscan-auth
//!
//! Recruiter sign-in and session storage.
//!
//! ## Features
//!
//! - **Session store**: one process-wide [`Session`] behind an injectable
//!   [`SessionStore`], persisted through a pluggable [`SessionBackend`]
//!   (file, system keyring, or memory)
//! - **Delegated sign-in**: [`DelegatedFlow`] opens the provider consent page
//!   in a detached [`Surface`] and waits for one completion message on a
//!   [`MessageBus`]
//! - **Direct sign-in**: [`DirectFlow`] submits IMAP credentials to the
//!   login endpoint
//! - **Coordination**: [`AuthFlow`] runs one attempt at a time and persists
//!   the resulting session
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use talentscan_auth::{AuthClient, AuthFlow, Credentials, DirectFlow, MailProvider, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SessionStore::in_memory());
//!     let api = Arc::new(AuthClient::new("http://localhost:8000/api")?);
//!     let flow = AuthFlow::new(Arc::clone(&store));
//!
//!     let credentials = Credentials::new(MailProvider::Outlook, "me@outlook.com", "app-password");
//!     let session = flow.authenticate(&DirectFlow::new(api, credentials)).await?;
//!     println!("Signed in as {}", session.user.email);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod message;
pub mod provider;
pub mod session;
pub mod store;
pub mod surface;

pub use error::{Error, Result};
pub use flow::{
    AttemptHandle, AuthApi, AuthClient, AuthCompletion, AuthFlow, AuthKind, Authenticator,
    Credentials, DelegatedFlow, DirectFlow, LoginRequest, LoginResponse, OAuthUrlResponse,
};
pub use message::{CompletionMessage, MessageBus, MessageEnvelope, OriginPolicy, Subscription};
pub use provider::MailProvider;
pub use session::{Identity, Session};
pub use store::{
    FileBackend, KeyringBackend, MemoryBackend, SESSION_KEY, SessionBackend, SessionStore,
    StorageError,
};
pub use surface::{BrowserSurface, Surface, SurfaceError};
