//! Cross-context completion messages.
//!
//! The consent page reports its outcome by posting a message back to the
//! context that opened it. [`MessageBus`] carries those messages; a sign-in
//! attempt holds a [`Subscription`] for exactly as long as it waits, and
//! releases it when the subscription is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::session::Session;

/// A message together with the origin of its sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Sender origin, e.g. `http://localhost:8000`.
    pub origin: String,
    /// Message payload.
    pub data: serde_json::Value,
}

impl MessageEnvelope {
    /// Creates an envelope.
    #[must_use]
    pub fn new(origin: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Outcome posted by the consent page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompletionMessage {
    /// Sign-in succeeded; carries the new session.
    #[serde(rename = "OAUTH_SUCCESS")]
    Success {
        /// Session issued by the server.
        data: Session,
    },
    /// Sign-in failed; carries the provider reason.
    #[serde(rename = "OAUTH_ERROR")]
    Failure {
        /// Reason text.
        #[serde(default)]
        error: String,
    },
}

impl CompletionMessage {
    /// Decodes the payload of an envelope. Returns `None` for anything that
    /// is not a well-formed completion message.
    #[must_use]
    pub fn from_envelope(envelope: &MessageEnvelope) -> Option<Self> {
        Self::deserialize(&envelope.data).ok()
    }
}

/// Origins a completion message is accepted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Accepts messages from any of `origins`.
    #[must_use]
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: origins
                .into_iter()
                .map(|o| normalize(&o.into()).to_string())
                .collect(),
        }
    }

    /// Returns true if `origin` is on the allow-list.
    #[must_use]
    pub fn allows(&self, origin: &str) -> bool {
        let origin = normalize(origin);
        self.allowed.iter().any(|a| a == origin)
    }

    /// The allowed origins.
    #[must_use]
    pub fn origins(&self) -> &[String] {
        &self.allowed
    }
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::new(["http://localhost:8000", "http://localhost:3000"])
    }
}

fn normalize(origin: &str) -> &str {
    origin.trim().trim_end_matches('/')
}

#[derive(Debug, Default)]
struct BusInner {
    next_id: u64,
    closed: bool,
    listeners: HashMap<u64, mpsc::UnboundedSender<MessageEnvelope>>,
}

/// Fan-out channel for cross-context messages.
#[derive(Debug, Clone, Default)]
pub struct MessageBus {
    inner: Arc<Mutex<BusInner>>,
}

impl MessageBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. It stays registered until the returned
    /// subscription is dropped or unsubscribed. On a closed bus the
    /// subscription receives nothing and `recv` returns `None` at once.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        if inner.closed {
            debug!("Message listener {id} refused, bus is closed");
        } else {
            inner.listeners.insert(id, tx);
            debug!("Message listener {id} registered");
        }

        Subscription {
            id,
            bus: Arc::clone(&self.inner),
            rx,
        }
    }

    /// Delivers `envelope` to every current listener. Returns how many
    /// listeners received it.
    pub fn publish(&self, envelope: MessageEnvelope) -> usize {
        let mut inner = self.lock();
        inner
            .listeners
            .retain(|_, tx| tx.send(envelope.clone()).is_ok());
        inner.listeners.len()
    }

    /// Disconnects every listener. Pending and future `recv` calls return
    /// `None`, including on subscriptions made after closing.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        let count = inner.listeners.len();
        inner.listeners.clear();
        debug!("Message bus closed, {count} listener(s) disconnected");
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered listener on a [`MessageBus`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Arc<Mutex<BusInner>>,
    rx: mpsc::UnboundedReceiver<MessageEnvelope>,
}

impl Subscription {
    /// Waits for the next message. Returns `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<MessageEnvelope> {
        self.rx.recv().await
    }

    /// Removes the listener from the bus.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let removed = self
            .bus
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .remove(&self.id);
        if removed.is_some() {
            debug!("Message listener {} released", self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_success() {
        let envelope = MessageEnvelope::new(
            "http://localhost:8000",
            json!({
                "type": "OAUTH_SUCCESS",
                "data": { "token": "t", "user": { "id": "1", "email": "a@b.c", "name": "a" } }
            }),
        );
        let message = CompletionMessage::from_envelope(&envelope).unwrap();
        let CompletionMessage::Success { data } = message else {
            panic!("expected success");
        };
        assert_eq!(data.token(), Some("t"));
    }

    #[test]
    fn test_decode_error_and_noise() {
        let envelope = MessageEnvelope::new(
            "http://localhost:8000",
            json!({ "type": "OAUTH_ERROR", "error": "access_denied" }),
        );
        assert_eq!(
            CompletionMessage::from_envelope(&envelope),
            Some(CompletionMessage::Failure {
                error: "access_denied".into()
            })
        );

        let noise = MessageEnvelope::new("http://localhost:8000", json!({ "type": "PING" }));
        assert_eq!(CompletionMessage::from_envelope(&noise), None);
    }

    #[test]
    fn test_origin_policy() {
        let policy = OriginPolicy::default();
        assert!(policy.allows("http://localhost:8000"));
        assert!(policy.allows("http://localhost:3000/"));
        assert!(!policy.allows("http://evil.example"));
        assert!(!policy.allows("http://localhost:8000.evil.example"));
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe();
        assert_eq!(bus.listener_count(), 1);

        let delivered = bus.publish(MessageEnvelope::new("o", json!(1)));
        assert_eq!(delivered, 1);
        assert_eq!(sub.recv().await.unwrap().data, json!(1));

        sub.unsubscribe();
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.publish(MessageEnvelope::new("o", json!(2))), 0);
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe();
        bus.close();
        assert!(sub.recv().await.is_none());
        assert_eq!(bus.listener_count(), 0);

        let mut late = bus.subscribe();
        assert!(late.recv().await.is_none());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_drop_releases_listener() {
        let bus = MessageBus::new();
        {
            let _a = bus.subscribe();
            let _b = bus.subscribe();
            assert_eq!(bus.listener_count(), 2);
        }
        assert_eq!(bus.listener_count(), 0);
    }
}
