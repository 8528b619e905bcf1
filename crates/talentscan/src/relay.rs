//! Relays pasted sign-in completion messages into the message bus.
//!
//! The consent page normally posts its outcome back to the window that
//! opened it. A terminal has no such window, so the user pastes the message
//! instead, one JSON envelope per line:
//!
//! ```text
//! {"origin": "http://localhost:8000", "data": {"type": "OAUTH_SUCCESS", "data": {...}}}
//! ```

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use talentscan_auth::{MessageBus, MessageEnvelope};
use tracing::{debug, warn};

/// Reads envelopes from stdin on a background thread.
///
/// The thread is detached from the runtime, so a pending read never holds
/// up shutdown.
#[derive(Debug)]
pub struct StdinRelay {
    _thread: JoinHandle<()>,
}

impl StdinRelay {
    /// Starts relaying. The bus is closed when stdin reaches end of file.
    pub fn spawn(bus: MessageBus) -> Self {
        let thread = thread::spawn(move || {
            let relayed = relay_lines(io::stdin().lock(), &bus);
            debug!("Stdin closed after {relayed} messages");
            bus.close();
        });
        Self { _thread: thread }
    }
}

/// Publishes every well-formed envelope in `reader` and returns how many were
/// published. Blank lines are skipped; malformed lines are logged and skipped.
pub fn relay_lines(reader: impl BufRead, bus: &MessageBus) -> usize {
    let mut relayed = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read message: {e}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<MessageEnvelope>(line) {
            Ok(envelope) => {
                let listeners = bus.publish(envelope);
                debug!("Relayed message to {listeners} listeners");
                relayed += 1;
            }
            Err(e) => {
                warn!("Ignoring malformed message: {e}");
                eprintln!("Not a sign-in message, expected {{\"origin\": ..., \"data\": ...}}");
            }
        }
    }
    relayed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use talentscan_auth::CompletionMessage;

    #[tokio::test]
    async fn test_relays_envelopes_and_skips_noise() {
        let bus = MessageBus::new();
        let mut subscription = bus.subscribe();
        let input = concat!(
            "\n",
            "not json\n",
            r#"{"origin": "http://localhost:8000", "data": {"type": "OAUTH_ERROR", "error": "denied"}}"#,
            "\n",
        );

        assert_eq!(relay_lines(input.as_bytes(), &bus), 1);

        let envelope = subscription.recv().await.unwrap();
        assert_eq!(envelope.origin, "http://localhost:8000");
        assert_eq!(
            CompletionMessage::from_envelope(&envelope),
            Some(CompletionMessage::Failure {
                error: "denied".into()
            })
        );
    }

    #[test]
    fn test_empty_input() {
        let bus = MessageBus::new();
        assert_eq!(relay_lines(&b""[..], &bus), 0);
    }
}
