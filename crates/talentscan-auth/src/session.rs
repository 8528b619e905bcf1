//! Authenticated session types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The signed-in recruiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Server-side user id.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Mailbox address.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }

    /// Name to show in the UI, falling back to the mailbox local part.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// Servers have issued both numeric and string user ids.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// An authenticated session.
///
/// Serialized in the same shape the server's OAuth callback posts:
/// `{ "token": "...", "user": { "id", "email", "name" } }`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Signed-in identity.
    pub user: Identity,
    /// Bearer token for API calls. Credential logins may not issue one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// When the session was established.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session established now.
    #[must_use]
    pub fn new(user: Identity, token: Option<String>) -> Self {
        Self {
            user,
            token,
            created_at: Utc::now(),
        }
    }

    /// Sets the creation time.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Returns the bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_payload() {
        let json = r#"{
            "token": "eyJhbGciOi",
            "user": { "id": "65f0c", "email": "ana@acme.io", "name": "ana" }
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.token(), Some("eyJhbGciOi"));
        assert_eq!(session.user.id, "65f0c");
        assert_eq!(session.user.display_name(), "ana");
    }

    #[test]
    fn test_numeric_user_id() {
        let json = r#"{ "user": { "id": 7, "email": "a@b.c" } }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.user.id, "7");
        assert_eq!(session.token(), None);
    }

    #[test]
    fn test_display_name_falls_back_to_local_part() {
        let user = Identity::new("1", "bo@acme.io", "");
        assert_eq!(user.display_name(), "bo");
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::new(Identity::new("1", "a@b.c", "a"), Some("secret".into()));
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_serialize_round_trip_keeps_created_at() {
        let created = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let session =
            Session::new(Identity::new("1", "a@b.c", "a"), None).with_created_at(created);

        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("token"));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
