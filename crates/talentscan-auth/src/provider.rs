//! Mailbox providers supported by credential sign-in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Mailbox provider tag sent with credential logins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    /// Gmail over IMAP.
    Gmail,
    /// Outlook, Hotmail and Live.
    Outlook,
    /// Yahoo Mail.
    Yahoo,
}

impl MailProvider {
    /// All supported providers.
    pub const ALL: [Self; 3] = [Self::Gmail, Self::Outlook, Self::Yahoo];

    /// Wire tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
            Self::Yahoo => "yahoo",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Gmail => "Gmail",
            Self::Outlook => "Outlook / Hotmail / Live",
            Self::Yahoo => "Yahoo Mail",
        }
    }

    /// IMAP server host.
    #[must_use]
    pub const fn imap_host(self) -> &'static str {
        match self {
            Self::Gmail => "imap.gmail.com",
            Self::Outlook => "outlook.office365.com",
            Self::Yahoo => "imap.mail.yahoo.com",
        }
    }

    /// IMAP server port (implicit TLS).
    #[must_use]
    pub const fn imap_port(self) -> u16 {
        993
    }

    /// Whether the provider requires an app password instead of the account password.
    #[must_use]
    pub const fn requires_app_password(self) -> bool {
        !matches!(self, Self::Outlook)
    }

    /// Where to generate an app password.
    #[must_use]
    pub const fn help_url(self) -> &'static str {
        match self {
            Self::Gmail => "https://support.google.com/accounts/answer/185833",
            Self::Outlook => {
                "https://support.microsoft.com/en-us/account-billing/using-app-passwords-with-apps-that-don-t-support-two-step-verification-5896ed9b-4263-e681-128a-a6f2979a7944"
            }
            Self::Yahoo => "https://help.yahoo.com/kb/generate-third-party-passwords-sln15241.html",
        }
    }

    /// Infers the provider from the domain of a mailbox address.
    ///
    /// Returns `None` for addresses without a domain or with an unknown one.
    #[must_use]
    pub fn from_address(email: &str) -> Option<Self> {
        let (_, domain) = email.rsplit_once('@')?;
        let domain = domain.to_ascii_lowercase();

        if domain.contains("gmail") {
            Some(Self::Gmail)
        } else if ["outlook", "hotmail", "live"]
            .iter()
            .any(|d| domain.contains(d))
        {
            Some(Self::Outlook)
        } else if domain.contains("yahoo") {
            Some(Self::Yahoo)
        } else {
            None
        }
    }
}

impl fmt::Display for MailProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for MailProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unsupported provider: {s}"))
    }
}
