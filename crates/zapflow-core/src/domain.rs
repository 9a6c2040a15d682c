use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque contact identifier, assigned at import time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(pub Uuid);

impl ContactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-contact delivery status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Pending,
    Sent,
    Skipped,
    Error,
}

impl ContactStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single imported contact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub id: ContactId,
    /// Phone substring as it appeared in the pasted text.
    pub raw: String,
    /// Canonical digits-only phone key.
    pub phone: String,
    pub name: Option<String>,
    pub status: ContactStatus,
}

impl Contact {
    pub fn new(raw: impl Into<String>, phone: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: ContactId::new(),
            raw: raw.into(),
            phone: phone.into(),
            name,
            status: ContactStatus::Pending,
        }
    }

    /// Name if present, otherwise the canonical phone.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.phone)
    }
}

/// How messages leave the tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelMode {
    /// Open a web-chat compose link per contact.
    DirectLink,
    /// Forward a send request to the automation server.
    RemoteServer,
}

impl ChannelMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "web" | "direct" | "direct-link" | "link" => Some(Self::DirectLink),
            "server" | "remote" | "remote-server" | "socket" => Some(Self::RemoteServer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectLink => "direct-link",
            Self::RemoteServer => "remote-server",
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3001";

/// Session configuration. Replaced wholesale when the operator saves settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: ChannelMode,
    pub server_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: ChannelMode::DirectLink,
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

impl SessionConfig {
    /// Server URL without a trailing slash, ready for path joins.
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}
