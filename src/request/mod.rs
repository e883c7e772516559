//! Request resolution
//!
//! Turns one inbound request, in whichever supported shape it arrives, into a
//! validated [`RequestRecord`]. Shapes:
//! - path segments plus an `expiry` query parameter ([`path`])
//! - a JSON body ([`body`])
//!
//! Resolution has no side effects and fails before any token is built.

pub mod body;
pub mod path;

pub use body::resolve_body;
pub use path::{resolve_chat, resolve_rtc, resolve_rte, resolve_rtm};

use crate::builder::Role;
use crate::error::{Result, TokenError};
use std::collections::HashMap;
use std::fmt;

/// Validity applied when a request carries no expiry
pub const DEFAULT_EXPIRATION_SECONDS: u32 = 3600;

/// How an RTC subject is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtcSubKind {
    /// Numeric uid
    Uid,
    /// Free-form account string
    UserAccount,
}

impl RtcSubKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "uid" => Ok(RtcSubKind::Uid),
            "userAccount" => Ok(RtcSubKind::UserAccount),
            other => Err(TokenError::UnsupportedTokenType(other.to_string())),
        }
    }
}

/// Whether a chat token covers the whole app or one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatSubKind {
    App,
    UserAccount,
}

impl ChatSubKind {
    /// `account` is accepted as an alias for `userAccount`
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "app" => Ok(ChatSubKind::App),
            "account" | "userAccount" => Ok(ChatSubKind::UserAccount),
            other => Err(TokenError::UnsupportedTokenType(other.to_string())),
        }
    }
}

/// Token kind and sub-kind of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Rtc(RtcSubKind),
    Rtm,
    Chat(ChatSubKind),
}

impl TokenKind {
    /// Label used in log lines and error messages
    pub fn label(self) -> &'static str {
        match self {
            TokenKind::Rtc(_) => "RTC",
            TokenKind::Rtm => "RTM",
            TokenKind::Chat(_) => "chat",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Rtc(RtcSubKind::Uid) => write!(f, "rtc/uid"),
            TokenKind::Rtc(RtcSubKind::UserAccount) => write!(f, "rtc/userAccount"),
            TokenKind::Rtm => write!(f, "rtm"),
            TokenKind::Chat(ChatSubKind::App) => write!(f, "chat/app"),
            TokenKind::Chat(ChatSubKind::UserAccount) => write!(f, "chat/userAccount"),
        }
    }
}

/// Identity a credential is bound to.
///
/// `""` and `"0"` are the wildcard: any identity may use the credential.
/// The raw value is kept so the wildcard reaches the builder unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Subject(String);

impl Subject {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.is_empty() || self.0 == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated token request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub kind: TokenKind,
    pub channel: Option<String>,
    pub subject: Subject,
    pub role: Role,
    pub expiration_seconds: u32,
    /// Messaging subject of a combined RTC+RTM request
    pub rtm_subject: Option<Subject>,
}

impl RequestRecord {
    pub fn new(kind: TokenKind, subject: Subject) -> Self {
        Self {
            kind,
            channel: None,
            subject,
            role: Role::Subscriber,
            expiration_seconds: DEFAULT_EXPIRATION_SECONDS,
            rtm_subject: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_expiration(mut self, seconds: u32) -> Self {
        self.expiration_seconds = seconds;
        self
    }

    pub fn with_rtm_subject(mut self, subject: Subject) -> Self {
        self.rtm_subject = Some(subject);
        self
    }

    /// Whether this record asks for an RTC and an RTM credential together
    pub fn is_combined(&self) -> bool {
        self.rtm_subject.is_some()
    }
}

/// Named path segments and query parameters of one request
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    path: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl RequestParams {
    pub fn new(path: HashMap<String, String>, query: HashMap<String, String>) -> Self {
        Self { path, query }
    }

    pub fn with_segment(mut self, name: &str, value: &str) -> Self {
        self.path.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    pub fn segment(&self, name: &str) -> Option<&str> {
        self.path.get(name).map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Parse an expiry given in seconds. Absent means the default; anything
/// that is not a plain unsigned 32-bit decimal is rejected.
pub fn parse_expiry(value: Option<&str>) -> Result<u32> {
    let Some(value) = value else {
        return Ok(DEFAULT_EXPIRATION_SECONDS);
    };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenError::InvalidExpiry(value.to_string()));
    }

    value
        .parse()
        .map_err(|_| TokenError::InvalidExpiry(value.to_string()))
}
