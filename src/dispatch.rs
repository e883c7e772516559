//! Credential dispatch
//!
//! Maps a [`RequestRecord`] onto [`TokenBuilder`] calls through a table keyed
//! by token kind. Combined RTC+RTM records invoke both paths against the same
//! expiry and succeed or fail as a unit.

use crate::builder::{unix_now, BuildError, TokenBuilder};
use crate::error::{Result, TokenError};
use crate::request::{ChatSubKind, RequestRecord, RtcSubKind, TokenKind};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An issued credential. Opaque to this crate.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({} bytes)", self.0.len())
    }
}

/// Result of a successful dispatch
#[derive(Debug, Clone)]
pub struct Issued {
    pub kind: TokenKind,
    pub token: Credential,
    /// Present only for combined requests
    pub rtm_token: Option<Credential>,
}

type Handler = fn(&dyn TokenBuilder, &RequestRecord, u32) -> Result<String>;

const DISPATCH_TABLE: [(TokenKind, Handler); 5] = [
    (TokenKind::Rtc(RtcSubKind::Uid), rtc_with_uid),
    (TokenKind::Rtc(RtcSubKind::UserAccount), rtc_with_account),
    (TokenKind::Rtm, rtm),
    (TokenKind::Chat(ChatSubKind::App), chat_app),
    (TokenKind::Chat(ChatSubKind::UserAccount), chat_user),
];

fn handler_for(kind: TokenKind) -> Result<Handler> {
    DISPATCH_TABLE
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, handler)| *handler)
        .ok_or_else(|| TokenError::UnsupportedTokenType(kind.to_string()))
}

/// Absolute expiry for a validity window starting at `now`
pub fn expire_at(now: u32, expiration_seconds: u32) -> Result<u32> {
    now.checked_add(expiration_seconds)
        .ok_or_else(|| TokenError::InvalidExpiry(expiration_seconds.to_string()))
}

/// Invokes the builder for validated requests
#[derive(Clone)]
pub struct Dispatcher {
    builder: Arc<dyn TokenBuilder>,
}

impl Dispatcher {
    pub fn new(builder: Arc<dyn TokenBuilder>) -> Self {
        Self { builder }
    }

    /// Dispatch using the current time
    pub fn dispatch(&self, record: &RequestRecord) -> Result<Issued> {
        self.dispatch_at(record, unix_now())
    }

    /// Dispatch with an explicit `now`. Every builder call made for this
    /// record shares the expiry derived from it.
    pub fn dispatch_at(&self, record: &RequestRecord, now: u32) -> Result<Issued> {
        let expire_at = expire_at(now, record.expiration_seconds)?;
        let builder = self.builder.as_ref();

        let issued = match &record.rtm_subject {
            None => {
                let token = handler_for(record.kind)?(builder, record, expire_at)?;
                Issued {
                    kind: record.kind,
                    token: Credential(token),
                    rtm_token: None,
                }
            }
            Some(rtm_subject) => {
                if !matches!(record.kind, TokenKind::Rtc(_)) {
                    return Err(TokenError::UnsupportedTokenType(format!(
                        "{} combined with RTM",
                        record.kind
                    )));
                }

                // The RTM half is login-only; the channel belongs to the RTC half
                let rtm_record = RequestRecord::new(TokenKind::Rtm, rtm_subject.clone())
                    .with_expiration(record.expiration_seconds);
                check_rtc(record)?;
                check_rtm_subject(&rtm_record)?;

                let rtc_handler = handler_for(record.kind)?;
                let rtc_result = rtc_handler(builder, record, expire_at);
                let rtm_result = rtm(builder, &rtm_record, expire_at);

                // RTC failures take precedence; a successful sibling is dropped
                match (rtc_result, rtm_result) {
                    (Ok(rtc_token), Ok(rtm_token)) => Issued {
                        kind: record.kind,
                        token: Credential(rtc_token),
                        rtm_token: Some(Credential(rtm_token)),
                    },
                    (Err(e), _) | (_, Err(e)) => return Err(e),
                }
            }
        };

        info!(
            kind = %issued.kind,
            channel = record.channel.as_deref().unwrap_or_default(),
            combined = issued.rtm_token.is_some(),
            expire_at,
            "Token generated"
        );

        Ok(issued)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

fn build_failed(kind: TokenKind) -> impl FnOnce(BuildError) -> TokenError {
    move |source| {
        warn!(kind = %kind, error = %source, "Token builder failed");
        TokenError::Build {
            kind: kind.label(),
            source,
        }
    }
}

fn channel_of(record: &RequestRecord) -> Result<&str> {
    record
        .channel
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(TokenError::MissingChannel)
}

fn check_rtm_subject(record: &RequestRecord) -> Result<()> {
    if record.subject.is_wildcard() {
        return Err(TokenError::InvalidSubject(format!(
            "\"{}\" is not a valid RTM user ID",
            record.subject
        )));
    }
    Ok(())
}

/// Numeric uid of an RTC record; the empty wildcard is uid 0
fn rtc_uid(record: &RequestRecord) -> Result<u32> {
    let subject = record.subject.as_str();
    if subject.is_empty() {
        return Ok(0);
    }

    subject.parse::<u32>().map_err(|e| {
        TokenError::InvalidSubject(format!("failed to parse uid \"{}\": {}", subject, e))
    })
}

/// Everything the RTC handlers reject before calling the builder
fn check_rtc(record: &RequestRecord) -> Result<()> {
    channel_of(record)?;
    if record.kind == TokenKind::Rtc(RtcSubKind::Uid) {
        rtc_uid(record)?;
    }
    Ok(())
}

fn rtc_with_uid(builder: &dyn TokenBuilder, record: &RequestRecord, expire_at: u32) -> Result<String> {
    let channel = channel_of(record)?;
    let uid = rtc_uid(record)?;

    debug!(channel, uid, role = %record.role, "Building RTC token with uid");
    builder
        .build_rtc_with_uid(channel, uid, record.role, expire_at)
        .map_err(build_failed(record.kind))
}

fn rtc_with_account(
    builder: &dyn TokenBuilder,
    record: &RequestRecord,
    expire_at: u32,
) -> Result<String> {
    let channel = channel_of(record)?;
    let account = record.subject.as_str();

    // An empty account is the wildcard, which travels as uid 0
    if account.is_empty() {
        return rtc_with_uid(builder, record, expire_at);
    }

    debug!(channel, account, role = %record.role, "Building RTC token with user account");
    builder
        .build_rtc_with_account(channel, account, record.role, expire_at)
        .map_err(build_failed(record.kind))
}

fn rtm(builder: &dyn TokenBuilder, record: &RequestRecord, expire_at: u32) -> Result<String> {
    check_rtm_subject(record)?;

    builder
        .build_rtm(record.subject.as_str(), expire_at, record.channel.as_deref())
        .map_err(build_failed(TokenKind::Rtm))
}

fn chat_app(builder: &dyn TokenBuilder, record: &RequestRecord, expire_at: u32) -> Result<String> {
    builder
        .build_chat_app(expire_at)
        .map_err(build_failed(record.kind))
}

fn chat_user(builder: &dyn TokenBuilder, record: &RequestRecord, expire_at: u32) -> Result<String> {
    let user_id = record.subject.as_str();
    if user_id.is_empty() {
        return Err(TokenError::MissingSubject("chat user ID"));
    }

    builder
        .build_chat_user(user_id, expire_at)
        .map_err(build_failed(record.kind))
}
