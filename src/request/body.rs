//! Resolution of JSON token requests (`POST /getToken`)

use crate::builder::Role;
use crate::error::{Result, TokenError};
use crate::request::{
    parse_expiry, ChatSubKind, RequestRecord, RtcSubKind, Subject, TokenKind,
    DEFAULT_EXPIRATION_SECONDS,
};
use serde::Deserialize;
use serde_json::Value;

/// Body of a token request. `uid` and `expire` may be JSON strings or numbers.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequestBody {
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub uid: Option<Value>,
    #[serde(default)]
    pub expire: Option<Value>,
}

/// Decode and validate a JSON body.
///
/// Rules per `tokenType`:
/// - `rtc`: `channel` required; a `uid` that parses as u32 selects the numeric
///   sub-kind, anything else an account; absent `uid` is the wildcard
/// - `rtm`: `uid` required and not the wildcard; `channel` optional
/// - `chat`: absent or empty `uid` selects the app token
pub fn resolve_body(body: &[u8]) -> Result<RequestRecord> {
    let request: TokenRequestBody =
        serde_json::from_slice(body).map_err(|e| TokenError::MalformedBody(e.to_string()))?;

    let kind = match request.token_type.as_str() {
        "rtc" | "rtm" | "chat" => request.token_type.as_str(),
        other => return Err(TokenError::UnsupportedTokenType(other.to_string())),
    };

    let expiration = expire_seconds(request.expire.as_ref())?;
    let subject = Subject::new(uid_text(request.uid.as_ref())?);
    let channel = request.channel.filter(|c| !c.is_empty());

    let record = match kind {
        "rtc" => {
            let channel = channel.ok_or(TokenError::MissingChannel)?;
            let sub_kind = if subject.is_wildcard() || subject.as_str().parse::<u32>().is_ok() {
                RtcSubKind::Uid
            } else {
                RtcSubKind::UserAccount
            };

            RequestRecord::new(TokenKind::Rtc(sub_kind), subject)
                .with_channel(channel)
                .with_role(Role::from_param(request.role.as_deref()))
        }
        "rtm" => {
            if subject.is_wildcard() {
                return Err(TokenError::InvalidSubject(format!(
                    "\"{}\" is not a valid RTM user ID",
                    subject
                )));
            }

            let record = RequestRecord::new(TokenKind::Rtm, subject);
            match channel {
                Some(channel) => record.with_channel(channel),
                None => record,
            }
        }
        _ => {
            let sub_kind = if subject.as_str().is_empty() {
                ChatSubKind::App
            } else {
                ChatSubKind::UserAccount
            };
            RequestRecord::new(TokenKind::Chat(sub_kind), subject)
        }
    };

    Ok(record.with_expiration(expiration))
}

fn expire_seconds(value: Option<&Value>) -> Result<u32> {
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_EXPIRATION_SECONDS),
        Some(Value::String(s)) => parse_expiry(Some(s.as_str())),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| TokenError::InvalidExpiry(n.to_string())),
        Some(other) => Err(TokenError::InvalidExpiry(other.to_string())),
    }
}

fn uid_text(value: Option<&Value>) -> Result<String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) if n.is_u64() => Ok(n.to_string()),
        Some(other) => Err(TokenError::InvalidSubject(format!("unsupported uid {}", other))),
    }
}
