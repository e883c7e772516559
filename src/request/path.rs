//! Resolution of path-shaped requests (`/rtc/...`, `/rtm/...`, `/rte/...`, `/chat/...`)

use crate::builder::Role;
use crate::error::{Result, TokenError};
use crate::request::{
    parse_expiry, ChatSubKind, RequestParams, RequestRecord, RtcSubKind, Subject, TokenKind,
};

/// Path segment names
pub const CHANNEL_NAME: &str = "channelName";
pub const ROLE: &str = "role";
pub const TOKEN_TYPE: &str = "tokenType";
pub const RTC_UID: &str = "rtcuid";
pub const RTM_UID: &str = "rtmuid";
pub const CHAT_TYPE: &str = "chatType";
pub const CHAT_ID: &str = "chatid";

/// Query parameter carrying the validity in seconds
pub const EXPIRY: &str = "expiry";

/// `/rtc/:channelName/:role/:tokenType/:rtcuid/`
pub fn resolve_rtc(params: &RequestParams) -> Result<RequestRecord> {
    let channel = params
        .segment(CHANNEL_NAME)
        .filter(|c| !c.is_empty())
        .ok_or(TokenError::MissingChannel)?;
    let sub_kind = RtcSubKind::parse(params.segment(TOKEN_TYPE).unwrap_or_default())?;
    let expiration = parse_expiry(params.query(EXPIRY))?;

    // An absent uid admits any user
    let subject = Subject::new(params.segment(RTC_UID).unwrap_or_default());

    Ok(RequestRecord::new(TokenKind::Rtc(sub_kind), subject)
        .with_channel(channel)
        .with_role(Role::from_param(params.segment(ROLE)))
        .with_expiration(expiration))
}

/// `/rte/:channelName/:role/:tokenType/:rtcuid/[:rtmuid/]`
///
/// The messaging subject is the explicit `rtmuid` when given, otherwise the
/// RTC subject. Messaging cannot be granted to the wildcard.
pub fn resolve_rte(params: &RequestParams) -> Result<RequestRecord> {
    let record = resolve_rtc(params)?;

    let rtm_subject = match params.segment(RTM_UID) {
        Some(explicit) => Subject::new(explicit),
        None => record.subject.clone(),
    };

    if rtm_subject.is_wildcard() {
        return Err(TokenError::InvalidSubject(format!(
            "\"{}\" cannot be used for RTM; provide an explicit RTM user ID",
            rtm_subject
        )));
    }

    Ok(record.with_rtm_subject(rtm_subject))
}

/// `/rtm/:rtmuid/`
pub fn resolve_rtm(params: &RequestParams) -> Result<RequestRecord> {
    let expiration = parse_expiry(params.query(EXPIRY))?;
    let subject = Subject::new(params.segment(RTM_UID).unwrap_or_default());

    if subject.is_wildcard() {
        return Err(TokenError::InvalidSubject(format!(
            "\"{}\" is not a valid RTM user ID",
            subject
        )));
    }

    Ok(RequestRecord::new(TokenKind::Rtm, subject).with_expiration(expiration))
}

/// `/chat/app/` and `/chat/account/:chatid/`
pub fn resolve_chat(params: &RequestParams) -> Result<RequestRecord> {
    let sub_kind = ChatSubKind::parse(params.segment(CHAT_TYPE).unwrap_or_default())?;
    let subject = Subject::new(params.segment(CHAT_ID).unwrap_or_default());

    if sub_kind == ChatSubKind::UserAccount && subject.as_str().is_empty() {
        return Err(TokenError::MissingSubject("chat ID for a userAccount token"));
    }

    let expiration = parse_expiry(params.query(EXPIRY))?;

    Ok(RequestRecord::new(TokenKind::Chat(sub_kind), subject).with_expiration(expiration))
}
