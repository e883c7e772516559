//! Credential construction
//!
//! The dispatch layer only sees [`TokenBuilder`], one method per token kind.
//! [`AccessTokenBuilder`] is the production implementation producing
//! version `007` access tokens:
//! - RTC: channel + uid with join (and, for publishers, publish) privileges
//! - RTM: login privilege for a user, optionally scoped to a channel
//! - Chat: either the whole app or one user

mod access_token;
mod packing;
mod privileges;

pub use access_token::{AccessToken, BuildError, Service, VERSION};
pub use privileges::{Privilege, PrivilegeSet, Role, ServiceType};

use crate::config::ServiceConfig;
use rand::Rng;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Capability interface over the credential encoder.
///
/// All `expire_at` arguments are absolute Unix timestamps.
pub trait TokenBuilder: Send + Sync {
    fn build_rtc_with_uid(
        &self,
        channel: &str,
        uid: u32,
        role: Role,
        expire_at: u32,
    ) -> Result<String, BuildError>;

    fn build_rtc_with_account(
        &self,
        channel: &str,
        account: &str,
        role: Role,
        expire_at: u32,
    ) -> Result<String, BuildError>;

    fn build_rtm(
        &self,
        user_id: &str,
        expire_at: u32,
        channel: Option<&str>,
    ) -> Result<String, BuildError>;

    fn build_chat_app(&self, expire_at: u32) -> Result<String, BuildError>;

    fn build_chat_user(&self, user_id: &str, expire_at: u32) -> Result<String, BuildError>;
}

/// Current time as a Unix timestamp in seconds
pub fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Builds signed version `007` tokens from an app id and certificate
#[derive(Clone)]
pub struct AccessTokenBuilder {
    app_id: String,
    app_certificate: String,
}

impl AccessTokenBuilder {
    pub fn new(app_id: impl Into<String>, app_certificate: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_certificate: app_certificate.into(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.app_id(), config.app_certificate())
    }

    /// Start a token issued now. Returns the token and the validity window
    /// in seconds, which is zero when `expire_at` is already in the past.
    fn issue(&self, expire_at: u32) -> (AccessToken, u32) {
        let issue_ts = unix_now();
        let expire = expire_at.saturating_sub(issue_ts);
        let salt = rand::rng().random_range(1..=99_999_999);
        (AccessToken::new(self.app_id.clone(), issue_ts, expire, salt), expire)
    }

    fn rtc_service(channel: &str, uid: &str, role: Role, expire: u32) -> Service {
        role.rtc_privileges()
            .iter()
            .fold(Service::rtc(channel, uid), |service, privilege| {
                service.with_privilege(*privilege, expire)
            })
    }
}

impl TokenBuilder for AccessTokenBuilder {
    fn build_rtc_with_uid(
        &self,
        channel: &str,
        uid: u32,
        role: Role,
        expire_at: u32,
    ) -> Result<String, BuildError> {
        // uid 0 is encoded as the empty account, which admits any user
        let account = if uid == 0 { String::new() } else { uid.to_string() };
        self.build_rtc_with_account(channel, &account, role, expire_at)
    }

    fn build_rtc_with_account(
        &self,
        channel: &str,
        account: &str,
        role: Role,
        expire_at: u32,
    ) -> Result<String, BuildError> {
        let (mut token, expire) = self.issue(expire_at);
        token.add_service(Self::rtc_service(channel, account, role, expire));
        token.build(&self.app_certificate)
    }

    fn build_rtm(
        &self,
        user_id: &str,
        expire_at: u32,
        channel: Option<&str>,
    ) -> Result<String, BuildError> {
        let (mut token, expire) = self.issue(expire_at);
        token.add_service(Service::rtm(user_id).with_privilege(Privilege::Login, expire));

        if let Some(channel) = channel.filter(|c| !c.is_empty()) {
            token.add_service(Self::rtc_service(channel, user_id, Role::Publisher, expire));
        }

        token.build(&self.app_certificate)
    }

    fn build_chat_app(&self, expire_at: u32) -> Result<String, BuildError> {
        let (mut token, expire) = self.issue(expire_at);
        token.add_service(Service::chat("").with_privilege(Privilege::ChatApp, expire));
        token.build(&self.app_certificate)
    }

    fn build_chat_user(&self, user_id: &str, expire_at: u32) -> Result<String, BuildError> {
        let (mut token, expire) = self.issue(expire_at);
        token.add_service(Service::chat(user_id).with_privilege(Privilege::ChatUser, expire));
        token.build(&self.app_certificate)
    }
}

impl fmt::Debug for AccessTokenBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenBuilder")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"[REDACTED]")
            .finish()
    }
}
