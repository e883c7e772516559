//! Version `007` access tokens
//!
//! Token layout (integers little-endian):
//! - `"007"` followed by standard base64 of the zlib-compressed content
//! - content: length-prefixed signature, then the body
//! - body: app id, issue timestamp, expire (seconds after issue), salt,
//!   service count, then each service ordered by service type
//!
//! The signature is `HMAC-SHA256(key, body)` where
//! `key = HMAC-SHA256(salt, HMAC-SHA256(issue_ts, certificate))`.

use crate::builder::packing::{Packer, Unpacker};
use crate::builder::privileges::{Privilege, PrivilegeSet, ServiceType};
use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use thiserror::Error;

/// Version prefix of every token
pub const VERSION: &str = "007";

/// Length of app ids and certificates (hex characters)
const KEY_LENGTH: usize = 32;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid app id: expected 32 hex characters")]
    InvalidAppId,

    #[error("invalid app certificate: expected 32 hex characters")]
    InvalidAppCertificate,

    #[error("unsupported token version: '{0}'")]
    UnsupportedVersion(String),

    #[error("token decode error: {0}")]
    DecodeError(String),

    #[error("field too long: {len} bytes, at most {max} allowed")]
    FieldTooLong { len: usize, max: usize },

    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}

/// One authorized product inside a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Service {
    Rtc {
        channel: String,
        uid: String,
        privileges: PrivilegeSet,
    },
    Rtm {
        user_id: String,
        privileges: PrivilegeSet,
    },
    Chat {
        user_id: String,
        privileges: PrivilegeSet,
    },
}

impl Service {
    pub fn rtc(channel: impl Into<String>, uid: impl Into<String>) -> Self {
        Service::Rtc {
            channel: channel.into(),
            uid: uid.into(),
            privileges: PrivilegeSet::new(),
        }
    }

    pub fn rtm(user_id: impl Into<String>) -> Self {
        Service::Rtm {
            user_id: user_id.into(),
            privileges: PrivilegeSet::new(),
        }
    }

    pub fn chat(user_id: impl Into<String>) -> Self {
        Service::Chat {
            user_id: user_id.into(),
            privileges: PrivilegeSet::new(),
        }
    }

    /// Grant a privilege valid for `expire` seconds after issue
    pub fn with_privilege(mut self, privilege: Privilege, expire: u32) -> Self {
        debug_assert_eq!(privilege.service_type(), self.service_type());
        self.privileges_mut().add(privilege, expire);
        self
    }

    pub fn service_type(&self) -> ServiceType {
        match self {
            Service::Rtc { .. } => ServiceType::Rtc,
            Service::Rtm { .. } => ServiceType::Rtm,
            Service::Chat { .. } => ServiceType::Chat,
        }
    }

    pub fn privileges(&self) -> &PrivilegeSet {
        match self {
            Service::Rtc { privileges, .. }
            | Service::Rtm { privileges, .. }
            | Service::Chat { privileges, .. } => privileges,
        }
    }

    fn privileges_mut(&mut self) -> &mut PrivilegeSet {
        match self {
            Service::Rtc { privileges, .. }
            | Service::Rtm { privileges, .. }
            | Service::Chat { privileges, .. } => privileges,
        }
    }

    fn pack(&self, packer: &mut Packer) -> Result<(), BuildError> {
        packer
            .put_u16(self.service_type().code())
            .put_map(self.privileges().iter());

        match self {
            Service::Rtc { channel, uid, .. } => {
                packer.put_str(channel)?.put_str(uid)?;
            }
            Service::Rtm { user_id, .. } | Service::Chat { user_id, .. } => {
                packer.put_str(user_id)?;
            }
        }
        Ok(())
    }

    fn unpack(service_type: ServiceType, unpacker: &mut Unpacker<'_>) -> Result<Self, BuildError> {
        let mut privileges = PrivilegeSet::new();
        for (code, expire) in unpacker.map()? {
            privileges.insert_code(code, expire);
        }

        let service = match service_type {
            ServiceType::Rtc => Service::Rtc {
                channel: unpacker.string()?,
                uid: unpacker.string()?,
                privileges,
            },
            ServiceType::Rtm => Service::Rtm {
                user_id: unpacker.string()?,
                privileges,
            },
            ServiceType::Chat => Service::Chat {
                user_id: unpacker.string()?,
                privileges,
            },
        };

        Ok(service)
    }
}

/// A signed, time-bounded access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    app_id: String,
    issue_ts: u32,
    expire: u32,
    salt: u32,
    services: BTreeMap<u16, Service>,
    signature: Vec<u8>,
}

impl AccessToken {
    /// Create an unsigned token issued at `issue_ts`, valid for `expire` seconds
    pub fn new(app_id: impl Into<String>, issue_ts: u32, expire: u32, salt: u32) -> Self {
        Self {
            app_id: app_id.into(),
            issue_ts,
            expire,
            salt,
            services: BTreeMap::new(),
            signature: Vec::new(),
        }
    }

    /// Add a service, replacing any previous service of the same type
    pub fn add_service(&mut self, service: Service) {
        self.services.insert(service.service_type().code(), service);
    }

    /// Sign with the app certificate and encode
    pub fn build(&self, app_certificate: &str) -> Result<String, BuildError> {
        if !is_hex_key(&self.app_id) {
            return Err(BuildError::InvalidAppId);
        }
        if !is_hex_key(app_certificate) {
            return Err(BuildError::InvalidAppCertificate);
        }

        let body = self.pack_body()?;
        let mut mac = signing_mac(app_certificate, self.issue_ts, self.salt);
        mac.update(&body);
        let signature = mac.finalize().into_bytes();

        let mut content = Packer::new();
        content.put_bytes(&signature)?.put_raw(&body);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&content.into_bytes())?;
        let compressed = encoder.finish()?;

        Ok(format!("{}{}", VERSION, STANDARD.encode(compressed)))
    }

    /// Decode a token without verifying its signature
    pub fn parse(token: &str) -> Result<Self, BuildError> {
        let encoded = token
            .strip_prefix(VERSION)
            .ok_or_else(|| BuildError::UnsupportedVersion(token.chars().take(3).collect()))?;

        let compressed = STANDARD
            .decode(encoded)
            .map_err(|e| BuildError::DecodeError(e.to_string()))?;

        let mut content = Vec::new();
        ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut content)?;

        let mut unpacker = Unpacker::new(&content);
        let signature = unpacker.bytes()?.to_vec();
        let mut token = Self::new(unpacker.string()?, unpacker.u32()?, unpacker.u32()?, unpacker.u32()?);
        token.signature = signature;

        let count = unpacker.u16()?;
        for _ in 0..count {
            let code = unpacker.u16()?;
            let service_type = ServiceType::from_code(code)
                .ok_or_else(|| BuildError::DecodeError(format!("unknown service type {}", code)))?;
            token.add_service(Service::unpack(service_type, &mut unpacker)?);
        }

        if !unpacker.is_empty() {
            return Err(BuildError::DecodeError("trailing bytes after services".to_string()));
        }

        Ok(token)
    }

    /// Check the signature of a parsed token against an app certificate
    pub fn verify(&self, app_certificate: &str) -> bool {
        let Ok(body) = self.pack_body() else {
            return false;
        };
        let mut mac = signing_mac(app_certificate, self.issue_ts, self.salt);
        mac.update(&body);
        mac.verify_slice(&self.signature).is_ok()
    }

    fn pack_body(&self) -> Result<Vec<u8>, BuildError> {
        let mut packer = Packer::new();
        packer
            .put_str(&self.app_id)?
            .put_u32(self.issue_ts)
            .put_u32(self.expire)
            .put_u32(self.salt)
            .put_u16(self.services.len() as u16);

        for service in self.services.values() {
            service.pack(&mut packer)?;
        }

        Ok(packer.into_bytes())
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn issue_ts(&self) -> u32 {
        self.issue_ts
    }

    /// Validity in seconds after issue
    pub fn expire(&self) -> u32 {
        self.expire
    }

    /// Absolute expiry as a Unix timestamp
    pub fn expires_at(&self) -> u32 {
        self.issue_ts.saturating_add(self.expire)
    }

    pub fn salt(&self) -> u32 {
        self.salt
    }

    pub fn service(&self, service_type: ServiceType) -> Option<&Service> {
        self.services.get(&service_type.code())
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }
}

/// HMAC keyed by the per-token signing key
fn signing_mac(app_certificate: &str, issue_ts: u32, salt: u32) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(&issue_ts.to_le_bytes()).expect("HMAC can take key of any size");
    mac.update(app_certificate.as_bytes());
    let issued = mac.finalize().into_bytes();

    let mut mac =
        HmacSha256::new_from_slice(&salt.to_le_bytes()).expect("HMAC can take key of any size");
    mac.update(&issued);
    let key = mac.finalize().into_bytes();

    HmacSha256::new_from_slice(&key).expect("HMAC can take key of any size")
}

fn is_hex_key(value: &str) -> bool {
    value.len() == KEY_LENGTH && value.bytes().all(|b| b.is_ascii_hexdigit())
}
