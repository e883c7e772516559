//! Service types, privileges and roles carried inside an access token

use std::collections::BTreeMap;
use std::fmt;

/// Product a token section authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceType {
    /// Real-time audio/video
    Rtc,
    /// Real-time messaging
    Rtm,
    /// Chat
    Chat,
}

impl ServiceType {
    /// Wire code of the service
    pub fn code(self) -> u16 {
        match self {
            ServiceType::Rtc => 1,
            ServiceType::Rtm => 2,
            ServiceType::Chat => 5,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(ServiceType::Rtc),
            2 => Some(ServiceType::Rtm),
            5 => Some(ServiceType::Chat),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Rtc => write!(f, "rtc"),
            ServiceType::Rtm => write!(f, "rtm"),
            ServiceType::Chat => write!(f, "chat"),
        }
    }
}

/// A single privilege. Codes are scoped to their service, so the same number
/// means different things in different services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    JoinChannel,
    PublishAudioStream,
    PublishVideoStream,
    PublishDataStream,
    Login,
    ChatUser,
    ChatApp,
}

impl Privilege {
    pub fn code(self) -> u16 {
        match self {
            Privilege::JoinChannel => 1,
            Privilege::PublishAudioStream => 2,
            Privilege::PublishVideoStream => 3,
            Privilege::PublishDataStream => 4,
            Privilege::Login => 1,
            Privilege::ChatUser => 1,
            Privilege::ChatApp => 2,
        }
    }

    pub fn service_type(self) -> ServiceType {
        match self {
            Privilege::JoinChannel
            | Privilege::PublishAudioStream
            | Privilege::PublishVideoStream
            | Privilege::PublishDataStream => ServiceType::Rtc,
            Privilege::Login => ServiceType::Rtm,
            Privilege::ChatUser | Privilege::ChatApp => ServiceType::Chat,
        }
    }
}

/// Role of an RTC participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// May join and publish audio, video and data streams
    Publisher,
    /// May only join
    #[default]
    Subscriber,
}

impl Role {
    /// Resolve a role from a request parameter.
    ///
    /// Only the exact string `"publisher"` selects [`Role::Publisher`]; any
    /// other value, including differently cased spellings, is a subscriber.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("publisher") => Role::Publisher,
            _ => Role::Subscriber,
        }
    }

    /// RTC privileges granted to this role
    pub fn rtc_privileges(self) -> &'static [Privilege] {
        match self {
            Role::Publisher => &[
                Privilege::JoinChannel,
                Privilege::PublishAudioStream,
                Privilege::PublishVideoStream,
                Privilege::PublishDataStream,
            ],
            Role::Subscriber => &[Privilege::JoinChannel],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Publisher => write!(f, "publisher"),
            Role::Subscriber => write!(f, "subscriber"),
        }
    }
}

/// Privilege code to expiry (seconds after issue), ordered by code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeSet {
    entries: BTreeMap<u16, u32>,
}

impl PrivilegeSet {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add a privilege, replacing any previous expiry for the same code
    pub fn add(&mut self, privilege: Privilege, expire: u32) {
        self.entries.insert(privilege.code(), expire);
    }

    pub(crate) fn insert_code(&mut self, code: u16, expire: u32) {
        self.entries.insert(code, expire);
    }

    pub fn contains(&self, privilege: Privilege) -> bool {
        self.entries.contains_key(&privilege.code())
    }

    pub fn expire_of(&self, privilege: Privilege) -> Option<u32> {
        self.entries.get(&privilege.code()).copied()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (u16, u32)> + '_ {
        self.entries.iter().map(|(code, expire)| (*code, *expire))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_param() {
        assert_eq!(Role::from_param(Some("publisher")), Role::Publisher);
        assert_eq!(Role::from_param(Some("subscriber")), Role::Subscriber);
        assert_eq!(Role::from_param(Some("Publisher")), Role::Subscriber);
        assert_eq!(Role::from_param(Some("pub")), Role::Subscriber);
        assert_eq!(Role::from_param(None), Role::Subscriber);
    }

    #[test]
    fn test_role_privileges() {
        assert_eq!(Role::Publisher.rtc_privileges().len(), 4);
        assert_eq!(Role::Subscriber.rtc_privileges(), &[Privilege::JoinChannel]);
        assert!(Role::Publisher
            .rtc_privileges()
            .iter()
            .all(|p| p.service_type() == ServiceType::Rtc));
    }

    #[test]
    fn test_privilege_set_orders_by_code() {
        let mut set = PrivilegeSet::new();
        set.add(Privilege::PublishDataStream, 60);
        set.add(Privilege::JoinChannel, 60);
        set.add(Privilege::JoinChannel, 120);

        let codes: Vec<_> = set.iter().collect();
        assert_eq!(codes, vec![(1, 120), (4, 60)]);
        assert!(set.contains(Privilege::JoinChannel));
        assert!(!set.contains(Privilege::PublishAudioStream));
    }

    #[test]
    fn test_service_type_codes() {
        for ty in [ServiceType::Rtc, ServiceType::Rtm, ServiceType::Chat] {
            assert_eq!(ServiceType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(ServiceType::from_code(4), None);
    }
}
