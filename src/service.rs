//! Device service identifiers.
//!
//! Every command and indication is addressed to a device service named by a
//! UUID. The identifier travels on the wire in network byte order, which is
//! the byte layout [`uuid::Uuid::as_bytes`] already uses.

use std::{fmt, str::FromStr};

use uuid::Uuid;

/// Number of bytes a service identifier occupies on the wire.
pub const SERVICE_ID_LEN: usize = 16;

/// UUID naming the device service a command targets.
///
/// # Examples
///
/// ```
/// use mbimlink::service::ServiceId;
///
/// let id: ServiceId = "basic-connect".parse().expect("known alias");
/// assert_eq!(id, ServiceId::BASIC_CONNECT);
/// assert_eq!(id.to_string(), "a289cc33-bcbb-8b4f-b6b0-133ec2aae6df");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(Uuid);

impl ServiceId {
    pub const BASIC_CONNECT: Self = Self(Uuid::from_u128(0xa289_cc33_bcbb_8b4f_b6b0_133e_c2aa_e6df));
    pub const SMS: Self = Self(Uuid::from_u128(0x533f_beeb_14fe_4467_9f90_33a2_23e5_6c3f));
    pub const USSD: Self = Self(Uuid::from_u128(0xe550_a0c8_5e82_479e_82f7_10ab_f4c3_351f));
    pub const PHONEBOOK: Self = Self(Uuid::from_u128(0x4bf3_8476_1e6a_41db_b1d8_bed2_89c2_5bdb));
    pub const STK: Self = Self(Uuid::from_u128(0xd8f2_0131_fcb5_4e17_8602_d6ed_3816_164c));
    pub const AUTH: Self = Self(Uuid::from_u128(0x1d2b_5ff7_0aa1_48b2_aa52_50f1_5767_174e));
    pub const DSS: Self = Self(Uuid::from_u128(0xc08a_26dd_7718_4382_8482_6e0d_583c_4d0e));

    const ALIASES: [(&'static str, Self); 7] = [
        ("basic-connect", Self::BASIC_CONNECT),
        ("sms", Self::SMS),
        ("ussd", Self::USSD),
        ("phonebook", Self::PHONEBOOK),
        ("stk", Self::STK),
        ("auth", Self::AUTH),
        ("dss", Self::DSS),
    ];

    /// Wrap an arbitrary UUID, for example a vendor-specific service.
    #[must_use]
    pub const fn new(uuid: Uuid) -> Self { Self(uuid) }

    /// Construct from the 16 on-wire bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SERVICE_ID_LEN]) -> Self { Self(Uuid::from_bytes(bytes)) }

    /// Return the on-wire byte representation.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SERVICE_ID_LEN] { self.0.as_bytes() }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn uuid(&self) -> Uuid { self.0 }

    /// Short alias for well-known services.
    #[must_use]
    pub fn alias(&self) -> Option<&'static str> {
        Self::ALIASES
            .iter()
            .find(|(_, id)| id == self)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(&self.0, f) }
}

impl FromStr for ServiceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((_, id)) = Self::ALIASES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
        {
            return Ok(*id);
        }
        Uuid::parse_str(s).map(Self)
    }
}
