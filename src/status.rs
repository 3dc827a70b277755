//! Status codes and command kinds shared by requests and responses.
//!
//! The device reports a 32-bit status in every completion. [`Status`] keeps
//! the raw value so unknown vendor codes pass through untouched, while the
//! associated constants name the values defined by the protocol plus the two
//! host-side codes used for payload build and parse failures.

use std::fmt;

use derive_more::{From, Into};

/// Status code attached to a completed transaction.
///
/// # Examples
///
/// ```
/// use mbimlink::status::Status;
///
/// assert!(Status::SUCCESS.is_success());
/// assert_eq!(Status::READ_FAILURE.to_string(), "READ_FAILURE");
/// assert_eq!(Status::new(0x4000_0001).to_string(), "0x40000001");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, From, Into)]
pub struct Status(u32);

impl Status {
    /// The operation succeeded.
    pub const SUCCESS: Self = Self(0);
    /// The device is busy; retry later.
    pub const BUSY: Self = Self(1);
    /// The operation failed for an unspecified reason.
    pub const FAILURE: Self = Self(2);
    /// No SIM is inserted.
    pub const SIM_NOT_INSERTED: Self = Self(3);
    /// The SIM is unusable.
    pub const BAD_SIM: Self = Self(4);
    /// A PIN must be entered first.
    pub const PIN_REQUIRED: Self = Self(5);
    /// PIN protection is disabled.
    pub const PIN_DISABLED: Self = Self(6);
    /// The device is not registered with a network.
    pub const NOT_REGISTERED: Self = Self(7);
    /// No network providers were found.
    pub const PROVIDERS_NOT_FOUND: Self = Self(8);
    /// The device does not support the command.
    pub const NO_DEVICE_SUPPORT: Self = Self(9);
    /// The requested provider is not visible.
    pub const PROVIDER_NOT_VISIBLE: Self = Self(10);
    /// The requested data class is unavailable.
    pub const DATA_CLASS_NOT_AVAILABLE: Self = Self(11);
    /// Packet service is detached.
    pub const PACKET_SERVICE_DETACHED: Self = Self(12);
    /// No more contexts can be activated.
    pub const MAX_ACTIVATED_CONTEXTS: Self = Self(13);
    /// The device has not finished initialising.
    pub const NOT_INITIALIZED: Self = Self(14);
    /// A voice call blocks the operation.
    pub const VOICE_CALL_IN_PROGRESS: Self = Self(15);
    /// The context is not activated.
    pub const CONTEXT_NOT_ACTIVATED: Self = Self(16);
    /// The subscriber service is not activated.
    pub const SERVICE_NOT_ACTIVATED: Self = Self(17);
    /// The access point name was rejected.
    pub const INVALID_ACCESS_STRING: Self = Self(18);
    /// The user name or password was rejected.
    pub const INVALID_USER_NAME_PWD: Self = Self(19);
    /// The radio is switched off.
    pub const RADIO_POWER_OFF: Self = Self(20);
    /// The command parameters are invalid.
    pub const INVALID_PARAMETERS: Self = Self(21);
    /// Reading from the device failed or no response arrived in time.
    pub const READ_FAILURE: Self = Self(22);
    /// Writing to the device failed.
    pub const WRITE_FAILURE: Self = Self(23);
    /// Host-side failure to build a command payload.
    pub const BUILD_FAILURE: Self = Self(0xffff_fff0);
    /// Host-side failure to parse a response or indication payload.
    pub const PARSE_FAILURE: Self = Self(0xffff_fff1);

    /// Wrap a raw status value.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Return the raw status value.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Report whether the status denotes success.
    #[must_use]
    pub const fn is_success(self) -> bool { self.0 == Self::SUCCESS.0 }

    /// Symbolic name for known status values.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "SUCCESS",
            1 => "BUSY",
            2 => "FAILURE",
            3 => "SIM_NOT_INSERTED",
            4 => "BAD_SIM",
            5 => "PIN_REQUIRED",
            6 => "PIN_DISABLED",
            7 => "NOT_REGISTERED",
            8 => "PROVIDERS_NOT_FOUND",
            9 => "NO_DEVICE_SUPPORT",
            10 => "PROVIDER_NOT_VISIBLE",
            11 => "DATA_CLASS_NOT_AVAILABLE",
            12 => "PACKET_SERVICE_DETACHED",
            13 => "MAX_ACTIVATED_CONTEXTS",
            14 => "NOT_INITIALIZED",
            15 => "VOICE_CALL_IN_PROGRESS",
            16 => "CONTEXT_NOT_ACTIVATED",
            17 => "SERVICE_NOT_ACTIVATED",
            18 => "INVALID_ACCESS_STRING",
            19 => "INVALID_USER_NAME_PWD",
            20 => "RADIO_POWER_OFF",
            21 => "INVALID_PARAMETERS",
            22 => "READ_FAILURE",
            23 => "WRITE_FAILURE",
            0xffff_fff0 => "BUILD_FAILURE",
            0xffff_fff1 => "PARSE_FAILURE",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

/// Classification of an outbound command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Read the current value of a CID.
    Query,
    /// Change state or trigger an action.
    Set,
}

impl CommandType {
    /// Wire value of the command type.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Query => 0,
            Self::Set => 1,
        }
    }

    /// Parse a wire value, returning `None` for undefined command types.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Query),
            1 => Some(Self::Set),
            _ => None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Set => "set",
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{CommandType, Status};

    #[rstest]
    #[case(Status::SUCCESS, "SUCCESS")]
    #[case(Status::INVALID_PARAMETERS, "INVALID_PARAMETERS")]
    #[case(Status::WRITE_FAILURE, "WRITE_FAILURE")]
    #[case(Status::BUILD_FAILURE, "BUILD_FAILURE")]
    #[case(Status::PARSE_FAILURE, "PARSE_FAILURE")]
    #[case(Status::new(99), "0x00000063")]
    fn status_display(#[case] status: Status, #[case] expected: &str) {
        assert_eq!(status.to_string(), expected);
    }

    #[test]
    fn only_zero_is_success() {
        assert!(Status::new(0).is_success());
        assert!(!Status::FAILURE.is_success());
        assert!(!Status::BUSY.is_success());
    }

    #[rstest]
    #[case(CommandType::Query, 0)]
    #[case(CommandType::Set, 1)]
    fn command_type_wire_values(#[case] kind: CommandType, #[case] raw: u32) {
        assert_eq!(kind.as_u32(), raw);
        assert_eq!(CommandType::from_u32(raw), Some(kind));
    }

    #[test]
    fn undefined_command_type_is_rejected() {
        assert_eq!(CommandType::from_u32(2), None);
    }
}
