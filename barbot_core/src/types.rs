//! Values exchanged with the mainboard firmware.

use std::collections::BTreeSet;
use std::fmt;

/// Outcome of one dispatcher call.
///
/// `return_parameters` holds a GET's value, or a failed DO's
/// `ERROR` payload `[code, extra..]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub success: bool,
    pub return_parameters: Option<Vec<String>>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            return_parameters: None,
        }
    }

    pub fn value(v: String) -> Self {
        Self {
            success: true,
            return_parameters: Some(vec![v]),
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    pub fn mainboard_error(payload: Vec<String>) -> Self {
        Self {
            success: false,
            return_parameters: Some(payload),
        }
    }

    pub fn first(&self) -> Option<&str> {
        self.return_parameters
            .as_ref()
            .and_then(|p| p.first())
            .map(String::as_str)
    }

    /// Raw error code of a failed DO.
    pub fn error_code(&self) -> Option<u16> {
        if self.success {
            return None;
        }
        self.first().and_then(|c| c.parse().ok())
    }

    /// Typed error code of a failed DO; `None` when absent or unknown.
    pub fn error(&self) -> Option<ErrorCode> {
        self.error_code().and_then(ErrorCode::from_code)
    }

    /// Second payload entry of a failed DO parsed as an integer (remaining amount).
    pub fn error_extra(&self) -> Option<u32> {
        self.return_parameters
            .as_ref()
            .and_then(|p| p.get(1))
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u32)
    }
}

/// Error codes reported by the firmware in `ERROR <cmd> <code> ..` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    IngredientEmpty = 33,
    BalanceCommunication = 34,
    I2c = 35,
    StrawsEmpty = 36,
    GlasRemoved = 37,
    MixingFailed = 38,
    CrusherCoverOpen = 39,
    CrusherTimeout = 40,
    CommandAborted = 41,
    SugarDispenserTimeout = 42,
}

impl ErrorCode {
    pub fn from_code(code: u16) -> Option<Self> {
        use ErrorCode::*;
        Some(match code {
            33 => IngredientEmpty,
            34 => BalanceCommunication,
            35 => I2c,
            36 => StrawsEmpty,
            37 => GlasRemoved,
            38 => MixingFailed,
            39 => CrusherCoverOpen,
            40 => CrusherTimeout,
            41 => CommandAborted,
            42 => SugarDispenserTimeout,
            _ => return None,
        })
    }

    pub const fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BoardType {
    Balance = 1,
    Mixer = 2,
    Straw = 3,
    Crusher = 4,
    Sugar = 5,
}

impl BoardType {
    pub const ALL: [BoardType; 5] = [
        BoardType::Balance,
        BoardType::Mixer,
        BoardType::Straw,
        BoardType::Crusher,
        BoardType::Sugar,
    ];

    /// Decode the `GetConnectedBoards` bitmask; board `b` is bit `b - 1`.
    pub fn decode_mask(mask: u32) -> BTreeSet<BoardType> {
        Self::ALL
            .into_iter()
            .filter(|b| mask & (1 << (*b as u32 - 1)) != 0)
            .collect()
    }
}

/// Firmware version, reported by `GetFirmwareVersion` as `major*10000 + minor*100 + patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl FirmwareVersion {
    pub const IS_IDLE_SUPPORT: FirmwareVersion = FirmwareVersion::new(4, 4, 0);

    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn from_encoded(v: u32) -> Self {
        Self {
            major: (v / 10_000).min(u32::from(u16::MAX)) as u16,
            minor: (v / 100 % 100) as u16,
            patch: (v % 100) as u16,
        }
    }

    /// Parse the raw getter value; anything unparsable is treated as legacy `0.0.0`.
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<u32>()
            .map(Self::from_encoded)
            .unwrap_or_default()
    }

    pub fn supports_is_idle(&self) -> bool {
        *self >= Self::IS_IDLE_SUPPORT
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_mask_low_bits() {
        let boards = BoardType::decode_mask(0b00011);
        assert_eq!(
            boards.into_iter().collect::<Vec<_>>(),
            vec![BoardType::Balance, BoardType::Mixer]
        );
        assert_eq!(BoardType::decode_mask(31).len(), 5);
        assert!(BoardType::decode_mask(0).is_empty());
    }

    #[test]
    fn firmware_version_decoding() {
        let v = FirmwareVersion::parse("40400");
        assert_eq!(v, FirmwareVersion::new(4, 4, 0));
        assert!(v.supports_is_idle());
        assert_eq!(FirmwareVersion::parse("40312").to_string(), "v4.3.12");
        assert!(!FirmwareVersion::parse("40312").supports_is_idle());
        assert_eq!(FirmwareVersion::parse("n/a"), FirmwareVersion::default());
    }

    #[test]
    fn error_payload_accessors() {
        let r = CommandResult::mainboard_error(vec!["33".into(), "10".into()]);
        assert_eq!(r.error(), Some(ErrorCode::IngredientEmpty));
        assert_eq!(r.error_extra(), Some(10));
        let unknown = CommandResult::mainboard_error(vec!["120".into()]);
        assert_eq!(unknown.error_code(), Some(120));
        assert_eq!(unknown.error(), None);
        assert_eq!(CommandResult::value("1".into()).error_code(), None);
    }
}
