//! Controller operations
//!
//! The fixed set of command verbs the IOBox firmware understands, with the
//! parameter each one takes.

use crate::error::CommandError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Parameter an operation carries on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// No parameter
    None,
    /// Numeric I/O index (relay, GPIO pin or ADC channel)
    Index,
    /// 8-character identifier, required
    Identifier,
    /// 8-character identifier, sent only when given
    OptionalIdentifier,
    /// Hexadecimal bitmask for the write-all operations
    HexValue,
}

impl ParameterKind {
    /// Placeholder used in the command reference
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            ParameterKind::None => None,
            ParameterKind::Index => Some("{ioNumber}"),
            ParameterKind::Identifier => Some("{idStr}"),
            ParameterKind::OptionalIdentifier => Some("[idStr]"),
            ParameterKind::HexValue => Some("{hexval}"),
        }
    }
}

/// One of the fixed controller operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Version,
    IdGet,
    IdSet,
    RelayOn,
    RelayOff,
    RelayRead,
    RelayReadAll,
    RelayWriteAll,
    GpioSet,
    GpioClear,
    GpioRead,
    GpioReadAll,
    GpioWriteAll,
    AdcRead,
}

impl Operation {
    /// Every operation, in menu order
    pub const ALL: [Operation; 14] = [
        Operation::Version,
        Operation::IdGet,
        Operation::IdSet,
        Operation::RelayOn,
        Operation::RelayOff,
        Operation::RelayRead,
        Operation::RelayReadAll,
        Operation::RelayWriteAll,
        Operation::GpioSet,
        Operation::GpioClear,
        Operation::GpioRead,
        Operation::GpioReadAll,
        Operation::GpioWriteAll,
        Operation::AdcRead,
    ];

    /// Wire spelling of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Version => "ver",
            Operation::IdGet => "id get",
            Operation::IdSet => "id set",
            Operation::RelayOn => "relay on",
            Operation::RelayOff => "relay off",
            Operation::RelayRead => "relay read",
            Operation::RelayReadAll => "relay readall",
            Operation::RelayWriteAll => "relay writeall",
            Operation::GpioSet => "gpio set",
            Operation::GpioClear => "gpio clear",
            Operation::GpioRead => "gpio read",
            Operation::GpioReadAll => "gpio readall",
            Operation::GpioWriteAll => "gpio writeall",
            Operation::AdcRead => "adc read",
        }
    }

    pub fn parameter(&self) -> ParameterKind {
        match self {
            Operation::Version | Operation::RelayReadAll | Operation::GpioReadAll => {
                ParameterKind::None
            }
            Operation::IdGet => ParameterKind::OptionalIdentifier,
            Operation::IdSet => ParameterKind::Identifier,
            Operation::RelayWriteAll | Operation::GpioWriteAll => ParameterKind::HexValue,
            Operation::RelayOn
            | Operation::RelayOff
            | Operation::RelayRead
            | Operation::GpioSet
            | Operation::GpioClear
            | Operation::GpioRead
            | Operation::AdcRead => ParameterKind::Index,
        }
    }

    /// Short description for the command reference
    pub fn description(&self) -> &'static str {
        match self {
            Operation::Version => "Read firmware version",
            Operation::IdGet => "Read device identifier",
            Operation::IdSet => "Write device identifier (exactly 8 characters)",
            Operation::RelayOn => "Energize a relay",
            Operation::RelayOff => "Release a relay",
            Operation::RelayRead => "Read a relay state",
            Operation::RelayReadAll => "Read all relay states as a hex mask",
            Operation::RelayWriteAll => "Write all relay states from a hex mask",
            Operation::GpioSet => "Drive a GPIO pin high",
            Operation::GpioClear => "Drive a GPIO pin low",
            Operation::GpioRead => "Read a GPIO pin",
            Operation::GpioReadAll => "Read all GPIO pins as a hex mask",
            Operation::GpioWriteAll => "Write all GPIO pins from a hex mask",
            Operation::AdcRead => "Read an analog input channel",
        }
    }

    /// Usage line, e.g. `relay on {ioNumber}`
    pub fn usage(&self) -> String {
        match self.parameter().placeholder() {
            Some(p) => format!("{} {}", self.as_str(), p),
            None => self.as_str().to_string(),
        }
    }
}

/// Lookup table from wire spelling to operation
static OPERATIONS: Lazy<HashMap<&'static str, Operation>> = Lazy::new(|| {
    Operation::ALL.iter().map(|op| (op.as_str(), *op)).collect()
});

impl FromStr for Operation {
    type Err = CommandError;

    /// Parses the exact wire spelling. Runs of whitespace between words are
    /// collapsed so `relay  on` still matches.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        OPERATIONS
            .get(normalized.as_str())
            .copied()
            .ok_or_else(|| CommandError::UnsupportedOperation(s.trim().to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_operation() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn test_parse_collapses_whitespace() {
        assert_eq!("  relay   on ".parse::<Operation>().unwrap(), Operation::RelayOn);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "relay toggle".parse::<Operation>().unwrap_err();
        assert_eq!(err, CommandError::UnsupportedOperation("relay toggle".into()));

        // Spelling is case sensitive on the wire
        assert!("VER".parse::<Operation>().is_err());
        assert!("".parse::<Operation>().is_err());
    }

    #[test]
    fn test_read_all_takes_no_parameter() {
        assert_eq!(Operation::RelayReadAll.parameter(), ParameterKind::None);
        assert_eq!(Operation::GpioReadAll.parameter(), ParameterKind::None);
        assert_eq!(Operation::RelayWriteAll.parameter(), ParameterKind::HexValue);
    }

    #[test]
    fn test_usage() {
        assert_eq!(Operation::Version.usage(), "ver");
        assert_eq!(Operation::IdSet.usage(), "id set {idStr}");
        assert_eq!(Operation::AdcRead.usage(), "adc read {ioNumber}");
        assert_eq!(Operation::GpioWriteAll.usage(), "gpio writeall {hexval}");
    }
}
