//! Command request values

use super::{Operation, ParameterKind};
use crate::error::CommandError;
use std::str::FromStr;

/// Length of a controller identifier
pub const ID_LENGTH: usize = 8;

/// One operation plus whatever parameters the operator supplied.
///
/// Only the parameter relevant to the operation is used when formatting;
/// the others are carried along and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub operation: Operation,
    pub index: Option<u32>,
    pub identifier: Option<String>,
    pub hex_value: Option<String>,
}

impl CommandRequest {
    /// Create a request with no parameters
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            index: None,
            identifier: None,
            hex_value: None,
        }
    }

    /// Set the I/O index
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the identifier string
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Set the hex payload
    pub fn with_hex_value(mut self, hex_value: impl Into<String>) -> Self {
        self.hex_value = Some(hex_value.into());
        self
    }
}

impl From<Operation> for CommandRequest {
    fn from(operation: Operation) -> Self {
        Self::new(operation)
    }
}

impl CommandRequest {
    /// Build a request from command words, e.g. `["relay", "on", "3"]`.
    ///
    /// The longest leading run of words naming an operation is taken as the
    /// operation; at most one word may follow it and is assigned to the
    /// parameter the operation takes. Operations without a parameter ignore
    /// a trailing word.
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Result<Self, CommandError> {
        let words: Vec<&str> = words.iter().map(|w| w.as_ref()).collect();

        let split = (1..=words.len().min(2))
            .rev()
            .find(|&n| words[..n].join(" ").parse::<Operation>().is_ok())
            .ok_or_else(|| CommandError::UnsupportedOperation(words.join(" ")))?;

        let operation: Operation = words[..split].join(" ").parse()?;
        let mut request = Self::new(operation);

        match &words[split..] {
            [] => {}
            [value] => request.set_parameter(value)?,
            extra => {
                return Err(CommandError::invalid(
                    operation.as_str(),
                    format!("unexpected arguments: {}", extra.join(" ")),
                ))
            }
        }

        Ok(request)
    }

    /// Assign a textual parameter to whichever field the operation uses
    pub fn set_parameter(&mut self, value: &str) -> Result<(), CommandError> {
        match self.operation.parameter() {
            ParameterKind::None => {}
            ParameterKind::Index => {
                let index = value.parse::<u32>().map_err(|_| {
                    CommandError::invalid(
                        self.operation.as_str(),
                        format!("'{}' is not a valid IO number", value),
                    )
                })?;
                self.index = Some(index);
            }
            ParameterKind::Identifier | ParameterKind::OptionalIdentifier => {
                self.identifier = Some(value.to_string());
            }
            ParameterKind::HexValue => self.hex_value = Some(value.to_string()),
        }
        Ok(())
    }
}

impl FromStr for CommandRequest {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();
        Self::from_words(&words)
    }
}
