//! Command line formatting
//!
//! Maps a [`CommandRequest`] to the exact text the controller expects.
//! Formatting is pure: it never opens a port.

use super::{CommandRequest, Operation, ParameterKind, ID_LENGTH};
use crate::error::CommandError;
use std::fmt;

/// Line terminator the controller expects after every command
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Formatted command text, without terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine(String);

impl CommandLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes written to the port: the command text followed by `\r`
    pub fn to_wire(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() + 1);
        bytes.extend_from_slice(self.0.as_bytes());
        bytes.push(COMMAND_TERMINATOR);
        bytes
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommandLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Format a request into its command line
pub fn format_command(request: &CommandRequest) -> Result<CommandLine, CommandError> {
    let op = request.operation;

    let line = match op.parameter() {
        ParameterKind::None => op.as_str().to_string(),
        ParameterKind::Index => {
            let index = request
                .index
                .ok_or_else(|| CommandError::invalid(op.as_str(), "IO number is required"))?;
            format!("{} {}", op, index)
        }
        ParameterKind::Identifier => {
            let id = request
                .identifier
                .as_deref()
                .ok_or_else(|| CommandError::invalid(op.as_str(), "identifier is required"))?;
            format!("{} {}", op, validate_identifier(op, id)?)
        }
        ParameterKind::OptionalIdentifier => match request.identifier.as_deref() {
            Some(id) => format!("{} {}", op, validate_identifier(op, id)?),
            None => op.as_str().to_string(),
        },
        ParameterKind::HexValue => {
            let hex = request
                .hex_value
                .as_deref()
                .ok_or_else(|| CommandError::invalid(op.as_str(), "hex value is required"))?;
            format!("{} {}", op, validate_hex(op, hex)?)
        }
    };

    Ok(CommandLine(line))
}

/// Parse an operation name and format it with the given parameters.
///
/// Fails with [`CommandError::UnsupportedOperation`] before looking at any
/// parameter when the name is not a known operation.
pub fn format_operation(
    operation: &str,
    index: Option<u32>,
    identifier: Option<&str>,
    hex_value: Option<&str>,
) -> Result<CommandLine, CommandError> {
    let op: Operation = operation.parse()?;
    let request = CommandRequest {
        operation: op,
        index,
        identifier: identifier.map(str::to_string),
        hex_value: hex_value.map(str::to_string),
    };
    format_command(&request)
}

fn validate_identifier(op: Operation, id: &str) -> Result<&str, CommandError> {
    let len = id.chars().count();
    if len != ID_LENGTH {
        return Err(CommandError::invalid(
            op.as_str(),
            format!("identifier must be exactly {} characters, got {}", ID_LENGTH, len),
        ));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CommandError::invalid(
            op.as_str(),
            "identifier must not contain whitespace or control characters",
        ));
    }
    Ok(id)
}

fn validate_hex(op: Operation, hex: &str) -> Result<&str, CommandError> {
    let hex = hex.trim();
    if hex.is_empty() {
        return Err(CommandError::invalid(op.as_str(), "hex value is required"));
    }
    if hex.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CommandError::invalid(
            op.as_str(),
            format!("'{}' must be a single value", hex.escape_debug()),
        ));
    }
    Ok(hex)
}
