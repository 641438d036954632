//! Controller command model
//!
//! This module provides:
//! - The fixed set of controller operations and their parameters
//! - Immutable command requests built from operator input
//! - Formatting of requests into wire command lines

pub mod format;
pub mod operation;
pub mod request;

pub use format::{format_command, format_operation, CommandLine, COMMAND_TERMINATOR};
pub use operation::{Operation, ParameterKind};
pub use request::{CommandRequest, ID_LENGTH};

/// Command reference shown to operators
pub fn reference() -> Vec<(String, &'static str)> {
    Operation::ALL
        .iter()
        .map(|op| (op.usage(), op.description()))
        .collect()
}
