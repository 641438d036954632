//! IOBox serial command client
//!
//! Formats text commands for IOBox relay/GPIO/ADC controllers and exchanges
//! them over a serial link, one request and one response line per exchange.
//!
//! # Modules
//!
//! - [`command`]: operations, requests and command line formatting
//! - [`transport`]: the write-then-read-one-line exchange
//! - [`serial`]: the `serialport` backend (requires the `serial` feature)
//! - [`ports`]: port list refresh
//! - [`client`] / [`session`]: background execution with a status log
//! - [`shell`]: the interactive operator front-end
//!
//! ```
//! use iobox::command::{format_command, CommandRequest, Operation};
//!
//! let line = format_command(&CommandRequest::new(Operation::RelayOn).with_index(3)).unwrap();
//! assert_eq!(line.as_str(), "relay on 3");
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod ports;
#[cfg(feature = "serial")]
pub mod serial;
pub mod session;
pub mod shell;
pub mod transport;

pub use client::Client;
pub use command::{format_command, format_operation, CommandLine, CommandRequest, Operation};
pub use error::{CommandError, Error, Result, TransportError};
pub use transport::{Response, Transport};
