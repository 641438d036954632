//! Serial port backend
//!
//! This module provides:
//! - Opening a port with the controller's fixed line settings
//! - The per-exchange [`SerialTransport`]
//! - Listing available serial ports

pub mod port;

pub use port::{list_ports, PortConfig, PortInfo, SerialConnection, SerialTransport, SystemPorts};
