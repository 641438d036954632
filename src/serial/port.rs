//! Serial port configuration, connection and discovery
//!
//! Each exchange opens its own [`SerialConnection`]; dropping the connection
//! closes the port.

use crate::command::CommandLine;
use crate::config::SerialConfig;
use crate::error::TransportError;
use crate::ports::PortEnumerator;
use crate::transport::{exchange_on, Response, Transport};
use anyhow::Result;
use colored::Colorize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io;
use std::time::Duration;

/// Placeholder port path until one is selected
pub const DEFAULT_PORT_PATH: &str = "/dev/ttyUSB0";

/// Configuration for a serial port connection
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, COM3)
    pub port_path: String,
    /// Baud rate (default: 19200)
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Response timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from(DEFAULT_PORT_PATH),
            baud_rate: crate::config::DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
        }
    }
}

impl PortConfig {
    /// Create a new configuration with the controller defaults
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the response timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Same settings on a different port
    pub fn for_port(&self, port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..self.clone()
        }
    }
}

impl From<&SerialConfig> for PortConfig {
    fn from(config: &SerialConfig) -> Self {
        PortConfig::new(config.port.as_deref().unwrap_or(DEFAULT_PORT_PATH))
            .with_baud_rate(config.baud_rate)
            .with_timeout(config.timeout())
    }
}

/// An open serial port
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
}

impl SerialConnection {
    /// Open a serial connection with the given configuration
    pub fn open(config: PortConfig) -> Result<Self, TransportError> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(|e| open_error(&config.port_path, e))?;

        log::debug!("Opened {} at {} baud", config.port_path, config.baud_rate);
        Ok(Self { port, config })
    }

    /// Send one command line and read one response line
    pub fn exchange(&mut self, line: &CommandLine) -> Result<Response, TransportError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| TransportError::Io(e.into()))?;

        let timeout = self.config.timeout;
        Ok(exchange_on(&mut *self.port, line, timeout)?)
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        log::debug!("Closed {}", self.config.port_path);
    }
}

fn open_error(port: &str, err: serialport::Error) -> TransportError {
    match err.kind() {
        serialport::ErrorKind::NoDevice
        | serialport::ErrorKind::Io(io::ErrorKind::NotFound) => {
            TransportError::PortNotFound(port.to_string())
        }
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied(port.to_string())
        }
        _ => TransportError::Open {
            port: port.to_string(),
            reason: err.to_string(),
        },
    }
}

/// [`Transport`] that opens the named port for every exchange
#[derive(Debug, Clone, Default)]
pub struct SerialTransport {
    settings: PortConfig,
}

impl SerialTransport {
    pub fn new(settings: PortConfig) -> Self {
        Self { settings }
    }
}

impl Transport for SerialTransport {
    fn exchange(&self, port: &str, line: &CommandLine) -> Result<Response, TransportError> {
        let mut connection = SerialConnection::open(self.settings.for_port(port))?;
        connection.exchange(line)
    }
}

/// Information about a detected serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub path: String,
    pub port_type: PortType,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    UsbSerial,
    PciSerial,
    Bluetooth,
    Unknown,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::UsbSerial => write!(f, "USB Serial"),
            PortType::PciSerial => write!(f, "PCI Serial"),
            PortType::Bluetooth => write!(f, "Bluetooth"),
            PortType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// List all available serial ports
pub fn list_ports() -> Result<Vec<PortInfo>, TransportError> {
    let ports =
        serialport::available_ports().map_err(|e| TransportError::Enumerate(e.to_string()))?;

    let mut infos: Vec<PortInfo> = ports
        .into_iter()
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    PortType::UsbSerial,
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::PciPort => {
                    (PortType::PciSerial, None, None, None, None, None)
                }
                serialport::SerialPortType::BluetoothPort => {
                    (PortType::Bluetooth, None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    (PortType::Unknown, None, None, None, None, None)
                }
            };

            PortInfo {
                path: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect();

    infos.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(infos)
}

/// Enumerates ports through the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn port_names(&self) -> Result<Vec<String>, TransportError> {
        Ok(list_ports()?.into_iter().map(|p| p.path).collect())
    }
}

/// Print formatted list of available serial ports
pub fn print_ports() -> Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("\n{}", "Troubleshooting tips:".cyan().bold());
        println!("  1. Connect the IOBox USB cable");
        println!("  2. Check if the device is recognized: ls -la /dev/ttyUSB* /dev/ttyACM*");
        println!("  3. Add your user to the 'dialout' group: sudo usermod -aG dialout $USER");
        return Ok(());
    }

    println!("{}", "Available Serial Ports:".green().bold());
    println!("{}", "=".repeat(60));

    for port in ports {
        println!("\n{}: {}", "Port".cyan(), port.path.white().bold());
        println!("  Type: {}", port.port_type);

        if let Some(ref mfg) = port.manufacturer {
            println!("  Manufacturer: {}", mfg);
        }
        if let Some(ref prod) = port.product {
            println!("  Product: {}", prod);
        }
        if let Some(ref sn) = port.serial_number {
            println!("  Serial: {}", sn);
        }
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            println!("  VID:PID: {:04x}:{:04x}", vid, pid);
        }
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "{}",
        "Use: iobox exec -p <PORT> <operation> to send a command".yellow()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::format_operation;

    #[test]
    fn test_default_config() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
    }

    #[test]
    fn test_config_from_file_settings() {
        let settings = SerialConfig {
            port: Some("COM4".into()),
            baud_rate: 9600,
            timeout_ms: 250,
        };
        let config = PortConfig::from(&settings);

        assert_eq!(config.port_path, "COM4");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.for_port("/dev/ttyACM0").port_path, "/dev/ttyACM0");
    }

    #[test]
    fn test_open_errors_are_typed() {
        let denied = serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "Permission denied",
        );
        assert!(matches!(
            open_error("/dev/ttyS0", denied),
            TransportError::PermissionDenied(p) if p == "/dev/ttyS0"
        ));

        let missing = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(matches!(open_error("COM9", missing), TransportError::PortNotFound(_)));

        let other = serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad baud");
        match open_error("COM1", other) {
            TransportError::Open { port, reason } => {
                assert_eq!(port, "COM1");
                assert!(reason.contains("bad baud"));
            }
            e => panic!("unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_missing_port_is_transport_error() {
        let transport = SerialTransport::default();
        let line = format_operation("ver", None, None, None).unwrap();

        let err = transport
            .exchange("/dev/iobox-does-not-exist", &line)
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::PortNotFound(_) | TransportError::Open { .. }
        ));

        // The transport holds no connection state between exchanges
        assert!(transport.exchange("/dev/iobox-does-not-exist", &line).is_err());
    }
}
