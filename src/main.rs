//! IOBox command-line client
//!
//! Sends text commands to an IOBox I/O controller over a serial port and
//! prints the controller's response.
//!
//! # Usage
//!
//! ```bash
//! # List available serial ports
//! iobox ports list
//!
//! # Show the command reference
//! iobox ops
//!
//! # Preview the command line without touching the port
//! iobox format relay writeall FF
//!
//! # Send one command
//! iobox exec -p /dev/ttyUSB0 relay on 3
//! iobox exec -p COM3 id set --id IOBOX001
//!
//! # Interactive session
//! iobox shell -p /dev/ttyUSB0
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use iobox::command::{self, format_command, CommandRequest};
use iobox::config::{AppConfig, SerialConfig};
use iobox::ports::{PortEnumerator, PortEvent, PortWatcher};
use iobox::shell::{self, ShellOptions};
use iobox::Client;

#[cfg(feature = "serial")]
use iobox::serial::{PortConfig, SerialTransport, SystemPorts};
#[cfg(not(feature = "serial"))]
use iobox::{ports::NoPorts, transport::DisabledTransport};

/// IOBox serial command client
#[derive(Parser)]
#[command(name = "iobox")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Send relay, GPIO and ADC commands to an IOBox controller over serial")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ./iobox.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Baud rate (overrides config)
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Response timeout in milliseconds (overrides config)
    #[arg(short, long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serial port operations
    #[command(subcommand)]
    Ports(PortCommands),

    /// Show the controller command reference
    Ops,

    /// Print the command line an operation would send, without sending it
    Format(CommandArgs),

    /// Send one command and print the response
    Exec {
        /// Serial port path (default: configured port, then first detected)
        #[arg(short, long)]
        port: Option<String>,

        #[command(flatten)]
        command: CommandArgs,
    },

    /// Interactive session with background port refresh
    Shell {
        /// Serial port path (default: configured port, then first detected)
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
enum PortCommands {
    /// List available serial ports
    List,

    /// Report ports as they are attached and removed (Ctrl+C to stop)
    Watch,
}

#[derive(Args)]
struct CommandArgs {
    /// Operation, optionally followed by its parameter (e.g. relay on 3)
    #[arg(required = true, num_args = 1..)]
    words: Vec<String>,

    /// IO number for relay, gpio and adc operations
    #[arg(long)]
    io: Option<u32>,

    /// 8-character identifier for id set / id get
    #[arg(long)]
    id: Option<String>,

    /// Hex value for relay writeall / gpio writeall
    #[arg(long)]
    hex: Option<String>,
}

impl CommandArgs {
    /// Positional parameter first, then flags fill or override it
    fn request(&self) -> Result<CommandRequest> {
        let mut request = CommandRequest::from_words(&self.words)?;
        if let Some(io) = self.io {
            request.index = Some(io);
        }
        if let Some(ref id) = self.id {
            request.identifier = Some(id.clone());
        }
        if let Some(ref hex) = self.hex {
            request.hex_value = Some(hex.clone());
        }
        Ok(request)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let mut config = AppConfig::resolve(cli.config.as_deref(), &cwd)?;
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.serial.timeout_ms = timeout_ms;
    }
    log::debug!("Effective configuration: {:?}", config);

    match cli.command {
        Commands::Ports(cmd) => handle_ports(cmd, &config),
        Commands::Ops => {
            print_reference();
            Ok(())
        }
        Commands::Format(args) => {
            let line = format_command(&args.request()?)?;
            println!("{}", line);
            Ok(())
        }
        Commands::Exec { port, command } => handle_exec(port, command, &config),
        Commands::Shell { port } => handle_shell(port, &config),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn print_reference() {
    println!("{}", "=".repeat(70));
    println!("{}", "IOBox Command Reference".cyan().bold());
    println!("{}", "=".repeat(70));

    for (usage, description) in command::reference() {
        println!("  {:<26} {}", usage.white().bold(), description);
    }

    println!("\n{}", "=".repeat(70));
    println!(
        "ID strings must be exactly {} characters. Example: {}",
        command::ID_LENGTH,
        "iobox exec -p /dev/ttyUSB0 relay on 3".cyan()
    );
}

fn handle_ports(cmd: PortCommands, config: &AppConfig) -> Result<()> {
    match cmd {
        PortCommands::List => {
            #[cfg(feature = "serial")]
            iobox::serial::port::print_ports()?;

            #[cfg(not(feature = "serial"))]
            bail!("Serial support not enabled. Rebuild with --features serial");
        }

        PortCommands::Watch => {
            let interval = config.ports.refresh_interval();
            println!(
                "{} Watching serial ports every {:?} (Ctrl+C to stop)",
                "[*]".cyan().bold(),
                interval
            );

            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(watch_ports(enumerator(), interval))?;
        }
    }

    Ok(())
}

async fn watch_ports<E: PortEnumerator>(enumerator: E, interval: std::time::Duration) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    let watcher = PortWatcher::new(enumerator, interval).spawn(tx);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(PortEvent::Added(port)) => println!("{} {}", "[+]".green().bold(), port),
                Some(PortEvent::Removed(port)) => println!("{} {}", "[-]".yellow().bold(), port),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watcher.abort();
    Ok(())
}

fn handle_exec(port: Option<String>, args: CommandArgs, config: &AppConfig) -> Result<()> {
    // Formatting errors are reported before any port is opened
    let request = args.request()?;
    let line = format_command(&request)?;

    let port = match resolve_port(port, config)? {
        Some(p) => p,
        None => bail!("No serial port found. Use -p to specify one."),
    };

    println!(
        "{} Sending to {} at {} baud: {}",
        "[TX]".cyan().bold(),
        port,
        config.serial.baud_rate,
        line
    );

    let client = Client::new(transport(&config.serial));
    let response = client.execute(&port, &request)?;

    if response.is_empty() {
        println!("{} {}", "[RX]".green().bold(), "(no response)".yellow());
    } else {
        println!("{} {}", "[RX]".green().bold(), response);
    }

    Ok(())
}

fn handle_shell(port: Option<String>, config: &AppConfig) -> Result<()> {
    let options = ShellOptions {
        port: port.or_else(|| config.serial.port.clone()),
        refresh_interval: config.ports.refresh_interval(),
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let result = runtime.block_on(shell::run(transport(&config.serial), enumerator(), options));

    // Stdin is read on a blocking thread that cannot be interrupted
    runtime.shutdown_background();
    result
}

/// Explicit port, then the configured one, then the first detected
fn resolve_port(explicit: Option<String>, config: &AppConfig) -> Result<Option<String>> {
    if let Some(port) = explicit.or_else(|| config.serial.port.clone()) {
        return Ok(Some(port));
    }

    let ports = enumerator().port_names()?;
    if let Some(first) = ports.first() {
        println!("{} Auto-detected: {}", "[OK]".green().bold(), first.white());
    }
    Ok(ports.into_iter().next())
}

#[cfg(feature = "serial")]
fn transport(settings: &SerialConfig) -> SerialTransport {
    SerialTransport::new(PortConfig::from(settings))
}

#[cfg(not(feature = "serial"))]
fn transport(_settings: &SerialConfig) -> DisabledTransport {
    DisabledTransport
}

#[cfg(feature = "serial")]
fn enumerator() -> SystemPorts {
    SystemPorts
}

#[cfg(not(feature = "serial"))]
fn enumerator() -> NoPorts {
    NoPorts
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use iobox::Operation;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exec_args() {
        let cli = Cli::parse_from(["iobox", "exec", "-p", "COM3", "relay", "writeall", "--hex", "FF"]);
        let Commands::Exec { port, command } = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(port.as_deref(), Some("COM3"));

        let request = command.request().unwrap();
        assert_eq!(request.operation, Operation::RelayWriteAll);
        assert_eq!(format_command(&request).unwrap().as_str(), "relay writeall FF");
    }

    #[test]
    fn test_flags_override_positional() {
        let cli = Cli::parse_from(["iobox", "format", "adc", "read", "1", "--io", "4"]);
        let Commands::Format(args) = cli.command else {
            panic!("expected format");
        };
        assert_eq!(format_command(&args.request().unwrap()).unwrap().as_str(), "adc read 4");
    }

    #[test]
    fn test_unsupported_operation_rejected_before_port() {
        let cli = Cli::parse_from(["iobox", "exec", "-p", "/dev/null", "relay", "toggle"]);
        let Commands::Exec { port, command } = cli.command else {
            panic!("expected exec");
        };
        let err = handle_exec(port, command, &AppConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Unsupported operation"));
    }
}
