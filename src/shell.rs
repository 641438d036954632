//! Interactive operator shell
//!
//! Keeps the operator's current selection (port, operation, parameters),
//! refreshes the port list in the background and runs each `exec` as its
//! own background exchange so input is never blocked on the serial port.

use crate::client::Client;
use crate::command::{self, CommandRequest, Operation};
use crate::error::CommandError;
use crate::ports::{apply_event, reconcile_selection, PortEnumerator, PortEvent, PortWatcher};
use crate::session::{Dispatcher, StatusEvent};
use crate::transport::Transport;
use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// One line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Empty,
    Help,
    Quit,
    Ports,
    Show,
    Clear,
    Exec,
    SelectPort(String),
    SelectOperation(Operation),
    SetIndex(Option<u32>),
    SetIdentifier(Option<String>),
    SetHex(Option<String>),
    /// A full command typed directly, e.g. `relay on 3`
    Run(CommandRequest),
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let (head, rest) = match words.split_first() {
            Some((head, rest)) => (*head, rest),
            None => return Ok(ShellCommand::Empty),
        };
        let arg = rest.first().copied();

        let cmd = match (head, arg) {
            ("help" | "?", _) => ShellCommand::Help,
            ("quit" | "exit" | "q", _) => ShellCommand::Quit,
            ("ports", _) | ("port", None) => ShellCommand::Ports,
            ("port", Some(name)) => ShellCommand::SelectPort(name.to_string()),
            ("show", _) => ShellCommand::Show,
            ("clear", _) => ShellCommand::Clear,
            ("exec" | "x", _) => ShellCommand::Exec,
            ("op", _) => ShellCommand::SelectOperation(rest.join(" ").parse()?),
            ("io", None) => ShellCommand::SetIndex(None),
            ("io", Some(value)) => {
                let index = value.parse::<u32>().map_err(|_| {
                    CommandError::invalid("io", format!("'{}' is not a valid IO number", value))
                })?;
                ShellCommand::SetIndex(Some(index))
            }
            ("id", Some(value)) if rest.len() == 1 && !matches!(value, "get" | "set") => {
                ShellCommand::SetIdentifier(Some(value.to_string()))
            }
            ("id", None) => ShellCommand::SetIdentifier(None),
            ("hex", value) => ShellCommand::SetHex(value.map(str::to_string)),
            _ => ShellCommand::Run(CommandRequest::from_words(&words)?),
        };

        Ok(cmd)
    }
}

/// What the loop should do after handling a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Print(Vec<String>),
    Execute {
        port: Option<String>,
        request: CommandRequest,
    },
    Quit,
}

/// Operator selection, mirrored from what a form-based UI would hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellState {
    pub port: Option<String>,
    /// Set when the operator named the port; refreshes then leave it alone
    pub pinned: bool,
    pub ports: Vec<String>,
    pub operation: Operation,
    pub index: Option<u32>,
    pub identifier: Option<String>,
    pub hex_value: Option<String>,
}

impl ShellState {
    pub fn new(port: Option<String>) -> Self {
        Self {
            pinned: port.is_some(),
            port,
            ports: Vec::new(),
            operation: Operation::Version,
            index: None,
            identifier: None,
            hex_value: None,
        }
    }

    /// Snapshot the current selection as an immutable request
    pub fn request(&self) -> CommandRequest {
        CommandRequest {
            operation: self.operation,
            index: self.index,
            identifier: self.identifier.clone(),
            hex_value: self.hex_value.clone(),
        }
    }

    /// Update the port list and re-check the selection.
    ///
    /// A pinned port may be missing from the detected list (ptys, ports the
    /// scan cannot see) and is kept until it is reported removed.
    pub fn on_port_event(&mut self, event: &PortEvent) {
        apply_event(&mut self.ports, event);

        if self.pinned {
            match (event, self.port.as_deref()) {
                (PortEvent::Removed(gone), Some(port)) if gone == port => self.pinned = false,
                _ => return,
            }
        }
        self.port = reconcile_selection(self.port.as_deref(), &self.ports);
    }

    pub fn handle(&mut self, cmd: ShellCommand) -> Action {
        match cmd {
            ShellCommand::Empty => Action::None,
            ShellCommand::Help => Action::Print(help_lines()),
            ShellCommand::Quit => Action::Quit,
            ShellCommand::Ports => Action::Print(self.port_lines()),
            ShellCommand::Show => Action::Print(self.selection_lines()),
            ShellCommand::Clear => {
                self.index = None;
                self.identifier = None;
                self.hex_value = None;
                Action::Print(vec!["Parameters cleared".to_string()])
            }
            ShellCommand::Exec => Action::Execute {
                port: self.port.clone(),
                request: self.request(),
            },
            ShellCommand::SelectPort(port) => {
                let note = if self.ports.contains(&port) {
                    String::new()
                } else {
                    " (not in the detected port list)".to_string()
                };
                let line = format!("Port: {}{}", port, note);
                self.port = Some(port);
                self.pinned = true;
                Action::Print(vec![line])
            }
            ShellCommand::SelectOperation(op) => {
                self.operation = op;
                Action::Print(vec![format!("Operation: {}", op.usage())])
            }
            ShellCommand::SetIndex(index) => {
                self.index = index;
                Action::None
            }
            ShellCommand::SetIdentifier(id) => {
                self.identifier = id;
                Action::None
            }
            ShellCommand::SetHex(hex) => {
                self.hex_value = hex;
                Action::None
            }
            ShellCommand::Run(request) => Action::Execute {
                port: self.port.clone(),
                request,
            },
        }
    }

    fn port_lines(&self) -> Vec<String> {
        if self.ports.is_empty() {
            return vec!["No serial ports detected".to_string()];
        }
        self.ports
            .iter()
            .map(|p| {
                let marker = if self.port.as_deref() == Some(p.as_str()) { "*" } else { " " };
                format!("{} {}", marker, p)
            })
            .collect()
    }

    fn selection_lines(&self) -> Vec<String> {
        let or_unset = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        let mut lines = vec![
            format!("Port:       {}", or_unset(self.port.clone())),
            format!("Operation:  {}", self.operation.usage()),
            format!("IO Number:  {}", or_unset(self.index.map(|i| i.to_string()))),
            format!("ID String:  {}", or_unset(self.identifier.clone())),
            format!("Hex Value:  {}", or_unset(self.hex_value.clone())),
        ];
        match command::format_command(&self.request()) {
            Ok(line) => lines.push(format!("Sends:      {}", line)),
            Err(e) => lines.push(format!("Sends:      ({})", e)),
        }
        lines
    }
}

/// Command reference plus shell usage
pub fn help_lines() -> Vec<String> {
    let mut lines = vec!["IOBox Command Reference:".to_string()];
    lines.extend(
        command::reference()
            .into_iter()
            .map(|(usage, description)| format!("  {:<26} {}", usage, description)),
    );
    lines.extend(
        [
            "",
            "Shell:",
            "  <command> [param]          Send a command directly, e.g. relay on 3",
            "  op <operation>             Select the operation for exec",
            "  io <n> | id <text> | hex <value>   Set a parameter (no value clears it)",
            "  exec                       Send the selected operation",
            "  port [name]                Select a port, or list ports",
            "  show | clear               Show or clear the selection",
            "  quit",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    lines
}

pub struct ShellOptions {
    pub port: Option<String>,
    pub refresh_interval: Duration,
}

fn prompt(state: &ShellState) {
    let port = state.port.as_deref().unwrap_or("no port");
    print!("{} ", format!("iobox [{}]>", port).cyan().bold());
    let _ = std::io::stdout().flush();
}

/// Run the shell on stdin until `quit` or end of input
pub async fn run<T, E>(transport: T, enumerator: E, options: ShellOptions) -> Result<()>
where
    T: Transport + 'static,
    E: PortEnumerator,
{
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<StatusEvent>();
    let dispatcher = Dispatcher::new(Client::new(transport), status_tx);

    let (port_tx, mut port_rx) = mpsc::channel::<PortEvent>(32);
    let watcher = PortWatcher::new(enumerator, options.refresh_interval).spawn(port_tx);

    let mut state = ShellState::new(options.port);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", "IOBox shell. Type 'help' for commands.".green().bold());
    prompt(&state);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };

                let action = match ShellCommand::parse(&line) {
                    Ok(cmd) => state.handle(cmd),
                    Err(e) => Action::Print(vec![format!("{} {}", "[ERROR]".red().bold(), e)]),
                };

                match action {
                    Action::None => {}
                    Action::Print(out) => out.iter().for_each(|l| println!("{}", l)),
                    Action::Execute { port, request } => {
                        dispatcher.dispatch(port.as_deref(), request);
                    }
                    Action::Quit => break,
                }
                prompt(&state);
            }
            Some(event) = status_rx.recv() => {
                println!("\n{}", event.render());
                prompt(&state);
            }
            Some(event) = port_rx.recv() => {
                let before = state.port.clone();
                state.on_port_event(&event);
                let tag = match event {
                    PortEvent::Added(_) => "[+]".green(),
                    PortEvent::Removed(_) => "[-]".yellow(),
                };
                println!("\n{} {}", tag, event.port());
                if state.port != before {
                    println!("Port: {}", state.port.as_deref().unwrap_or("-"));
                }
                prompt(&state);
            }
        }
    }

    watcher.abort();
    println!();
    Ok(())
}
