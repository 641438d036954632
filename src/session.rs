//! Operator status log and background dispatch
//!
//! Every execute request logs `Executing operation: ...` right away and
//! reports the outcome once its background exchange finishes.

use crate::client::Client;
use crate::command::{CommandRequest, Operation};
use crate::transport::{Response, Transport};
use chrono::{DateTime, Local};
use colored::Colorize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusKind {
    Executing(Operation),
    Response(Response),
    Failed { label: String, message: String },
}

/// One line of the status log
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub time: DateTime<Local>,
    pub kind: StatusKind,
}

impl StatusEvent {
    pub fn new(kind: StatusKind) -> Self {
        Self {
            time: Local::now(),
            kind,
        }
    }

    pub fn failed(label: &str, message: impl Into<String>) -> Self {
        Self::new(StatusKind::Failed {
            label: label.to_string(),
            message: message.into(),
        })
    }

    /// Colored line with timestamp, for terminals
    pub fn render(&self) -> String {
        let stamp = self.time.format("%H:%M:%S%.3f").to_string();
        let text = match &self.kind {
            StatusKind::Executing(_) => self.to_string().cyan().to_string(),
            StatusKind::Response(_) => self.to_string().green().to_string(),
            StatusKind::Failed { .. } => self.to_string().red().to_string(),
        };
        format!("{} {}", stamp.dimmed(), text)
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StatusKind::Executing(op) => write!(f, "Executing operation: {}", op),
            StatusKind::Response(r) => write!(f, "Response: {}", r),
            StatusKind::Failed { label, message } => write!(f, "{}: {}", label, message),
        }
    }
}

/// Starts exchanges in the background and reports to a status channel
pub struct Dispatcher<T: Transport + 'static> {
    client: Arc<Client<T>>,
    status: mpsc::UnboundedSender<StatusEvent>,
}

impl<T: Transport + 'static> Dispatcher<T> {
    pub fn new(client: Client<T>, status: mpsc::UnboundedSender<StatusEvent>) -> Self {
        Self {
            client: Arc::new(client),
            status,
        }
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    /// Start one exchange.
    ///
    /// Returns the reporting task, or `None` when no port is selected.
    pub fn dispatch(&self, port: Option<&str>, request: CommandRequest) -> Option<JoinHandle<()>> {
        self.emit(StatusEvent::new(StatusKind::Executing(request.operation)));

        let port = match port {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => {
                self.emit(StatusEvent::failed("Serial port error", "no serial port selected"));
                return None;
            }
        };

        let task = self.client.submit(port, request);
        let status = self.status.clone();

        Some(tokio::spawn(async move {
            let event = match task.await {
                Ok(Ok(response)) => StatusEvent::new(StatusKind::Response(response)),
                Ok(Err(e)) => StatusEvent::failed(e.label(), e.to_string()),
                Err(e) => StatusEvent::failed("Error", format!("exchange task failed: {}", e)),
            };
            let _ = status.send(event);
        }))
    }

    fn emit(&self, event: StatusEvent) {
        // The receiver only goes away during shutdown
        let _ = self.status.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::RecordingTransport;

    #[test]
    fn test_status_lines() {
        let event = StatusEvent::new(StatusKind::Executing(Operation::RelayOn));
        assert_eq!(event.to_string(), "Executing operation: relay on");

        let event = StatusEvent::new(StatusKind::Response(Response::new("OK")));
        assert_eq!(event.to_string(), "Response: OK");

        let event = StatusEvent::failed("Serial port error", "Port not found: COM9");
        assert_eq!(event.to_string(), "Serial port error: Port not found: COM9");
        assert!(event.render().contains("Port not found: COM9"));
    }

    #[tokio::test]
    async fn test_dispatch_reports_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Client::new(RecordingTransport::replying("1")), tx);

        let handle = dispatcher
            .dispatch(Some("COM2"), CommandRequest::new(Operation::RelayRead).with_index(2))
            .unwrap();
        handle.await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap().kind,
            StatusKind::Executing(Operation::RelayRead)
        );
        assert_eq!(
            rx.recv().await.unwrap().kind,
            StatusKind::Response(Response::new("1"))
        );
    }

    #[tokio::test]
    async fn test_dispatch_reports_errors() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Client::new(RecordingTransport::default()), tx);

        dispatcher
            .dispatch(Some("COM9"), CommandRequest::new(Operation::Version))
            .unwrap()
            .await
            .unwrap();
        dispatcher
            .dispatch(Some("COM9"), CommandRequest::new(Operation::AdcRead))
            .unwrap()
            .await
            .unwrap();

        let lines: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.to_string())
            .collect();
        assert_eq!(
            lines,
            vec![
                "Executing operation: ver",
                "Serial port error: Port not found: COM9",
                "Executing operation: adc read",
                "Error: Invalid parameter for 'adc read': IO number is required",
            ]
        );
        // Only the well-formed request reached the port
        assert_eq!(dispatcher.client().transport().sent().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_without_port() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Client::new(RecordingTransport::replying("OK")), tx);

        assert!(dispatcher.dispatch(None, CommandRequest::new(Operation::Version)).is_none());
        assert!(dispatcher.dispatch(Some(""), CommandRequest::new(Operation::Version)).is_none());

        rx.recv().await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.to_string(), "Serial port error: no serial port selected");
        assert!(dispatcher.client().transport().sent().is_empty());
    }
}
