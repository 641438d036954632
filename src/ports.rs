//! Serial port list refresh
//!
//! Polls a [`PortEnumerator`] at a fixed interval and reports ports that
//! appeared or disappeared since the previous poll.

use crate::error::TransportError;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Source of currently attached serial port names
pub trait PortEnumerator: Send + Sync + 'static {
    fn port_names(&self) -> Result<Vec<String>, TransportError>;
}

/// Enumerator that never finds a port
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPorts;

impl PortEnumerator for NoPorts {
    fn port_names(&self) -> Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }
}

/// Change in the set of attached ports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    Added(String),
    Removed(String),
}

impl PortEvent {
    pub fn port(&self) -> &str {
        match self {
            PortEvent::Added(p) | PortEvent::Removed(p) => p,
        }
    }
}

/// Events turning `previous` into `current`, removals first
pub fn diff_ports(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> Vec<PortEvent> {
    let removed = previous
        .difference(current)
        .map(|p| PortEvent::Removed(p.clone()));
    let added = current
        .difference(previous)
        .map(|p| PortEvent::Added(p.clone()));
    removed.chain(added).collect()
}

/// Apply an event to a sorted port list
pub fn apply_event(ports: &mut Vec<String>, event: &PortEvent) {
    match event {
        PortEvent::Added(p) => {
            if let Err(pos) = ports.binary_search(p) {
                ports.insert(pos, p.clone());
            }
        }
        PortEvent::Removed(p) => ports.retain(|existing| existing != p),
    }
}

/// Selection after a refresh: keep the current port while it is attached,
/// otherwise fall back to the first available one.
pub fn reconcile_selection(current: Option<&str>, ports: &[String]) -> Option<String> {
    match current {
        Some(selected) if ports.iter().any(|p| p == selected) => Some(selected.to_string()),
        _ => ports.first().cloned(),
    }
}

/// Periodic port list poller
pub struct PortWatcher<E: PortEnumerator> {
    enumerator: E,
    interval: Duration,
    known: BTreeSet<String>,
}

impl<E: PortEnumerator> PortWatcher<E> {
    pub fn new(enumerator: E, interval: Duration) -> Self {
        Self {
            enumerator,
            interval,
            known: BTreeSet::new(),
        }
    }

    /// Ports seen by the last successful poll
    pub fn known(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    /// Enumerate once and return what changed.
    ///
    /// The first poll reports every attached port as added. A failed
    /// enumeration leaves the known set untouched.
    pub fn poll(&mut self) -> Result<Vec<PortEvent>, TransportError> {
        let current: BTreeSet<String> = self.enumerator.port_names()?.into_iter().collect();
        let events = diff_ports(&self.known, &current);
        self.known = current;
        Ok(events)
    }

    /// Poll forever on a background task, sending events to `tx`.
    ///
    /// The task ends when the receiving side is dropped.
    pub fn spawn(mut self, tx: mpsc::Sender<PortEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let events = match self.poll() {
                    Ok(events) => events,
                    Err(e) => {
                        log::warn!("Port refresh failed: {}", e);
                        continue;
                    }
                };

                for event in events {
                    log::debug!("Port event: {:?}", event);
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }

                if tx.is_closed() {
                    return;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns scripted snapshots, repeating the last one
    struct Scripted(Mutex<VecDeque<Result<Vec<String>, TransportError>>>);

    impl Scripted {
        fn new(snapshots: Vec<Result<Vec<&str>, TransportError>>) -> Self {
            Self(Mutex::new(
                snapshots
                    .into_iter()
                    .map(|s| s.map(|v| v.into_iter().map(String::from).collect()))
                    .collect(),
            ))
        }
    }

    impl PortEnumerator for Scripted {
        fn port_names(&self) -> Result<Vec<String>, TransportError> {
            let mut queue = self.0.lock().unwrap();
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                match queue.front() {
                    Some(Ok(ports)) => Ok(ports.clone()),
                    _ => Ok(Vec::new()),
                }
            }
        }
    }

    fn names(ports: &[&str]) -> Vec<String> {
        ports.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_reconcile_keeps_selection() {
        let ports = names(&["/dev/ttyUSB0", "/dev/ttyUSB1"]);
        assert_eq!(
            reconcile_selection(Some("/dev/ttyUSB1"), &ports).as_deref(),
            Some("/dev/ttyUSB1")
        );
    }

    #[test]
    fn test_reconcile_falls_back_to_first() {
        let ports = names(&["/dev/ttyACM0", "/dev/ttyUSB0"]);
        assert_eq!(
            reconcile_selection(Some("/dev/ttyUSB7"), &ports).as_deref(),
            Some("/dev/ttyACM0")
        );
        assert_eq!(reconcile_selection(None, &ports).as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(reconcile_selection(Some("/dev/ttyUSB0"), &[]), None);
    }

    #[test]
    fn test_apply_event_keeps_order() {
        let mut ports = names(&["COM1", "COM3"]);
        apply_event(&mut ports, &PortEvent::Added("COM2".into()));
        apply_event(&mut ports, &PortEvent::Added("COM2".into()));
        assert_eq!(ports, names(&["COM1", "COM2", "COM3"]));

        apply_event(&mut ports, &PortEvent::Removed("COM1".into()));
        assert_eq!(ports, names(&["COM2", "COM3"]));
    }

    #[test]
    fn test_poll_reports_changes() {
        let mut watcher = PortWatcher::new(
            Scripted::new(vec![
                Ok(vec!["/dev/ttyUSB0"]),
                Err(TransportError::Enumerate("busy".into())),
                Ok(vec!["/dev/ttyUSB1", "/dev/ttyUSB0"]),
                Ok(vec!["/dev/ttyUSB1"]),
            ]),
            Duration::from_millis(10),
        );

        assert_eq!(watcher.poll().unwrap(), vec![PortEvent::Added("/dev/ttyUSB0".into())]);
        assert!(watcher.poll().is_err());
        assert_eq!(watcher.known().collect::<Vec<_>>(), vec!["/dev/ttyUSB0"]);
        assert_eq!(watcher.poll().unwrap(), vec![PortEvent::Added("/dev/ttyUSB1".into())]);
        assert_eq!(watcher.poll().unwrap(), vec![PortEvent::Removed("/dev/ttyUSB0".into())]);
        assert!(watcher.poll().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_watcher_streams_events() {
        let watcher = PortWatcher::new(
            Scripted::new(vec![Ok(vec!["COM3"]), Ok(vec!["COM3", "COM4"]), Ok(vec!["COM4"])]),
            Duration::from_millis(5),
        );
        let (tx, mut rx) = mpsc::channel(8);
        let handle = watcher.spawn(tx);

        let mut received = Vec::new();
        while received.len() < 3 {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("watcher stalled")
                .expect("watcher stopped");
            received.push(event);
        }

        assert_eq!(
            received,
            vec![
                PortEvent::Added("COM3".into()),
                PortEvent::Added("COM4".into()),
                PortEvent::Removed("COM3".into()),
            ]
        );

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("watcher did not stop")
            .unwrap();
    }
}
