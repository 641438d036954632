//! Command client: format a request, then run one exchange

use crate::command::{format_command, CommandRequest};
use crate::error::Result;
use crate::transport::{Response, Transport};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct Client<T: Transport> {
    transport: T,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Format `request` and exchange it with the controller on `port`.
    ///
    /// Formatting errors are returned before the port is touched.
    pub fn execute(&self, port: &str, request: &CommandRequest) -> Result<Response> {
        let line = format_command(request)?;
        log::info!("[{}] -> {}", port, line);

        match self.transport.exchange(port, &line) {
            Ok(response) => {
                log::debug!("[{}] <- {:?}", port, response.as_str());
                Ok(response)
            }
            Err(e) => {
                log::warn!("[{}] exchange failed: {}", port, e);
                Err(e.into())
            }
        }
    }
}

impl<T: Transport + 'static> Client<T> {
    /// Run [`Client::execute`] on the blocking pool.
    ///
    /// Requests are not serialized: two submissions for the same port may
    /// overlap, in which case the operating system usually refuses the
    /// second open and that exchange fails with a transport error.
    pub fn submit(self: &Arc<Self>, port: String, request: CommandRequest) -> JoinHandle<Result<Response>> {
        let client = Arc::clone(self);
        tokio::task::spawn_blocking(move || client.execute(&port, &request))
    }
}
