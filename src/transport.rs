//! Request/response exchange over a byte stream
//!
//! One exchange writes a command line terminated by `\r`, then reads a
//! single response line until `\n` or until the timeout elapses.

use crate::command::CommandLine;
use crate::error::TransportError;
use std::fmt;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Raw response line from the controller, whitespace-trimmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response(String);

impl Response {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().trim().to_string())
    }

    /// Decode raw bytes (lossy UTF-8) and trim surrounding whitespace
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(String::from_utf8_lossy(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the controller sent nothing before the timeout
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Performs one exchange with the controller attached to `port`.
///
/// Implementations open the port, exchange, and release it before
/// returning; no connection outlives a call.
pub trait Transport: Send + Sync {
    fn exchange(&self, port: &str, line: &CommandLine) -> Result<Response, TransportError>;
}

/// Transport used when the crate is built without serial support
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTransport;

impl Transport for DisabledTransport {
    fn exchange(&self, _port: &str, _line: &CommandLine) -> Result<Response, TransportError> {
        Err(TransportError::Unsupported)
    }
}

/// Write `line` to an open stream and read back one response line
pub fn exchange_on<S>(stream: &mut S, line: &CommandLine, timeout: Duration) -> io::Result<Response>
where
    S: Read + Write + ?Sized,
{
    let wire = line.to_wire();
    stream.write_all(&wire)?;
    stream.flush()?;
    log::trace!("wrote {} bytes", wire.len());

    read_response(stream, timeout)
}

/// Read until `\n`, end of stream, or `timeout`.
///
/// A timeout is not an error: whatever arrived (possibly nothing) is
/// returned as the response.
pub fn read_response<S>(stream: &mut S, timeout: Duration) -> io::Result<Response>
where
    S: Read + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut buffer = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match stream.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                if byte[0] == b'\n' {
                    break;
                }
                buffer.push(byte[0]);
            }
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }

        if Instant::now() >= deadline {
            log::debug!("response timeout after {} bytes", buffer.len());
            break;
        }
    }

    Ok(Response::from_bytes(&buffer))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::command::format_operation;
    use std::io::Cursor;

    /// In-memory port: reads come from `input`, writes land in `output`
    pub(crate) struct MockStream {
        pub input: Cursor<Vec<u8>>,
        pub output: Vec<u8>,
        pub fail_reads: bool,
    }

    impl MockStream {
        pub fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
                fail_reads: false,
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.fail_reads {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
            }
            match self.input.read(buf)? {
                // An idle serial port times out instead of reporting EOF
                0 => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
                n => Ok(n),
            }
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_exchange_writes_carriage_return() {
        let mut stream = MockStream::new(b"OK\r\n");
        let line = format_operation("relay on", Some(3), None, None).unwrap();

        let response = exchange_on(&mut stream, &line, Duration::from_secs(1)).unwrap();

        assert_eq!(stream.output, b"relay on 3\r");
        assert_eq!(response.as_str(), "OK");
    }

    #[test]
    fn test_response_stops_at_newline() {
        let mut stream = MockStream::new(b"  IOBox v1.2  \nleftover\n");
        let response = read_response(&mut stream, Duration::from_secs(1)).unwrap();
        assert_eq!(response.as_str(), "IOBox v1.2");
    }

    #[test]
    fn test_timeout_without_data_is_empty() {
        let mut stream = MockStream::new(b"");
        let response = read_response(&mut stream, Duration::from_secs(1)).unwrap();
        assert!(response.is_empty());
    }

    #[test]
    fn test_partial_line_on_timeout() {
        let mut stream = MockStream::new(b"0x0F");
        let response = read_response(&mut stream, Duration::from_secs(1)).unwrap();
        assert_eq!(response.as_str(), "0x0F");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut stream = MockStream::new(b"A\xffB\n");
        let response = read_response(&mut stream, Duration::from_secs(1)).unwrap();
        assert_eq!(response.as_str(), "A\u{fffd}B");
    }

    #[test]
    fn test_read_failure_propagates() {
        let mut stream = MockStream::new(b"");
        stream.fail_reads = true;
        let line = format_operation("ver", None, None, None).unwrap();

        let err = exchange_on(&mut stream, &line, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_disabled_transport() {
        let line = format_operation("ver", None, None, None).unwrap();
        let err = DisabledTransport.exchange("/dev/ttyUSB0", &line).unwrap_err();
        assert!(matches!(err, TransportError::Unsupported));
    }
}
