//! Job sender — the coordinator side of one satellite connection.

use std::io::BufReader;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::SatelliteResult;
use crate::message::{Job, Message, read_optional_frame, write_frame};

/// Sends messages to a satellite, one connection per message.
#[derive(Debug, Clone)]
pub struct JobClient {
    addr: SocketAddr,
    timeout: Option<Duration>,
}

impl JobClient {
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: None,
        }
    }

    /// Limit how long to wait for the response.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Submit a job. `Ok(None)` means the satellite closed the connection
    /// without a result, which is how every failure is reported.
    pub fn submit(&self, job: &Job) -> SatelliteResult<Option<serde_json::Value>> {
        self.send(&Message::job_request(job)?)
    }

    /// Send an arbitrary message and wait for the optional response.
    pub fn send(&self, message: &Message) -> SatelliteResult<Option<serde_json::Value>> {
        let mut stream = TcpStream::connect(self.addr)?;
        stream.set_read_timeout(self.timeout)?;
        debug!(addr = %self.addr, kind = %message.kind, "sending message");
        write_frame(&mut stream, message)?;
        read_optional_frame(&mut BufReader::new(stream))
    }
}
