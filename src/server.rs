//! Satellite server — TCP listener and per-connection request handler.
//!
//! One OS thread per accepted connection. Each connection runs:
//!
//! 1. read exactly one [`Message`] frame
//! 2. dispatch on its type (`JOB_REQUEST` only; anything else is logged and dropped)
//! 3. resolve the tool and execute it with the job's parameters
//! 4. write the raw result as one frame and flush
//! 5. close the connection
//!
//! Any failure along the way closes the connection without a response. A
//! failing or panicking tool only affects its own connection.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, warn};

use crate::error::{SatelliteError, SatelliteResult};
use crate::message::{Job, Message, MessageType, read_frame, write_frame};
use crate::resolver::ToolResolver;

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// A bound satellite, ready to accept connections.
#[derive(Debug)]
pub struct Satellite {
    listener: TcpListener,
    resolver: Arc<ToolResolver>,
}

impl Satellite {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`SatelliteError::Bind`] if the address cannot be bound.
    pub fn bind(addr: &str, resolver: Arc<ToolResolver>) -> SatelliteResult<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| SatelliteError::Bind {
            addr: addr.to_owned(),
            source,
        })?;
        Ok(Self { listener, resolver })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SatelliteResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn resolver(&self) -> &Arc<ToolResolver> {
        &self.resolver
    }

    /// Accept connections forever, one handler thread each.
    ///
    /// Concurrency is unbounded: every accepted connection gets a thread.
    pub fn serve(&self) {
        match self.listener.local_addr() {
            Ok(addr) => info!(%addr, "satellite accepting job requests"),
            Err(e) => warn!(error = %e, "satellite accepting job requests (address unknown)"),
        }

        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.spawn_handler(stream, peer),
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }

    fn spawn_handler(&self, stream: TcpStream, peer: SocketAddr) {
        let resolver = Arc::clone(&self.resolver);
        let spawned = std::thread::Builder::new()
            .name("satellite-conn".to_owned())
            .spawn(move || {
                let outcome = handle_connection(stream, &resolver);
                debug!(%peer, ?outcome, "connection finished");
            });
        if let Err(e) = spawned {
            // The stream moved into the failed closure and is dropped, closing it.
            error!(%peer, error = %e, "failed to spawn connection handler");
        }
    }
}

// ---------------------------------------------------------------------------
// Request handler
// ---------------------------------------------------------------------------

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// A result was written and flushed.
    Responded,
    /// The message type is not handled; nothing was sent.
    Ignored(MessageType),
    /// Reading, decoding, resolving, executing, or writing failed; nothing
    /// (or a partial frame) was sent.
    Failed(String),
}

/// Serve one connection and close it.
pub fn handle_connection(stream: TcpStream, resolver: &ToolResolver) -> ConnectionOutcome {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "<unknown>".to_owned(), |addr| addr.to_string());

    let outcome = match stream.try_clone() {
        Ok(read_half) => process(&mut BufReader::new(read_half), &mut &stream, resolver, &peer),
        Err(e) => {
            warn!(peer, error = %e, "failed to set up connection streams");
            ConnectionOutcome::Failed(format!("stream setup failed: {e}"))
        }
    };

    if let Err(e) = stream.shutdown(Shutdown::Both) {
        debug!(peer, error = %e, "shutdown after handling failed");
    }
    outcome
}

/// Run the read → dispatch → execute → respond sequence over any byte stream.
pub fn process(
    reader: &mut impl BufRead,
    writer: &mut impl Write,
    resolver: &ToolResolver,
    peer: &str,
) -> ConnectionOutcome {
    let message: Message = match read_frame(reader) {
        Ok(m) => m,
        Err(e) => {
            warn!(peer, error = %e, "failed to read message");
            return ConnectionOutcome::Failed(format!("read failed: {e}"));
        }
    };

    let job = match message.kind {
        MessageType::JobRequest => match Job::from_content(message.content) {
            Ok(job) => job,
            Err(e) => {
                warn!(peer, error = %e, "invalid job request content");
                return ConnectionOutcome::Failed(format!("invalid job: {e}"));
            }
        },
        other => {
            warn!(peer, kind = %other, "message type not implemented");
            return ConnectionOutcome::Ignored(other);
        }
    };

    debug!(peer, tool = job.tool_name, "executing job");
    let result = match execute_job(resolver, job) {
        Ok(value) => value,
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(peer, error = %reason, "job execution failed");
            return ConnectionOutcome::Failed(reason);
        }
    };

    match write_frame(writer, &result) {
        Ok(()) => ConnectionOutcome::Responded,
        Err(e) => {
            warn!(peer, error = %e, "failed to write result");
            ConnectionOutcome::Failed(format!("write failed: {e}"))
        }
    }
}

/// Resolve the job's tool and run it. Panics inside the tool are reported as
/// errors.
pub fn execute_job(resolver: &ToolResolver, job: Job) -> Result<serde_json::Value> {
    let tool = resolver
        .resolve(&job.tool_name)
        .with_context(|| format!("cannot resolve tool {}", job.tool_name))?;

    let parameters = job.parameters;
    std::panic::catch_unwind(AssertUnwindSafe(|| tool.execute(parameters)))
        .map_err(|payload| {
            anyhow!(
                "tool {} panicked: {}",
                job.tool_name,
                panic_message(&*payload)
            )
        })?
        .with_context(|| format!("tool {} failed", job.tool_name))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
