//! `satellite` — worker node of a distributed job-execution fabric.
//!
//! Accepts job requests over TCP (newline-delimited JSON), resolves the named
//! tool, loading it on demand from a code source if it is not already cached,
//! runs it against the job's parameters, and writes the raw result back.
//!
//! # Architecture
//!
//! ```text
//! TcpListener → thread per connection → process()
//!                                          │ Message{JOB_REQUEST, Job}
//!                                          ↓
//!                                    ToolResolver ──miss──→ ArtifactSource::fetch
//!                                          │                      ↓
//!                                          │               ToolCatalog::instantiate
//!                                          ↓
//!                                    Tool::execute → result frame → close
//! ```
//!
//! The resolver is the only state shared between connections. It loads each
//! identifier at most once, even when many connections ask for it at the
//! same time.

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod resolver;
pub mod server;
pub mod source;
pub mod tools;

pub use error::{ResolveError, SatelliteError, SatelliteResult};
pub use message::{Job, Message, MessageType};
pub use resolver::ToolResolver;
pub use server::Satellite;
