//! Satellite protocol integration tests.
//!
//! Each test binds a satellite on an ephemeral localhost port, serves it on a
//! background thread, and talks to it over real TCP connections.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use serde_json::json;

use satellite::client::JobClient;
use satellite::source::{Artifact, ArtifactSource, DirectorySource, MemorySource, SourceError};
use satellite::tools::{Tool, ToolCatalog};
use satellite::{Job, Message, MessageType, Satellite, ToolResolver};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Counts fetches and stalls each one so concurrent requests overlap.
struct SlowCountingSource {
    inner: MemorySource,
    fetches: Arc<AtomicUsize>,
}

impl ArtifactSource for SlowCountingSource {
    fn fetch(&self, identifier: &str) -> Result<Artifact, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        self.inner.fetch(identifier)
    }
}

struct Crash;

impl Tool for Crash {
    fn name(&self) -> &str {
        "crash"
    }

    fn execute(&self, _parameters: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        panic!("crash tool always panics");
    }
}

fn crash(_config: &serde_json::Value) -> anyhow::Result<Box<dyn Tool>> {
    Ok(Box::new(Crash))
}

fn catalog() -> ToolCatalog {
    let mut catalog = ToolCatalog::with_builtins();
    catalog.register("crash", crash);
    catalog
}

fn memory_source() -> MemorySource {
    MemorySource::new()
        .with("tool.Echo", br#"{"entry":"echo"}"#.to_vec())
        .with("tool.Add", br#"{"entry":"add"}"#.to_vec())
        .with("tool.Fib", br#"{"entry":"fibonacci","config":{"max_n":50}}"#.to_vec())
        .with("tool.Crash", br#"{"entry":"crash"}"#.to_vec())
}

/// Start a satellite on 127.0.0.1:0 and return its address.
fn start(source: impl ArtifactSource + 'static) -> (SocketAddr, Arc<ToolResolver>) {
    let resolver = Arc::new(ToolResolver::new(source, catalog()));
    let satellite = Satellite::bind("127.0.0.1:0", Arc::clone(&resolver)).expect("bind");
    let addr = satellite.local_addr().expect("local addr");
    std::thread::spawn(move || satellite.serve());
    (addr, resolver)
}

fn client(addr: SocketAddr) -> JobClient {
    JobClient::new(addr).with_timeout(TIMEOUT)
}

/// Send raw bytes, half-close, and collect everything the satellite sends back.
fn send_raw(addr: SocketAddr, bytes: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(TIMEOUT)).expect("timeout");
    stream.write_all(bytes).expect("write");
    stream
        .shutdown(std::net::Shutdown::Write)
        .expect("half-close");
    let mut out = Vec::new();
    // A reset after a dropped connection is also "no response".
    let _ = stream.read_to_end(&mut out);
    out
}

#[test]
fn test_add_job_returns_sum() {
    let (addr, _) = start(memory_source());

    let result = client(addr)
        .submit(&Job::new("tool.Add", json!({"a": 2, "b": 3})))
        .expect("submit");

    assert_eq!(result, Some(json!(5)));
}

#[test]
fn test_response_is_raw_value_line() {
    let (addr, _) = start(memory_source());

    let out = send_raw(
        addr,
        br#"{"type":"JOB_REQUEST","content":{"toolName":"tool.Echo","parameters":{"k":[1,2]}}}
"#,
    );

    assert_eq!(out, b"{\"k\":[1,2]}\n");
}

#[test]
fn test_concurrent_first_use_loads_once() {
    const CONNECTIONS: usize = 12;
    let fetches = Arc::new(AtomicUsize::new(0));
    let (addr, resolver) = start(SlowCountingSource {
        inner: memory_source(),
        fetches: Arc::clone(&fetches),
    });
    let barrier = Arc::new(Barrier::new(CONNECTIONS));

    let handles: Vec<_> = (0..CONNECTIONS)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                client(addr)
                    .submit(&Job::new("tool.Echo", json!(i)))
                    .expect("submit")
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().expect("join"), Some(json!(i)));
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    let first = resolver.resolve("tool.Echo").expect("cached");
    let second = resolver.resolve("tool.Echo").expect("cached");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_tool_closes_without_response() {
    let (addr, resolver) = start(memory_source());

    let result = client(addr)
        .submit(&Job::new("tool.Missing", json!(null)))
        .expect("submit");

    assert_eq!(result, None);
    assert!(!resolver.is_cached("tool.Missing"));
}

#[test]
fn test_garbage_input_then_listener_keeps_serving() {
    let (addr, _) = start(memory_source());

    let out = send_raw(addr, b"\xde\xad\xbe\xef{{{ not a message\n");
    assert!(out.is_empty());

    let out = send_raw(addr, b"");
    assert!(out.is_empty());

    let result = client(addr)
        .submit(&Job::new("tool.Add", json!({"a": 40, "b": 2})))
        .expect("submit");
    assert_eq!(result, Some(json!(42)));
}

#[test]
fn test_unknown_message_type_is_dropped() {
    let (addr, resolver) = start(memory_source());

    let message = Message {
        kind: MessageType::Unknown("STATUS_REPORT".to_owned()),
        content: json!({"toolName": "tool.Add", "parameters": {"a": 1, "b": 1}}),
    };
    let result = client(addr).send(&message).expect("send");

    assert_eq!(result, None);
    assert_eq!(resolver.cached_count(), 0);
}

#[test]
fn test_register_satellite_is_not_handled() {
    let (addr, _) = start(memory_source());

    let message = Message {
        kind: MessageType::RegisterSatellite,
        content: json!({"name": "satellite-2", "host": "10.0.0.7", "port": 7002}),
    };

    assert_eq!(client(addr).send(&message).expect("send"), None);
}

#[test]
fn test_panicking_tool_does_not_affect_other_connections() {
    let (addr, _) = start(memory_source());

    let crashed = client(addr)
        .submit(&Job::new("tool.Crash", json!(null)))
        .expect("submit");
    assert_eq!(crashed, None);

    // Same tool again, then unrelated tools: all still served.
    assert_eq!(
        client(addr)
            .submit(&Job::new("tool.Crash", json!(null)))
            .expect("submit"),
        None
    );
    assert_eq!(
        client(addr)
            .submit(&Job::new("tool.Fib", json!(10)))
            .expect("submit"),
        Some(json!(55))
    );
    assert_eq!(
        client(addr)
            .submit(&Job::new("tool.Echo", json!("still alive")))
            .expect("submit"),
        Some(json!("still alive"))
    );
}

#[test]
fn test_tool_error_closes_without_response() {
    let (addr, _) = start(memory_source());

    let result = client(addr)
        .submit(&Job::new("tool.Fib", json!(51)))
        .expect("submit");

    assert_eq!(result, None);
}

#[test]
fn test_directory_source_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("tool.Add.json"), br#"{"entry":"add"}"#).expect("write");
    std::fs::write(dir.path().join("tool.Bad.json"), b"\x00\x01\x02").expect("write");

    let (addr, _) = start(DirectorySource::new(dir.path()));

    assert_eq!(
        client(addr)
            .submit(&Job::new("tool.Add", json!({"a": -3, "b": 10})))
            .expect("submit"),
        Some(json!(7))
    );
    assert_eq!(
        client(addr)
            .submit(&Job::new("tool.Bad", json!(null)))
            .expect("submit"),
        None
    );
    assert_eq!(
        client(addr)
            .submit(&Job::new("../tool.Add", json!({"a": 1, "b": 1})))
            .expect("submit"),
        None
    );
}
