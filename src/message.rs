//! Wire model — message envelope, job payload, and newline-delimited framing.
//!
//! Every connection carries exactly one inbound [`Message`] and at most one
//! outbound result value. Each value is one line of JSON:
//!
//! ```text
//! → {"type":"JOB_REQUEST","content":{"toolName":"add","parameters":{"a":2,"b":3}}}
//! ← 5
//! ```

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::{SatelliteError, SatelliteResult};

/// Maximum size of a single frame (10 MiB).
pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Discriminant of a [`Message`].
///
/// Unrecognized type strings are preserved in [`MessageType::Unknown`] so the
/// handler can log them without ever touching the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    JobRequest,
    RegisterSatellite,
    Unknown(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::JobRequest => "JOB_REQUEST",
            Self::RegisterSatellite => "REGISTER_SATELLITE",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "JOB_REQUEST" => Self::JobRequest,
            "REGISTER_SATELLITE" => Self::RegisterSatellite,
            _ => Self::Unknown(value),
        }
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Unknown(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope exchanged on a connection. The shape of `content` is determined
/// by `kind` and is left undecoded until the kind is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl Message {
    /// Wrap a job in a `JOB_REQUEST` envelope.
    pub fn job_request(job: &Job) -> SatelliteResult<Self> {
        Ok(Self {
            kind: MessageType::JobRequest,
            content: serde_json::to_value(job)?,
        })
    }
}

/// A request to run one tool with one parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Identifier the resolver maps to a tool.
    pub tool_name: String,
    /// Opaque value handed to the tool.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl Job {
    pub fn new(tool_name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
        }
    }

    /// Decode the content of a `JOB_REQUEST` message.
    pub fn from_content(content: serde_json::Value) -> SatelliteResult<Self> {
        Ok(serde_json::from_value(content)?)
    }
}

/// Read one JSON frame and decode it as `T`.
///
/// EOF before any byte, oversized lines, non-UTF-8 data, and invalid JSON
/// are all reported as errors.
pub fn read_frame<T>(reader: &mut impl BufRead) -> SatelliteResult<T>
where
    T: serde::de::DeserializeOwned,
{
    read_optional_frame(reader)?.ok_or_else(|| {
        SatelliteError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "stream closed before a frame was received",
        ))
    })
}

/// Like [`read_frame`], but a stream that closes without sending anything
/// yields `None`.
pub fn read_optional_frame<T>(reader: &mut impl BufRead) -> SatelliteResult<Option<T>>
where
    T: serde::de::DeserializeOwned,
{
    let mut line = Vec::new();
    let bytes_read = read_line_limited(reader, &mut line, MAX_FRAME_BYTES)?;
    if bytes_read == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(line.trim_ascii())?))
}

/// Write `value` as a single JSON line and flush.
pub fn write_frame(out: &mut impl Write, value: &impl Serialize) -> SatelliteResult<()> {
    let json = serde_json::to_string(value)?;
    out.write_all(json.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Read a line from `reader` into `buf`, stopping at newline or `max_bytes`.
///
/// Returns the number of bytes read (0 = EOF).
fn read_line_limited(
    reader: &mut impl BufRead,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> SatelliteResult<usize> {
    let mut total = 0usize;
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(total);
        }
        let (consumed, found_newline) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        if total + consumed > max_bytes {
            // The connection is dropped after one frame, so the rest is not drained.
            return Err(SatelliteError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame exceeds maximum size ({max_bytes} bytes)"),
            )));
        }
        buf.extend_from_slice(&available[..consumed]);
        total += consumed;
        reader.consume(consumed);
        if found_newline {
            return Ok(total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_request_wire_shape() {
        let job = Job::new("add", json!({"a": 2, "b": 3}));
        let msg = Message::job_request(&job).expect("envelope");
        let wire = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(
            wire,
            json!({
                "type": "JOB_REQUEST",
                "content": {"toolName": "add", "parameters": {"a": 2, "b": 3}}
            })
        );
    }

    #[test]
    fn test_unknown_type_keeps_name() {
        let msg: Message = serde_json::from_value(json!({"type": "SHUTDOWN", "content": [1, 2, 3]}))
            .expect("parse");
        assert_eq!(msg.kind, MessageType::Unknown("SHUTDOWN".to_owned()));
        assert_eq!(msg.kind.to_string(), "SHUTDOWN");
    }

    #[test]
    fn test_register_satellite_type() {
        let msg: Message =
            serde_json::from_str(r#"{"type":"REGISTER_SATELLITE"}"#).expect("parse");
        assert_eq!(msg.kind, MessageType::RegisterSatellite);
        assert!(msg.content.is_null());
    }

    #[test]
    fn test_job_parameters_default_to_null() {
        let job = Job::from_content(json!({"toolName": "echo"})).expect("job");
        assert_eq!(job.tool_name, "echo");
        assert!(job.parameters.is_null());
    }

    #[test]
    fn test_job_missing_tool_name_rejected() {
        assert!(Job::from_content(json!({"parameters": 1})).is_err());
    }

    #[test]
    fn test_read_frame_eof() {
        let mut input: &[u8] = b"";
        let result: SatelliteResult<Message> = read_frame(&mut input);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_optional_frame_eof_is_none() {
        let mut input: &[u8] = b"";
        let value: Option<serde_json::Value> = read_optional_frame(&mut input).expect("eof");
        assert!(value.is_none());
    }

    #[test]
    fn test_read_frame_without_trailing_newline() {
        let mut input: &[u8] = br#"{"type":"JOB_REQUEST","content":{"toolName":"echo"}}"#;
        let msg: Message = read_frame(&mut input).expect("frame");
        assert_eq!(msg.kind, MessageType::JobRequest);
    }

    #[test]
    fn test_read_frame_garbage() {
        let mut input: &[u8] = b"\x00\xff\xfe not json\n";
        let result: SatelliteResult<Message> = read_frame(&mut input);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_line_limited_rejects_oversized() {
        let data = vec![b'x'; 64];
        let mut reader = std::io::BufReader::with_capacity(16, data.as_slice());
        let mut buf = Vec::new();
        assert!(read_line_limited(&mut reader, &mut buf, 32).is_err());
    }

    #[test]
    fn test_write_frame_appends_newline() {
        let mut out = Vec::new();
        write_frame(&mut out, &json!(5)).expect("write");
        assert_eq!(out, b"5\n");
    }
}
