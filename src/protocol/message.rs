use crate::protocol::error::{ProtocolError, Result};
use std::fmt;
use tracing::debug;

/// Largest datagram either side will send or read.
pub const MAX_DATAGRAM_SIZE: usize = 65536;

/// Text carried by every probe, sized like a typical message sent from a phone.
pub const PROBE_TEXT: &str = "Test payload that carries a fair amount of text, but not too much, \
because the messages people actually send from a phone are usually not that long. Still, a chat \
message often holds a couple of full sentences, a question or two and maybe a short link, so the \
payload is sized like one of those.";

/// Filler returned by the fetch endpoint after the echoed token.
pub const FILLER_TEXT: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do \
eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud \
exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat. Duis aute irure dolor in \
reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur. Excepteur sint \
occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit anim id est laborum.";

/// Correlation key of a datagram probe.
///
/// Minted from the send timestamp, so the identifier doubles as the anchor
/// for total lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client to server datagram: `"<requestID> <text>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub id: RequestId,
    pub text: String,
}

impl ProbeRequest {
    pub fn new(id: RequestId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let buf = format!("{} {}", self.id, self.text).into_bytes();
        if buf.len() > MAX_DATAGRAM_SIZE {
            return Err(ProtocolError::TooLarge {
                size: buf.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }
        Ok(buf)
    }

    /// Strict decode: the identifier must be a valid integer. The text may be empty.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let frame = String::from_utf8_lossy(bytes);
        let mut parts = frame.splitn(2, ' ');
        let id_field = parts.next().unwrap_or_default();
        let id = id_field
            .parse::<i64>()
            .map_err(|_| ProtocolError::InvalidInteger {
                field: "request id",
                value: id_field.to_string(),
            })?;
        Ok(Self {
            id: RequestId(id),
            text: parts.next().unwrap_or_default().to_string(),
        })
    }
}

/// Identifier field of a request datagram, or zero when it does not parse.
///
/// The echo server answers every datagram, malformed or not.
pub fn request_id_lossy(bytes: &[u8]) -> RequestId {
    ProbeRequest::decode(bytes)
        .map(|request| request.id)
        .unwrap_or(RequestId(0))
}

/// Server to client datagram: `"<serverTimestamp> <echoedRequestID>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    pub server_ts: i64,
    pub request_id: RequestId,
}

impl EchoReply {
    pub fn new(server_ts: i64, request_id: RequestId) -> Self {
        Self {
            server_ts,
            request_id,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        format!("{} {}", self.server_ts, self.request_id).into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let frame = String::from_utf8_lossy(bytes);
        let parts: Vec<&str> = frame.trim_end().split(' ').collect();
        if parts.len() != 2 {
            debug!(actual = parts.len(), "Invalid reply field count");
            return Err(ProtocolError::FieldCount {
                expected: 2,
                actual: parts.len(),
            });
        }

        let server_ts = parse_field(parts[0], "server timestamp")?;
        let request_id = parse_field(parts[1], "request id")?;

        Ok(Self {
            server_ts,
            request_id: RequestId(request_id),
        })
    }
}

fn parse_field(value: &str, field: &'static str) -> Result<i64> {
    value.parse().map_err(|_| ProtocolError::InvalidInteger {
        field,
        value: value.to_string(),
    })
}
