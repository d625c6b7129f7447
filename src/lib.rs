//! pingpair - UDP versus HTTP round-trip latency comparison
//!
//! This library measures round-trip latency between a client and a server over
//! two transports at once: plain UDP datagrams (with retransmission and reply
//! matching by request identifier) and HTTP/1.1 form posts over TCP. Both probe
//! engines run in parallel and report first and maximum latency per transport.

pub mod client;
pub mod clock;
pub mod config;
pub mod harness;
pub mod logging;
pub mod protocol;
pub mod server;
