//! Server module for the pingpair echo servers

pub mod error;
pub mod http;
pub mod monitor;
pub mod udp;

use std::time::Duration;

/// Pause after a failed read or accept before trying again.
pub(crate) const ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub use error::{Result, ServerError};
pub use http::{respond, EchoResponse, HttpEchoServer};
pub use monitor::{ServerMonitor, ServerStats, TransportCounters};
pub use udp::{echo_reply, UdpEchoServer};
