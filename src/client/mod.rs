//! Client module for pingpair: the two probe engines and what they report

pub mod connection;
pub mod constants;
pub mod datagram;
pub mod error;
pub mod http;
pub mod pending;
pub mod progress;
pub mod reporter;
pub mod retry;
pub mod socket;
pub mod statistics;

pub use connection::{ConnectionProbe, SubmitTransport};
pub use constants::*;
pub use datagram::{listen_for_replies, spawn_reply_listener, DatagramProbe, ProbeOutcome};
pub use error::{ClientError, Result};
pub use http::HttpEchoClient;
pub use pending::{InFlight, PendingProbe};
pub use progress::ProgressTracker;
pub use reporter::{Reporter, Transport, TransportReport};
pub use retry::RetryPolicy;
pub use socket::{DatagramSocket, UdpDatagramSocket};
pub use statistics::{LatencySample, LatencyStats};
