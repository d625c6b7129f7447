//! Command-line configuration shared by both run modes.

use crate::client::constants::{DEFAULT_REPLY_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use crate::client::RetryPolicy;
use clap::Parser;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Parser, Debug, Clone)]
#[command(name = "pingpair")]
#[command(about = "Compare UDP and HTTP round-trip latency between a client and a server")]
pub struct Config {
    /// Run the UDP and HTTP echo servers
    #[arg(long, conflicts_with = "client")]
    pub server: bool,

    /// Run both probe engines against a server
    #[arg(long)]
    pub client: bool,

    /// Hostname of the server (HTTP)
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// IP of the server (UDP)
    #[arg(long, default_value = "127.0.0.1")]
    pub ip: String,

    /// Address the servers bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Server HTTP port
    #[arg(long, default_value_t = 17468)]
    pub port: u16,

    /// Server UDP port
    #[arg(long, default_value_t = 17468)]
    pub udp_port: u16,

    /// How many probes to send over each transport
    #[arg(long, default_value_t = 100)]
    pub num: usize,

    /// UDP wait before retransmitting, in milliseconds
    #[arg(long, default_value_t = DEFAULT_REPLY_TIMEOUT.as_millis() as u64)]
    pub reply_timeout_ms: u64,

    /// HTTP per-request timeout, in milliseconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    pub request_timeout_ms: u64,

    /// Give up on a probe after this many attempts (default: retry forever)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Server status line update interval in milliseconds
    #[arg(long, default_value_t = 100)]
    pub update_interval: u64,

    /// Disable progress bars and the server status line
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("must run either as a server or as a client")]
    NoMode,

    #[error("{field} must be > 0")]
    Zero { field: &'static str },

    #[error("log_level must be one of trace, debug, info, warn, error; got {0:?}")]
    LogLevel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Server,
    Client,
}

impl Config {
    pub fn mode(&self) -> Result<RunMode, ConfigError> {
        match (self.server, self.client) {
            (true, _) => Ok(RunMode::Server),
            (false, true) => Ok(RunMode::Client),
            (false, false) => Err(ConfigError::NoMode),
        }
    }

    /// `host:port` of the HTTP server
    pub fn http_authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `ip:udp_port` of the UDP server
    pub fn udp_target(&self) -> String {
        format!("{}:{}", self.ip, self.udp_port)
    }

    pub fn http_bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn udp_bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.udp_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn datagram_policy(&self) -> RetryPolicy {
        self.policy(Duration::from_millis(self.reply_timeout_ms))
    }

    pub fn connection_policy(&self) -> RetryPolicy {
        self.policy(self.request_timeout())
    }

    fn policy(&self, timeout: Duration) -> RetryPolicy {
        let policy = RetryPolicy::unbounded(timeout);
        match self.max_attempts {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        debug!("Validating configuration");

        if self.num == 0 {
            return Err(ConfigError::Zero { field: "num" });
        }
        if self.port == 0 || self.udp_port == 0 {
            return Err(ConfigError::Zero { field: "port" });
        }
        if self.reply_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::Zero { field: "timeout" });
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Zero { field: "max_attempts" });
        }
        if self.update_interval == 0 {
            return Err(ConfigError::Zero { field: "update_interval" });
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::LogLevel(self.log_level.clone()));
        }

        debug!("Configuration validated successfully");
        Ok(())
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }
}
