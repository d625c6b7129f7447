use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging
///
/// `level` is the default filter; `RUST_LOG` overrides it when set.
/// Examples:
/// - `RUST_LOG=debug` - Debug level and above, including every datagram
/// - `RUST_LOG=pingpair=debug` - Debug level for pingpair only
/// - `RUST_LOG=warn` - Only retries, malformed frames and failures
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_thread_names(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true),
            )
            .init();
    }
}
