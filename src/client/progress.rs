use crate::client::constants::PROGRESS_TICK_INTERVAL_MS;
use crate::client::error::{ClientError, Result};
use crate::client::reporter::Transport;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// One progress bar per transport, drawn together while both engines run.
pub struct ProgressTracker {
    multi: MultiProgress,
    quiet: bool,
}

impl ProgressTracker {
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            quiet,
        }
    }

    /// Bar for `transport` counting `probe_count` probes. Hidden in quiet mode.
    pub fn bar(&self, transport: Transport, probe_count: usize) -> Result<ProgressBar> {
        if self.quiet {
            return Ok(ProgressBar::hidden());
        }

        let pb = self.multi.add(ProgressBar::new(probe_count as u64));
        pb.set_style(
            ProgressStyle::with_template(
                "{prefix:>5} {bar:40.cyan/blue} {pos:>5}/{len:5} [{elapsed_precise}] {msg}",
            )
            .map_err(|e| {
                ClientError::Measurement(format!("Failed to create progress style: {}", e))
            })?
            .progress_chars("█░"),
        );
        pb.set_prefix(transport.label());
        pb.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_INTERVAL_MS));
        Ok(pb)
    }
}
