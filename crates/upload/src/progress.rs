use std::time::Instant;

use crate::types::UploadProgress;

/// Turns `(bytes_sent, bytes_total)` observations into [`UploadProgress`].
///
/// Percent never decreases. Throughput is measured between two consecutive
/// observations (the first one is measured from when the meter started).
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    last_sent: u64,
    last_at: Instant,
    last_percent: u8,
}

impl ProgressMeter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a meter whose first throughput window starts at `started`.
    pub fn starting_at(started: Instant) -> Self {
        Self {
            last_sent: 0,
            last_at: started,
            last_percent: 0,
        }
    }

    pub fn observe(&mut self, sent: u64, total: u64) -> UploadProgress {
        self.observe_at(sent, total, Instant::now())
    }

    /// Records an observation taken at `now`.
    pub fn observe_at(&mut self, sent: u64, total: u64, now: Instant) -> UploadProgress {
        if total == 0 {
            return UploadProgress {
                percent: 0,
                throughput_mbps: None,
                bytes_sent: sent,
                bytes_total: 0,
            };
        }

        let clamped = sent.min(total);
        let percent = (u128::from(clamped) * 100 / u128::from(total)) as u8;
        self.last_percent = self.last_percent.max(percent);

        let delta = sent.saturating_sub(self.last_sent);
        let elapsed = now.saturating_duration_since(self.last_at).as_secs_f64();
        let mbps = if elapsed > 0.0 {
            (delta as f64 * 8.0 / 1e6) / elapsed
        } else {
            0.0
        };

        self.last_sent = self.last_sent.max(sent);
        self.last_at = now;

        UploadProgress {
            percent: self.last_percent,
            throughput_mbps: Some(mbps),
            bytes_sent: sent,
            bytes_total: total,
        }
    }
}

impl Default for ProgressMeter {
    fn default() -> Self {
        Self::new()
    }
}
