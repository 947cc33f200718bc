use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::packet::{Nanoseconds, MILLISECOND};

#[derive(Debug, Clone, PartialEq)]
pub struct LatencyMonitorConfig {
    /// Proportional gain applied to the relative latency error
    pub kp: f64,
    /// Largest deviation of the scaling ratio from 1.0
    pub max_correction: f64,
    /// How often the session feeds a latency sample
    pub update_interval: Nanoseconds,
}

impl Default for LatencyMonitorConfig {
    fn default() -> Self {
        Self {
            kp: 0.005,
            max_correction: 0.005,
            update_interval: 5 * MILLISECOND,
        }
    }
}

/// Turns measured latency into a resampler scaling ratio
///
/// Ratios above 1.0 stretch the stream (consume input slower, so the queue
/// grows), below 1.0 compress it (consume faster, the queue drains).
#[derive(Debug)]
pub struct LatencyMonitor {
    target: Nanoseconds,
    min: Nanoseconds,
    max: Nanoseconds,
    kp: f64,
    max_correction: f64,
    ratio: f64,
}

impl LatencyMonitor {
    pub fn new(
        target: Nanoseconds,
        min: Nanoseconds,
        max: Nanoseconds,
        config: &LatencyMonitorConfig,
    ) -> Result<Self, ConfigError> {
        if target <= 0 {
            return Err(ConfigError::InvalidLatency(target));
        }
        if !(min <= target && target <= max) {
            return Err(ConfigError::InvalidLatencyWindow { min, target, max });
        }
        debug!(
            "latency monitor: target={}ms window=[{}ms, {}ms]",
            target / MILLISECOND,
            min / MILLISECOND,
            max / MILLISECOND
        );
        Ok(Self {
            target,
            min,
            max,
            kp: config.kp,
            max_correction: config.max_correction.abs(),
            ratio: 1.0,
        })
    }

    pub fn target(&self) -> Nanoseconds {
        self.target
    }

    pub fn window(&self) -> (Nanoseconds, Nanoseconds) {
        (self.min, self.max)
    }

    /// Last computed ratio
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn update(&mut self, latency: Nanoseconds) -> f64 {
        self.ratio = if latency < self.min {
            1.0 + self.max_correction
        } else if latency > self.max {
            1.0 - self.max_correction
        } else {
            let error = (self.target - latency) as f64 / self.target as f64;
            1.0 + (self.kp * error).clamp(-self.max_correction, self.max_correction)
        };
        trace!(
            "latency monitor: latency={}ms ratio={:.6}",
            latency / MILLISECOND,
            self.ratio
        );
        self.ratio
    }
}
