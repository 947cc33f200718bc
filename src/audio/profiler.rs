use std::time::{Duration, Instant};
use tracing::debug;

use super::{AudioReader, Frame};

const SMOOTHING: f64 = 0.3;

/// Moving average of the sample rate actually pulled through a stage
///
/// Samples are accumulated over `interval`; each completed interval folds
/// its rate into an exponential moving average.
#[derive(Debug)]
pub struct Profiler {
    channels: usize,
    interval: Duration,
    window_start: Option<Instant>,
    window_samples: u64,
    rate: Option<f64>,
}

impl Profiler {
    pub fn new(channels: usize, interval: Duration) -> Self {
        Self {
            channels: channels.max(1),
            interval,
            window_start: None,
            window_samples: 0,
            rate: None,
        }
    }

    /// Account `samples` interleaved samples produced at `now`
    pub fn add_frame(&mut self, samples: usize, now: Instant) {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            self.window_samples = (samples / self.channels) as u64;
            return;
        };
        self.window_samples += (samples / self.channels) as u64;

        let elapsed = now.saturating_duration_since(start);
        if elapsed < self.interval || elapsed.is_zero() {
            return;
        }

        let rate = self.window_samples as f64 / elapsed.as_secs_f64();
        let avg = match self.rate {
            Some(avg) => avg + (rate - avg) * SMOOTHING,
            None => rate,
        };
        self.rate = Some(avg);
        debug!("profiler: rate={:.1} avg={:.1} samples/sec", rate, avg);

        self.window_start = Some(now);
        self.window_samples = 0;
    }

    /// Averaged samples per second per channel, once a full interval passed
    pub fn rate(&self) -> Option<f64> {
        self.rate
    }
}

pub struct ProfilingReader<R> {
    reader: R,
    profiler: Profiler,
}

impl<R: AudioReader> ProfilingReader<R> {
    pub fn new(reader: R, profiler: Profiler) -> Self {
        Self { reader, profiler }
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
}

impl<R: AudioReader> AudioReader for ProfilingReader<R> {
    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        if !self.reader.read(frame) {
            return false;
        }
        self.profiler.add_frame(frame.len(), Instant::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_after_interval() {
        let mut p = Profiler::new(2, Duration::from_millis(100));
        let t0 = Instant::now();
        p.add_frame(200, t0);
        assert_eq!(p.rate(), None);
        p.add_frame(200, t0 + Duration::from_millis(50));
        assert_eq!(p.rate(), None);
        p.add_frame(200, t0 + Duration::from_millis(100));
        // 300 frames per channel in 100ms
        let rate = p.rate().unwrap();
        assert!((rate - 3000.0).abs() < 1e-6, "rate {}", rate);
    }

    #[test]
    fn test_moving_average_smooths() {
        let mut p = Profiler::new(1, Duration::from_millis(10));
        let t0 = Instant::now();
        p.add_frame(0, t0);
        p.add_frame(100, t0 + Duration::from_millis(10));
        assert!((p.rate().unwrap() - 10_000.0).abs() < 1e-6);
        p.add_frame(200, t0 + Duration::from_millis(20));
        let avg = p.rate().unwrap();
        assert!(avg > 10_000.0 && avg < 20_000.0);
    }
}
