/// Audio pump
///
/// Moves fixed-size frames from a source to a sink on the calling thread.
/// With timing enabled the loop is paced on the wall clock the same way a
/// sound card would pull; without it frames are moved as fast as the sink
/// accepts them.

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session::SessionReader;
use crate::audio::{AudioReader, Frame, Sample, SampleSpec, Sink};

/// Audio reader that can tell whether anything is being received
pub trait Source: AudioReader {
    fn is_playing(&self) -> bool;
}

impl Source for SessionReader {
    fn is_playing(&self) -> bool {
        self.session().is_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpMode {
    /// Run until cancelled or the source fails
    #[default]
    Permanent,
    /// Stop once the source was playing and no longer is
    Oneshot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub frames: u64,
    pub samples: u64,
}

pub struct Pump {
    spec: SampleSpec,
    mode: PumpMode,
    timing: bool,
    frame: Vec<Sample>,
}

impl Pump {
    pub fn new(spec: SampleSpec, frame_size: usize, mode: PumpMode, timing: bool) -> Self {
        let channels = spec.num_channels().max(1);
        let frame_size = frame_size.max(channels) / channels * channels;
        Self {
            spec,
            mode,
            timing,
            frame: vec![0.0; frame_size],
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame.len()
    }

    pub fn run<R, S>(&mut self, source: &mut R, sink: &mut S, cancel: &CancellationToken) -> Result<PumpStats>
    where
        R: Source + ?Sized,
        S: Sink + ?Sized,
    {
        let mut stats = PumpStats::default();
        let mut was_playing = false;
        let start = Instant::now();
        let frame_samples = (self.frame.len() / self.spec.num_channels().max(1)) as i64;

        info!(
            "pump: starting, mode={:?} timing={} frame={} samples",
            self.mode,
            self.timing,
            self.frame.len()
        );

        while !cancel.is_cancelled() {
            let mut frame = Frame::new(&mut self.frame);
            if !source.read(&mut frame) {
                debug!("pump: source reported end of stream");
                break;
            }
            sink.write(&frame).context("Failed to write frame to sink")?;
            stats.frames += 1;
            stats.samples += frame.len() as u64;

            let playing = source.is_playing();
            if self.mode == PumpMode::Oneshot && was_playing && !playing {
                info!("pump: source stopped playing, exiting");
                break;
            }
            was_playing |= playing;

            if self.timing {
                let target = Duration::from_nanos(
                    self.spec.samples_to_ns(stats.frames as i64 * frame_samples).max(0) as u64,
                );
                let actual = start.elapsed();
                if target > actual {
                    std::thread::sleep(target - actual);
                }
            }
        }

        sink.flush()?;
        info!("pump: stopped after {} frames", stats.frames);
        Ok(stats)
    }
}
