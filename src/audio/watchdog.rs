use tracing::warn;

use super::{AudioReader, Frame, FrameFlags, SampleSpec};
use crate::packet::{Nanoseconds, SECOND};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Terminate after this long without any decoded samples (<= 0 disables)
    pub no_playback_timeout: Nanoseconds,
    /// Terminate after this long of uninterrupted incomplete frames (<= 0 disables)
    pub broken_playback_timeout: Nanoseconds,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            no_playback_timeout: 2 * SECOND,
            broken_playback_timeout: 2 * SECOND,
        }
    }
}

/// Detects a dead or broken stream from the flags of produced frames
///
/// Time is counted in samples per channel of the frames seen so far, so the
/// verdict follows the audio clock rather than the wall clock.
#[derive(Debug)]
pub struct Watchdog {
    no_playback_timeout: i64,
    broken_playback_timeout: i64,
    curr_time: i64,
    last_nonblank: i64,
    last_complete: i64,
    alive: bool,
}

impl Watchdog {
    pub fn new(config: &WatchdogConfig, spec: SampleSpec) -> Self {
        Self {
            no_playback_timeout: spec.ns_to_samples(config.no_playback_timeout),
            broken_playback_timeout: spec.ns_to_samples(config.broken_playback_timeout),
            curr_time: 0,
            last_nonblank: 0,
            last_complete: 0,
            alive: true,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Account one frame of `duration` samples per channel.
    /// Returns false once the stream is considered dead; that is final.
    pub fn update(&mut self, duration: usize, flags: FrameFlags) -> bool {
        if !self.alive {
            return false;
        }
        self.curr_time += duration as i64;

        if flags.contains(FrameFlags::NONBLANK) {
            self.last_nonblank = self.curr_time;
        }
        if !flags.contains(FrameFlags::INCOMPLETE) {
            self.last_complete = self.curr_time;
        }

        if self.no_playback_timeout > 0
            && self.curr_time - self.last_nonblank >= self.no_playback_timeout
        {
            warn!(
                "watchdog: no playback for {} samples, terminating session",
                self.curr_time - self.last_nonblank
            );
            self.alive = false;
        } else if self.broken_playback_timeout > 0
            && self.curr_time - self.last_complete >= self.broken_playback_timeout
        {
            warn!(
                "watchdog: broken playback for {} samples, terminating session",
                self.curr_time - self.last_complete
            );
            self.alive = false;
        }

        self.alive
    }
}

/// Feeds every frame read from `reader` into the watchdog
///
/// The frame that trips the watchdog is still delivered; later reads fail.
pub struct WatchdogReader<'a, R: ?Sized> {
    reader: &'a mut R,
    watchdog: &'a mut Watchdog,
    channels: usize,
}

impl<'a, R: AudioReader + ?Sized> WatchdogReader<'a, R> {
    pub fn new(reader: &'a mut R, watchdog: &'a mut Watchdog, spec: SampleSpec) -> Self {
        Self {
            reader,
            watchdog,
            channels: spec.num_channels().max(1),
        }
    }
}

impl<R: AudioReader + ?Sized> AudioReader for WatchdogReader<'_, R> {
    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        if !self.watchdog.is_alive() {
            return false;
        }
        if !self.reader.read(frame) {
            return false;
        }
        self.watchdog.update(frame.len() / self.channels, frame.flags());
        true
    }
}
