use crate::packet::{Nanoseconds, SECOND};

/// Bitmask of channels present in an interleaved stream
pub type ChannelMask = u32;

pub const CHANNEL_MASK_MONO: ChannelMask = 0x1;
pub const CHANNEL_MASK_STEREO: ChannelMask = 0x3;

/// Sample rate plus channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    sample_rate: u32,
    channels: ChannelMask,
}

impl SampleSpec {
    pub const fn new(sample_rate: u32, channels: ChannelMask) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_mask(&self) -> ChannelMask {
        self.channels
    }

    pub fn num_channels(&self) -> usize {
        self.channels.count_ones() as usize
    }

    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channels != 0
    }

    /// Duration to samples per channel, rounded to nearest
    pub fn ns_to_samples(&self, ns: Nanoseconds) -> i64 {
        let num = ns as i128 * self.sample_rate as i128;
        let half = SECOND as i128 / 2;
        let rounded = if num >= 0 { num + half } else { num - half };
        (rounded / SECOND as i128) as i64
    }

    /// Samples per channel to duration
    pub fn samples_to_ns(&self, samples: i64) -> Nanoseconds {
        if self.sample_rate == 0 {
            return 0;
        }
        (samples as i128 * SECOND as i128 / self.sample_rate as i128) as Nanoseconds
    }

    /// Duration to interleaved sample count
    pub fn ns_to_size(&self, ns: Nanoseconds) -> usize {
        self.ns_to_samples(ns).max(0) as usize * self.num_channels()
    }
}
