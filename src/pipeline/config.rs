/// Receiver pipeline configuration
///
/// `SessionConfig` describes one incoming stream, `CommonConfig` the output
/// side shared by every session of a receiver. Both are plain data, copied
/// into a session at construction and never changed afterwards.

use std::time::Duration;

use crate::audio::{
    ChannelMask, LatencyMonitorConfig, ResamplerBackend, ResamplerConfig, SampleSpec,
    WatchdogConfig, CHANNEL_MASK_STEREO,
};
use crate::error::ConfigError;
use crate::fec::{FecReaderConfig, FecScheme};
use crate::packet::{Nanoseconds, MILLISECOND};
use crate::rtp::format::PAYLOAD_TYPE_L16_STEREO;
use crate::rtp::{Format, FormatMap, ValidatorConfig};

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_CHANNEL_MASK: ChannelMask = CHANNEL_MASK_STEREO;
pub const DEFAULT_PACKET_LENGTH: Nanoseconds = 7 * MILLISECOND;
pub const DEFAULT_LATENCY: Nanoseconds = 200 * MILLISECOND;
pub const DEFAULT_FRAME_LENGTH: Nanoseconds = 7 * MILLISECOND;
pub const DEFAULT_MIN_LATENCY_FACTOR: f64 = -1.0;
pub const DEFAULT_MAX_LATENCY_FACTOR: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub target_latency: Nanoseconds,
    /// Lower edge of the latency window relative to the target (clamped at 0)
    pub min_latency_factor: f64,
    /// Upper edge of the latency window relative to the target
    pub max_latency_factor: f64,
    /// Expected packet duration, used to size the reordering delay
    pub packet_length: Nanoseconds,
    pub payload_type: u8,
    pub channels: ChannelMask,
    pub fec_scheme: FecScheme,
    pub fec_reader: FecReaderConfig,
    /// Per-queue packet bound (0 = unbounded)
    pub max_queue_packets: usize,
    pub validator: ValidatorConfig,
    pub latency_monitor: LatencyMonitorConfig,
    pub watchdog: WatchdogConfig,
    pub resampler_backend: ResamplerBackend,
    pub resampler: ResamplerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_latency: DEFAULT_LATENCY,
            min_latency_factor: DEFAULT_MIN_LATENCY_FACTOR,
            max_latency_factor: DEFAULT_MAX_LATENCY_FACTOR,
            packet_length: DEFAULT_PACKET_LENGTH,
            payload_type: PAYLOAD_TYPE_L16_STEREO,
            channels: DEFAULT_CHANNEL_MASK,
            fec_scheme: FecScheme::Disabled,
            fec_reader: FecReaderConfig::default(),
            max_queue_packets: 512,
            validator: ValidatorConfig::default(),
            latency_monitor: LatencyMonitorConfig::default(),
            watchdog: WatchdogConfig::default(),
            resampler_backend: ResamplerBackend::default(),
            resampler: ResamplerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// `[max(0, target * min_factor), target * max_factor]`
    pub fn latency_window(&self) -> (Nanoseconds, Nanoseconds) {
        let target = self.target_latency as f64;
        let min = ((target * self.min_latency_factor) as Nanoseconds).max(0);
        let max = (target * self.max_latency_factor) as Nanoseconds;
        (min, max)
    }

    /// Packets held back before playback starts
    pub fn delay_packets(&self) -> usize {
        if self.packet_length <= 0 || self.target_latency <= 0 {
            return 0;
        }
        let target = self.target_latency as u64;
        let packet = self.packet_length as u64;
        target.div_ceil(packet) as usize
    }

    pub fn validate(&self, format_map: &FormatMap) -> Result<(), ConfigError> {
        if self.target_latency <= 0 {
            return Err(ConfigError::InvalidLatency(self.target_latency));
        }
        if self.packet_length <= 0 {
            return Err(ConfigError::InvalidPacketLength(self.packet_length));
        }
        let (min, max) = self.latency_window();
        if !(min <= self.target_latency && self.target_latency <= max) {
            return Err(ConfigError::InvalidLatencyWindow {
                min,
                target: self.target_latency,
                max,
            });
        }
        let format = self.format(format_map)?;
        if format.channels != self.channels {
            return Err(ConfigError::ChannelMismatch {
                stream: format.channels,
                output: self.channels,
            });
        }
        Ok(())
    }

    pub fn format<'a>(&self, format_map: &'a FormatMap) -> Result<&'a Format, ConfigError> {
        format_map
            .find(self.payload_type)
            .ok_or(ConfigError::UnsupportedPayloadType(self.payload_type))
    }
}

#[derive(Debug, Clone)]
pub struct CommonConfig {
    pub output_sample_rate: u32,
    pub output_channels: ChannelMask,
    /// Duration of the chunks moved between pipeline stages
    pub internal_frame_length: Nanoseconds,
    /// Insert a resampler driven by the latency monitor
    pub resampling: bool,
    /// Pace the output pump on the wall clock
    pub timing: bool,
    /// Fill frames with a sentinel before each stage writes them
    pub poisoning: bool,
    pub profiling: bool,
    pub profiler_interval: Duration,
    /// Conceal losses with a tone instead of silence
    pub beeping: bool,
    /// Upper bound on concurrent sessions in a group (0 = unbounded)
    pub max_sessions: usize,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            output_sample_rate: DEFAULT_SAMPLE_RATE,
            output_channels: DEFAULT_CHANNEL_MASK,
            internal_frame_length: DEFAULT_FRAME_LENGTH,
            resampling: false,
            timing: false,
            poisoning: false,
            profiling: false,
            profiler_interval: Duration::from_secs(1),
            beeping: false,
            max_sessions: 16,
        }
    }
}

impl CommonConfig {
    pub fn output_spec(&self) -> SampleSpec {
        SampleSpec::new(self.output_sample_rate, self.output_channels)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate(self.output_sample_rate));
        }
        if self.output_channels == 0 {
            return Err(ConfigError::InvalidChannelMask(self.output_channels));
        }
        if self.internal_frame_length <= 0 || self.output_spec().ns_to_samples(self.internal_frame_length) == 0 {
            return Err(ConfigError::InvalidFrameLength(self.internal_frame_length));
        }
        Ok(())
    }

    /// Interleaved samples in one internal frame at the output rate
    pub fn frame_size(&self) -> usize {
        self.output_spec().ns_to_size(self.internal_frame_length)
    }
}
