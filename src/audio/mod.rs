//! Audio frames and the sample-side pipeline stages
//!
//! Every stage pulls fixed-size frames from its upstream through
//! `AudioReader`. A reader must fill the whole frame on every successful
//! call; missing data is concealed, never shortened.

pub mod depacketizer;
pub mod frame;
pub mod latency;
pub mod poison;
pub mod profiler;
pub mod resampler;
pub mod resampler_reader;
pub mod sample_spec;
pub mod sink;
pub mod watchdog;

pub use depacketizer::{Depacketizer, DepacketizerStats};
pub use frame::{Frame, FrameFlags, Sample};
pub use latency::{LatencyMonitor, LatencyMonitorConfig};
pub use poison::{PoisonReader, POISON_SAMPLE};
pub use profiler::{Profiler, ProfilingReader};
pub use resampler::{new_resampler, Resampler, ResamplerBackend, ResamplerConfig};
pub use resampler_reader::ResamplerReader;
pub use sample_spec::{ChannelMask, SampleSpec, CHANNEL_MASK_MONO, CHANNEL_MASK_STEREO};
pub use sink::{NullSink, RawFileSink, Sink};
pub use watchdog::{Watchdog, WatchdogConfig, WatchdogReader};

/// Pull side of an audio stage
pub trait AudioReader {
    /// Fill the whole frame. Returns false when the stream is over or the
    /// stage has failed; the frame content is then unspecified.
    fn read(&mut self, frame: &mut Frame<'_>) -> bool;
}

impl<R: AudioReader + ?Sized> AudioReader for &mut R {
    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        (**self).read(frame)
    }
}

impl<R: AudioReader + ?Sized> AudioReader for Box<R> {
    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        (**self).read(frame)
    }
}
