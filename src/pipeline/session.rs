/// Receiver session
///
/// One session per sender. The network side offers packets through
/// `handle`, which only touches the router and one sorted queue. The audio
/// side pulls frames through `read` and drives housekeeping through
/// `update`; both take the pipeline lock.
///
/// Packet stages form an owned chain:
///
/// ```text
/// source queue -> delayed reader -> [FEC reader <- repair queue] -> validator
/// ```
///
/// Audio stages are borrowed per read so the session can reach into each of
/// them between frames:
///
/// ```text
/// depacketizer -> watchdog -> [poison] -> [resampler] -> [poison] -> frame
/// ```

use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::config::{CommonConfig, SessionConfig};
use crate::audio::{
    new_resampler, AudioReader, Depacketizer, DepacketizerStats, Frame, LatencyMonitor,
    PoisonReader, Profiler, ResamplerReader, SampleSpec, Watchdog, WatchdogReader,
};
use crate::error::ConfigError;
use crate::fec::FecReader;
use crate::packet::{
    timestamp_diff, DelayedReader, Nanoseconds, PacketFlags, PacketPtr, PacketReader,
    QueueStats, Router, SharedQueue,
};
use crate::rtp::validator::ValidatorStats;
use crate::rtp::{FormatMap, Parser, Validator};

/// Session lifecycle; `Terminated` and `Invalid` are final
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    Constructing = 0,
    Active = 1,
    Terminated = 2,
    Invalid = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Constructing,
            1 => SessionState::Active,
            2 => SessionState::Terminated,
            _ => SessionState::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// No playback or broken playback for too long
    Watchdog,
    /// Another sender took over the stream
    IdentityBroken,
    Requested,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Watchdog => write!(f, "watchdog timeout"),
            TerminationReason::IdentityBroken => write!(f, "stream identity broken"),
            TerminationReason::Requested => write!(f, "terminated by owner"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub packets_handled: u64,
    pub source_queue: QueueStats,
    pub validator: ValidatorStats,
    pub depacketizer: DepacketizerStats,
    /// Last scaling applied to the resampler (1.0 without resampling)
    pub scaling: f64,
    /// Last measured latency
    pub latency: Option<Nanoseconds>,
}

type PacketChain = Validator<Box<dyn PacketReader>>;

/// Audio stages borrowed for one read
struct Chain<'a> {
    depacketizer: &'a mut Depacketizer<PacketChain>,
    watchdog: &'a mut Watchdog,
    resampler: Option<&'a mut ResamplerReader>,
    spec: SampleSpec,
    poisoning: bool,
}

impl AudioReader for Chain<'_> {
    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        let mut upstream = WatchdogReader::new(&mut *self.depacketizer, &mut *self.watchdog, self.spec);
        match self.resampler.as_deref_mut() {
            Some(resampler) if self.poisoning => {
                resampler.read(frame, &mut PoisonReader::new(&mut upstream))
            }
            Some(resampler) => resampler.read(frame, &mut upstream),
            None => upstream.read(frame),
        }
    }
}

struct Pipeline {
    in_spec: SampleSpec,
    depacketizer: Depacketizer<PacketChain>,
    watchdog: Watchdog,
    resampler: Option<ResamplerReader>,
    poisoning: bool,
    profiler: Option<Profiler>,
    latency_monitor: LatencyMonitor,
    update_interval: Nanoseconds,
    last_latency_update: Option<Nanoseconds>,
    last_latency: Option<Nanoseconds>,
    /// Stream generation the latency baseline belongs to
    generation: u64,
    source_queue: SharedQueue,
}

impl Pipeline {
    fn build(
        session: &SessionConfig,
        common: &CommonConfig,
        format_map: &Arc<FormatMap>,
    ) -> Result<(Router, Pipeline), ConfigError> {
        common.validate()?;
        session.validate(format_map)?;

        let format = session.format(format_map)?;
        let in_spec = format.sample_spec();
        let out_spec = common.output_spec();
        if in_spec.channel_mask() != out_spec.channel_mask() {
            return Err(ConfigError::ChannelMismatch {
                stream: in_spec.channel_mask(),
                output: out_spec.channel_mask(),
            });
        }
        if !common.resampling && in_spec.sample_rate() != out_spec.sample_rate() {
            return Err(ConfigError::RateMismatch {
                stream: in_spec.sample_rate(),
                output: out_spec.sample_rate(),
            });
        }

        let mut router = Router::new();
        let source_queue = SharedQueue::new(session.max_queue_packets);
        router.add_route(PacketFlags::SOURCE, Box::new(source_queue.clone()));

        let delayed = DelayedReader::new(source_queue.clone(), session.delay_packets());

        let packets: Box<dyn PacketReader> = match session.fec_scheme.new_decoder() {
            Some(decoder) => {
                let repair_queue = SharedQueue::new(session.max_queue_packets);
                router.add_route(PacketFlags::REPAIR, Box::new(repair_queue.clone()));
                Box::new(FecReader::new(
                    session.fec_reader.clone(),
                    decoder,
                    Parser::new(Arc::clone(format_map)),
                    delayed,
                    repair_queue,
                ))
            }
            None => Box::new(delayed),
        };

        let validator = Validator::new(
            packets,
            session.validator.clone(),
            session.payload_type,
            in_spec.sample_rate(),
        );
        let depacketizer = Depacketizer::new(validator, format.new_decoder(), in_spec, common.beeping);
        let watchdog = Watchdog::new(&session.watchdog, in_spec);

        let channels = in_spec.num_channels();
        let resampler = if common.resampling {
            let chunk = out_spec.ns_to_samples(common.internal_frame_length).max(1) as usize;
            let ratio = out_spec.sample_rate() as f64 / in_spec.sample_rate() as f64;
            let resampler = new_resampler(
                session.resampler_backend,
                &session.resampler,
                channels,
                ratio,
                chunk,
            )?;
            Some(ResamplerReader::new(resampler, channels))
        } else {
            None
        };

        let (min, max) = session.latency_window();
        let latency_monitor =
            LatencyMonitor::new(session.target_latency, min, max, &session.latency_monitor)?;

        let profiler = common
            .profiling
            .then(|| Profiler::new(channels, common.profiler_interval));

        Ok((
            router,
            Pipeline {
                in_spec,
                depacketizer,
                watchdog,
                resampler,
                poisoning: common.poisoning,
                profiler,
                latency_monitor,
                update_interval: session.latency_monitor.update_interval,
                last_latency_update: None,
                last_latency: None,
                generation: 0,
                source_queue,
            },
        ))
    }

    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        let mut chain = Chain {
            depacketizer: &mut self.depacketizer,
            watchdog: &mut self.watchdog,
            resampler: self.resampler.as_mut(),
            spec: self.in_spec,
            poisoning: self.poisoning,
        };
        let ok = if self.poisoning {
            PoisonReader::new(chain).read(frame)
        } else {
            chain.read(frame)
        };

        if ok {
            if let Some(profiler) = self.profiler.as_mut() {
                profiler.add_frame(frame.len(), Instant::now());
            }
        }
        ok
    }

    /// Queue latency: newest queued sample vs. next sample to play
    fn latency(&self) -> Option<Nanoseconds> {
        if !self.depacketizer.is_started() {
            return None;
        }
        let latest = self.source_queue.latest()?;
        let end = latest.rtp()?.end();
        let samples = timestamp_diff(end, self.depacketizer.timestamp());
        Some(self.in_spec.samples_to_ns(samples as i64))
    }

    fn update(&mut self, time: Nanoseconds) -> Result<(), TerminationReason> {
        if !self.watchdog.is_alive() {
            return Err(TerminationReason::Watchdog);
        }
        if self.depacketizer.reader().is_broken() {
            return Err(TerminationReason::IdentityBroken);
        }

        let generation = self.depacketizer.generation();
        if generation != self.generation {
            debug!("session: stream restarted, resetting latency baseline");
            self.generation = generation;
            self.source_queue.rebase_latest();
        }

        let due = match self.last_latency_update {
            Some(last) => time - last >= self.update_interval,
            None => true,
        };
        if !due {
            return Ok(());
        }
        let Some(latency) = self.latency() else {
            return Ok(());
        };
        self.last_latency_update = Some(time);
        self.last_latency = Some(latency);

        let ratio = self.latency_monitor.update(latency);
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.set_scaling(ratio);
        }
        Ok(())
    }

    fn stats(&self) -> (QueueStats, ValidatorStats, DepacketizerStats, f64, Option<Nanoseconds>) {
        (
            self.source_queue.stats(),
            self.depacketizer.reader().stats(),
            self.depacketizer.stats(),
            self.resampler.as_ref().map(|r| r.scaling()).unwrap_or(1.0),
            self.last_latency,
        )
    }
}

pub struct ReceiverSession {
    src_address: SocketAddr,
    state: AtomicU8,
    termination: Mutex<Option<TerminationReason>>,
    router: Mutex<Router>,
    pipeline: Mutex<Option<Pipeline>>,
    packets_handled: AtomicU64,
}

impl ReceiverSession {
    pub fn new(
        session_config: &SessionConfig,
        common_config: &CommonConfig,
        src_address: SocketAddr,
        format_map: &Arc<FormatMap>,
    ) -> Self {
        let session = Self {
            src_address,
            state: AtomicU8::new(SessionState::Constructing as u8),
            termination: Mutex::new(None),
            router: Mutex::new(Router::new()),
            pipeline: Mutex::new(None),
            packets_handled: AtomicU64::new(0),
        };

        match Pipeline::build(session_config, common_config, format_map) {
            Ok((router, pipeline)) => {
                *session.router.lock() = router;
                *session.pipeline.lock() = Some(pipeline);
                session.state.store(SessionState::Active as u8, Ordering::Release);
                info!(
                    "session: created for {}, payload_type={} fec={:?} latency={}ms",
                    src_address,
                    session_config.payload_type,
                    session_config.fec_scheme,
                    session_config.target_latency / crate::packet::MILLISECOND
                );
            }
            Err(e) => {
                warn!("session: invalid configuration for {}: {}", src_address, e);
                session.state.store(SessionState::Invalid as u8, Ordering::Release);
            }
        }
        session
    }

    pub fn src_address(&self) -> SocketAddr {
        self.src_address
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_valid(&self) -> bool {
        self.state() != SessionState::Invalid
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        *self.termination.lock()
    }

    /// Accept a packet if it belongs to this session's sender
    ///
    /// Source packets must come from the exact sender address. Repair
    /// packets only need the sender's host, since senders usually emit them
    /// from a separate socket.
    pub fn handle(&self, packet: &PacketPtr) -> bool {
        if !self.is_active() {
            return false;
        }
        if let Some(udp) = packet.udp() {
            let matches = if packet.has_flags(PacketFlags::SOURCE) {
                udp.src_addr == self.src_address
            } else {
                udp.src_addr.ip() == self.src_address.ip()
            };
            if !matches {
                return false;
            }
        }
        let routed = self.router.lock().route(Arc::clone(packet));
        if routed {
            self.packets_handled.fetch_add(1, Ordering::Relaxed);
        }
        routed
    }

    /// Fill `frame`; false once the session is no longer active
    pub fn read(&self, frame: &mut Frame<'_>) -> bool {
        if !self.is_active() {
            return false;
        }
        let mut guard = self.pipeline.lock();
        let Some(pipeline) = guard.as_mut() else {
            return false;
        };
        pipeline.read(frame)
    }

    /// Periodic housekeeping: watchdog and identity checks, latency control.
    /// Returns false if the session is (now) terminated.
    pub fn update(&self, time: Nanoseconds) -> bool {
        if !self.is_active() {
            return false;
        }
        let verdict = match self.pipeline.lock().as_mut() {
            Some(pipeline) => pipeline.update(time),
            None => Err(TerminationReason::Requested),
        };
        match verdict {
            Ok(()) => true,
            Err(reason) => {
                self.terminate_with(reason);
                false
            }
        }
    }

    pub fn terminate(&self) {
        self.terminate_with(TerminationReason::Requested);
    }

    fn terminate_with(&self, reason: TerminationReason) {
        let swapped = self.state.compare_exchange(
            SessionState::Active as u8,
            SessionState::Terminated as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if swapped.is_ok() {
            *self.termination.lock() = Some(reason);
            info!("session: terminated {}: {}", self.src_address, reason);
        } else {
            debug!("session: terminate ignored in state {:?}", self.state());
        }
    }

    pub fn reader(self: &Arc<Self>) -> SessionReader {
        SessionReader {
            session: Arc::clone(self),
        }
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            packets_handled: self.packets_handled.load(Ordering::Relaxed),
            scaling: 1.0,
            ..Default::default()
        };
        if let Some(pipeline) = self.pipeline.lock().as_ref() {
            let (queue, validator, depacketizer, scaling, latency) = pipeline.stats();
            stats.source_queue = queue;
            stats.validator = validator;
            stats.depacketizer = depacketizer;
            stats.scaling = scaling;
            stats.latency = latency;
        }
        stats
    }
}

/// Owned audio reader handle for a session
#[derive(Clone)]
pub struct SessionReader {
    session: Arc<ReceiverSession>,
}

impl SessionReader {
    pub fn session(&self) -> &Arc<ReceiverSession> {
        &self.session
    }
}

impl AudioReader for SessionReader {
    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        self.session.read(frame)
    }
}
