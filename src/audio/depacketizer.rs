/// Depacketizer
///
/// Turns the ordered packet stream into a continuous sample stream. The
/// stream position is an RTP timestamp: every frame advances it by the frame
/// duration once the first packet has been seen. Packet payloads are decoded
/// straight into the output frame; holes between packets and an empty queue
/// are concealed with silence (or a beep when enabled).
///
/// When the upstream generation changes the sender has restarted its
/// timestamps, so the next packet re-anchors the position like the first one.

use std::f32::consts::PI;
use tracing::{debug, info, trace};

use super::{AudioReader, Frame, FrameFlags, Sample, SampleSpec};
use crate::packet::{timestamp_diff, timestamp_le, PacketPtr, PacketReader, Timestamp};
use crate::rtp::PayloadDecoder;

const BEEP_FREQUENCY: f32 = 880.0;
const BEEP_AMPLITUDE: f32 = 0.25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepacketizerStats {
    pub packets_decoded: u64,
    pub packets_dropped: u64,
    pub samples_decoded: u64,
    pub samples_missing: u64,
}

/// Concealment tone generator
#[derive(Debug)]
struct Beep {
    sample_rate: f32,
    phase: u64,
}

impl Beep {
    fn fill(&mut self, out: &mut [Sample], channels: usize) {
        for frame in out.chunks_mut(channels) {
            let t = self.phase as f32 / self.sample_rate;
            let value = BEEP_AMPLITUDE * (2.0 * PI * BEEP_FREQUENCY * t).sin();
            frame.fill(value);
            self.phase = (self.phase + 1) % self.sample_rate as u64;
        }
    }
}

fn conceal(beep: &mut Option<Beep>, out: &mut [Sample], channels: usize) {
    match beep {
        Some(beep) => beep.fill(out, channels),
        None => out.fill(0.0),
    }
}

pub struct Depacketizer<R> {
    reader: R,
    decoder: Box<dyn PayloadDecoder>,
    spec: SampleSpec,
    packet: Option<PacketPtr>,
    /// Next stream timestamp to produce
    timestamp: Timestamp,
    started: bool,
    generation: u64,
    beep: Option<Beep>,
    stats: DepacketizerStats,
}

impl<R: PacketReader> Depacketizer<R> {
    pub fn new(reader: R, decoder: Box<dyn PayloadDecoder>, spec: SampleSpec, beeping: bool) -> Self {
        let beep = beeping.then(|| Beep {
            sample_rate: spec.sample_rate().max(1) as f32,
            phase: 0,
        });
        Self {
            reader,
            decoder,
            spec,
            packet: None,
            timestamp: 0,
            started: false,
            generation: 0,
            beep,
            stats: DepacketizerStats::default(),
        }
    }

    /// Next timestamp to be produced; meaningful once started
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Upstream generation the current position belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> DepacketizerStats {
        self.stats
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Fetch the next packet that still has samples at or after the
    /// current position
    fn update_packet(&mut self, flags: &mut FrameFlags) {
        if self.packet.is_some() {
            return;
        }
        while let Some(packet) = self.reader.read() {
            let Some(rtp) = packet.rtp() else {
                trace!("depacketizer: dropping non-RTP packet");
                continue;
            };
            if rtp.duration == 0 {
                trace!("depacketizer: dropping empty packet, sn={}", rtp.seqnum);
                continue;
            }

            let generation = self.reader.generation();
            if generation != self.generation {
                if self.started {
                    info!(
                        "depacketizer: stream restarted, re-anchoring at sn={} ts={}",
                        rtp.seqnum, rtp.timestamp
                    );
                }
                self.generation = generation;
                self.started = false;
            }

            if !self.started {
                info!(
                    "depacketizer: got first packet, sn={} ts={}",
                    rtp.seqnum, rtp.timestamp
                );
                self.started = true;
                self.timestamp = rtp.timestamp;
            } else if timestamp_le(rtp.end(), self.timestamp) {
                debug!(
                    "depacketizer: dropping late packet, sn={} ts={} end={} cur={}",
                    rtp.seqnum,
                    rtp.timestamp,
                    rtp.end(),
                    self.timestamp
                );
                self.stats.packets_dropped += 1;
                flags.insert(FrameFlags::DROPS);
                continue;
            }

            self.stats.packets_decoded += 1;
            self.packet = Some(packet);
            return;
        }
    }

    /// Produce up to `out.len() / channels` samples per channel and return
    /// how many were produced
    fn fill(&mut self, out: &mut [Sample], flags: &mut FrameFlags) -> usize {
        let channels = self.spec.num_channels().max(1);
        let wanted = out.len() / channels;

        self.update_packet(flags);

        let Some(packet) = self.packet.as_ref() else {
            conceal(&mut self.beep, out, channels);
            if self.started {
                flags.insert(FrameFlags::INCOMPLETE);
                self.stats.samples_missing += wanted as u64;
                self.timestamp = self.timestamp.wrapping_add(wanted as Timestamp);
            }
            return wanted;
        };
        let Some(rtp) = packet.rtp() else {
            self.packet = None;
            return 0;
        };

        let gap = timestamp_diff(rtp.timestamp, self.timestamp);
        if gap > 0 {
            let n = (gap as usize).min(wanted);
            conceal(&mut self.beep, &mut out[..n * channels], channels);
            flags.insert(FrameFlags::INCOMPLETE);
            self.stats.samples_missing += n as u64;
            self.timestamp = self.timestamp.wrapping_add(n as Timestamp);
            return n;
        }

        let offset = gap.unsigned_abs() as usize;
        let available = (rtp.duration as usize).saturating_sub(offset);
        let n = available.min(wanted);
        let chunk = &mut out[..n * channels];
        let decoded = self.decoder.decode(&rtp.payload, offset, chunk).min(n);
        if decoded < n {
            chunk[decoded * channels..].fill(0.0);
        }
        if decoded > 0 {
            flags.insert(FrameFlags::NONBLANK);
        }
        self.stats.samples_decoded += decoded as u64;

        let finished = offset + n >= rtp.duration as usize;
        self.timestamp = self.timestamp.wrapping_add(n as Timestamp);
        if finished {
            self.packet = None;
        }
        n
    }
}

impl<R: PacketReader> AudioReader for Depacketizer<R> {
    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        let channels = self.spec.num_channels().max(1);
        let mut flags = FrameFlags::empty();

        let samples = frame.samples_mut();
        let usable = samples.len() / channels * channels;
        samples[usable..].fill(0.0);

        let mut pos = 0;
        while pos < usable {
            let n = self.fill(&mut samples[pos..usable], &mut flags);
            pos += n * channels;
        }

        frame.set_flags(flags);
        true
    }
}
