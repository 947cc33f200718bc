/// RTP stream validator
///
/// Enforces stream identity and continuity between consecutive packets:
/// the configured payload type, same SSRC, bounded seqnum and timestamp
/// jumps.
///
/// Identity drift is handled by two policies:
/// - a run of `resync_after` jump-rejected packets from the established SSRC
///   that are continuous among themselves means the sender reset its
///   counters; the validator adopts the new position and bumps its
///   generation so downstream stages re-anchor.
/// - a run of `max_foreign_packets` packets from another SSRC means a
///   different sender took over; the validator reports itself broken and the
///   owning session terminates.
///
/// Setting either threshold to 0 disables that policy.

use std::fmt;
use tracing::{debug, info, warn};

use crate::packet::{
    seqnum_diff, timestamp_diff, Nanoseconds, PacketPtr, PacketReader, Rtp, SourceId, SECOND,
};

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Maximum allowed seqnum distance between consecutive packets
    pub max_sn_jump: usize,
    /// Maximum allowed timestamp distance between consecutive packets
    pub max_ts_jump: Nanoseconds,
    /// Consecutive mutually-continuous jump rejects before resynchronizing
    pub resync_after: usize,
    /// Consecutive foreign-SSRC packets before the stream is declared broken
    pub max_foreign_packets: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_sn_jump: 100,
            max_ts_jump: SECOND,
            resync_after: 8,
            max_foreign_packets: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotRtp,
    SourceId { expected: SourceId, actual: SourceId },
    PayloadType { expected: u8, actual: u8 },
    SeqnumJump(i32),
    TimestampJump(i64),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotRtp => write!(f, "not an RTP packet"),
            RejectReason::SourceId { expected, actual } => {
                write!(f, "source id changed: expected={} actual={}", expected, actual)
            }
            RejectReason::PayloadType { expected, actual } => {
                write!(f, "unexpected payload type: expected={} actual={}", expected, actual)
            }
            RejectReason::SeqnumJump(jump) => write!(f, "too long seqnum jump: {}", jump),
            RejectReason::TimestampJump(jump) => write!(f, "too long timestamp jump: {}", jump),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Accept,
    Reject(RejectReason),
}

/// Validator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatorStats {
    pub accepted: u64,
    pub rejected: u64,
    pub resyncs: u64,
}

pub struct Validator<R> {
    reader: R,
    config: ValidatorConfig,
    payload_type: u8,
    max_ts_jump: u32,
    /// Last accepted packet defines the expected position
    prev: Option<PacketPtr>,
    /// Last jump-rejected packet, start of a possible resync run
    candidate: Option<PacketPtr>,
    jump_run: usize,
    foreign_run: usize,
    broken: bool,
    stats: ValidatorStats,
}

impl<R> Validator<R> {
    /// Accept only `payload_type` packets; `sample_rate` scales `max_ts_jump`
    pub fn new(reader: R, config: ValidatorConfig, payload_type: u8, sample_rate: u32) -> Self {
        let max_ts_jump = (config.max_ts_jump.max(0) as i128 * sample_rate as i128
            / SECOND as i128)
            .min(u32::MAX as i128) as u32;
        Self {
            reader,
            config,
            payload_type,
            max_ts_jump,
            prev: None,
            candidate: None,
            jump_run: 0,
            foreign_run: 0,
            broken: false,
            stats: ValidatorStats::default(),
        }
    }

    /// A different sender has persistently taken over the stream
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn stats(&self) -> ValidatorStats {
        self.stats
    }

    pub fn validate(&mut self, packet: &PacketPtr) -> Validation {
        let result = self.check(packet);
        match result {
            Validation::Accept => self.stats.accepted += 1,
            Validation::Reject(_) => self.stats.rejected += 1,
        }
        result
    }

    fn check(&mut self, packet: &PacketPtr) -> Validation {
        let Some(rtp) = packet.rtp() else {
            return Validation::Reject(RejectReason::NotRtp);
        };

        let Some(prev) = self.prev.clone() else {
            if let Some(reason) = self.check_payload_type(rtp) {
                return Validation::Reject(reason);
            }
            self.prev = Some(packet.clone());
            return Validation::Accept;
        };
        let Some(prev_rtp) = prev.rtp() else {
            return Validation::Reject(RejectReason::NotRtp);
        };

        if rtp.source_id != prev_rtp.source_id {
            self.foreign_run += 1;
            if self.config.max_foreign_packets > 0
                && self.foreign_run >= self.config.max_foreign_packets
                && !self.broken
            {
                warn!(
                    "rtp validator: {} consecutive packets from foreign source {}, stream broken",
                    self.foreign_run, rtp.source_id
                );
                self.broken = true;
            }
            return Validation::Reject(RejectReason::SourceId {
                expected: prev_rtp.source_id,
                actual: rtp.source_id,
            });
        }
        self.foreign_run = 0;

        if let Some(reason) = self.check_payload_type(rtp) {
            return Validation::Reject(reason);
        }

        let Some(reason) = self.check_jump(prev_rtp, rtp) else {
            self.jump_run = 0;
            self.candidate = None;
            if prev.compare(packet).is_lt() {
                self.prev = Some(packet.clone());
            }
            return Validation::Accept;
        };

        let continues_run = self
            .candidate
            .as_ref()
            .and_then(|c| c.rtp())
            .map(|c| self.check_jump(c, rtp).is_none())
            .unwrap_or(false);
        self.jump_run = if continues_run { self.jump_run + 1 } else { 1 };
        self.candidate = Some(packet.clone());

        if self.config.resync_after > 0 && self.jump_run >= self.config.resync_after {
            info!(
                "rtp validator: resynchronized after {} packets, seqnum={} timestamp={}",
                self.jump_run, rtp.seqnum, rtp.timestamp
            );
            self.prev = Some(packet.clone());
            self.candidate = None;
            self.jump_run = 0;
            self.stats.resyncs += 1;
            return Validation::Accept;
        }

        Validation::Reject(reason)
    }

    fn check_payload_type(&self, rtp: &Rtp) -> Option<RejectReason> {
        (rtp.payload_type != self.payload_type).then_some(RejectReason::PayloadType {
            expected: self.payload_type,
            actual: rtp.payload_type,
        })
    }

    fn check_jump(&self, prev: &Rtp, next: &Rtp) -> Option<RejectReason> {
        let sn_jump = seqnum_diff(next.seqnum, prev.seqnum) as i32;
        if sn_jump.unsigned_abs() as usize > self.config.max_sn_jump {
            return Some(RejectReason::SeqnumJump(sn_jump));
        }
        let ts_jump = timestamp_diff(next.timestamp, prev.timestamp) as i64;
        if ts_jump.unsigned_abs() > self.max_ts_jump as u64 {
            return Some(RejectReason::TimestampJump(ts_jump));
        }
        None
    }
}

impl<R: PacketReader> Validator<R> {
    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: PacketReader> PacketReader for Validator<R> {
    fn generation(&self) -> u64 {
        self.stats.resyncs
    }

    fn read(&mut self) -> Option<PacketPtr> {
        loop {
            let packet = self.reader.read()?;
            match self.validate(&packet) {
                Validation::Accept => return Some(packet),
                Validation::Reject(reason) => {
                    debug!("rtp validator: dropping packet: {}", reason);
                }
            }
        }
    }
}
