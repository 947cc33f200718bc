use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;
use std::net::SocketAddr;
use std::ops::BitOr;
use std::sync::Arc;

use super::units::{blknum_diff, seqnum_diff, Blknum, Seqnum, SourceId, Timestamp};

/// Shared, immutable packet handle
///
/// A packet is frozen once parsed; queues, the FEC reader and the
/// depacketizer hold clones of the same `Arc` until it is fully consumed.
pub type PacketPtr = Arc<Packet>;

/// Packet role and provenance flags
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PacketFlags(u8);

impl PacketFlags {
    /// Carries media (possibly with an FEC source footer)
    pub const SOURCE: Self = Self(1 << 0);
    /// Carries an FEC repair symbol
    pub const REPAIR: Self = Self(1 << 1);
    /// Control traffic (never routed into a media queue)
    pub const CONTROL: Self = Self(1 << 2);
    /// Reconstructed by the FEC reader
    pub const RESTORED: Self = Self(1 << 3);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PacketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for PacketFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::SOURCE, "SOURCE"),
            (Self::REPAIR, "REPAIR"),
            (Self::CONTROL, "CONTROL"),
            (Self::RESTORED, "RESTORED"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "PacketFlags({})", set.join("|"))
    }
}

/// Transport addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Udp {
    pub src_addr: SocketAddr,
    pub dst_addr: SocketAddr,
}

/// Parsed RTP fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rtp {
    pub source_id: SourceId,
    pub seqnum: Seqnum,
    pub timestamp: Timestamp,
    /// Samples per channel carried by the payload (0 if the payload type is unknown)
    pub duration: Timestamp,
    pub marker: bool,
    pub payload_type: u8,
    pub payload: Bytes,
}

impl Rtp {
    /// Timestamp one past the last sample of this packet
    pub fn end(&self) -> Timestamp {
        self.timestamp.wrapping_add(self.duration)
    }
}

/// FEC payload ID and symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fec {
    pub source_block_number: Blknum,
    pub encoding_symbol_id: u16,
    /// Number of source symbols in the block (k)
    pub source_block_length: u16,
    /// Total symbols in the block (n); 0 when carried by a source packet
    pub block_length: u16,
    /// Encoding symbol: the RTP bytes of a source packet, or the repair symbol
    pub payload: Bytes,
}

/// A received (or restored) network packet
#[derive(Debug, Clone)]
pub struct Packet {
    flags: PacketFlags,
    udp: Option<Udp>,
    rtp: Option<Rtp>,
    fec: Option<Fec>,
    data: Bytes,
}

impl Packet {
    pub fn new(flags: PacketFlags, data: Bytes) -> Self {
        Self {
            flags,
            udp: None,
            rtp: None,
            fec: None,
            data,
        }
    }

    pub fn with_udp(mut self, udp: Udp) -> Self {
        self.udp = Some(udp);
        self
    }

    pub fn with_rtp(mut self, rtp: Rtp) -> Self {
        self.rtp = Some(rtp);
        self
    }

    pub fn with_fec(mut self, fec: Fec) -> Self {
        self.fec = Some(fec);
        self
    }

    pub fn with_flags(mut self, flags: PacketFlags) -> Self {
        self.flags = self.flags | flags;
        self
    }

    pub fn into_ptr(self) -> PacketPtr {
        Arc::new(self)
    }

    pub fn flags(&self) -> PacketFlags {
        self.flags
    }

    pub fn has_flags(&self, flags: PacketFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn udp(&self) -> Option<&Udp> {
        self.udp.as_ref()
    }

    pub fn rtp(&self) -> Option<&Rtp> {
        self.rtp.as_ref()
    }

    pub fn fec(&self) -> Option<&Fec> {
        self.fec.as_ref()
    }

    /// Whole datagram as received
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn source_id(&self) -> Option<SourceId> {
        self.rtp.as_ref().map(|rtp| rtp.source_id)
    }

    /// Stream order: RTP packets by modular seqnum, FEC-only packets by
    /// (modular block number, symbol id). Packets with neither compare equal.
    pub fn compare(&self, other: &Packet) -> Ordering {
        if let (Some(a), Some(b)) = (&self.rtp, &other.rtp) {
            return seqnum_diff(a.seqnum, b.seqnum).cmp(&0);
        }
        if let (Some(a), Some(b)) = (&self.fec, &other.fec) {
            return blknum_diff(a.source_block_number, b.source_block_number)
                .cmp(&0)
                .then(a.encoding_symbol_id.cmp(&b.encoding_symbol_id));
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rtp_packet(seqnum: Seqnum) -> Packet {
        Packet::new(PacketFlags::SOURCE, Bytes::new()).with_rtp(Rtp {
            source_id: 1,
            seqnum,
            timestamp: seqnum as u32 * 10,
            duration: 10,
            marker: false,
            payload_type: 10,
            payload: Bytes::new(),
        })
    }

    fn repair_packet(sbn: Blknum, esi: u16) -> Packet {
        Packet::new(PacketFlags::REPAIR, Bytes::new()).with_fec(Fec {
            source_block_number: sbn,
            encoding_symbol_id: esi,
            source_block_length: 4,
            block_length: 6,
            payload: Bytes::new(),
        })
    }

    #[test]
    fn test_flags() {
        let flags = PacketFlags::SOURCE | PacketFlags::RESTORED;
        assert!(flags.contains(PacketFlags::SOURCE));
        assert!(flags.contains(PacketFlags::RESTORED));
        assert!(!flags.contains(PacketFlags::REPAIR));
        assert!(PacketFlags::empty().is_empty());
        assert_eq!(format!("{:?}", flags), "PacketFlags(SOURCE|RESTORED)");
    }

    #[test]
    fn test_compare_rtp_wraparound() {
        assert_eq!(rtp_packet(65535).compare(&rtp_packet(0)), Ordering::Less);
        assert_eq!(rtp_packet(0).compare(&rtp_packet(65535)), Ordering::Greater);
        assert_eq!(rtp_packet(7).compare(&rtp_packet(7)), Ordering::Equal);
    }

    #[test]
    fn test_compare_repair_by_block_then_symbol() {
        assert_eq!(repair_packet(1, 5).compare(&repair_packet(2, 4)), Ordering::Less);
        assert_eq!(repair_packet(2, 5).compare(&repair_packet(2, 4)), Ordering::Greater);
        assert_eq!(repair_packet(65535, 4).compare(&repair_packet(0, 4)), Ordering::Less);
    }

    #[test]
    fn test_rtp_end_wraps() {
        let mut packet = rtp_packet(0);
        if let Some(rtp) = packet.rtp.as_mut() {
            rtp.timestamp = u32::MAX - 4;
        }
        assert_eq!(packet.rtp().map(|r| r.end()), Some(5));
    }
}
