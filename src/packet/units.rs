/// Stream-position units and wraparound arithmetic
///
/// Sequence numbers, RTP timestamps and FEC block numbers are all modular
/// counters. Ordering between two values is decided by their signed distance
/// on the ring, never by raw subtraction.

/// RTP sequence number (wraps at 2^16)
pub type Seqnum = u16;

/// RTP timestamp in samples per channel (wraps at 2^32)
pub type Timestamp = u32;

/// FEC source block number (wraps at 2^16)
pub type Blknum = u16;

/// RTP synchronization source identifier
pub type SourceId = u32;

/// Signed duration in nanoseconds
pub type Nanoseconds = i64;

pub const MICROSECOND: Nanoseconds = 1_000;
pub const MILLISECOND: Nanoseconds = 1_000_000;
pub const SECOND: Nanoseconds = 1_000_000_000;

/// Signed distance from `b` to `a` on the seqnum ring
#[inline]
pub fn seqnum_diff(a: Seqnum, b: Seqnum) -> i16 {
    a.wrapping_sub(b) as i16
}

/// `a` comes strictly before `b`
#[inline]
pub fn seqnum_lt(a: Seqnum, b: Seqnum) -> bool {
    seqnum_diff(a, b) < 0
}

#[inline]
pub fn seqnum_le(a: Seqnum, b: Seqnum) -> bool {
    seqnum_diff(a, b) <= 0
}

/// Signed distance from `b` to `a` in samples
#[inline]
pub fn timestamp_diff(a: Timestamp, b: Timestamp) -> i32 {
    a.wrapping_sub(b) as i32
}

#[inline]
pub fn timestamp_lt(a: Timestamp, b: Timestamp) -> bool {
    timestamp_diff(a, b) < 0
}

#[inline]
pub fn timestamp_le(a: Timestamp, b: Timestamp) -> bool {
    timestamp_diff(a, b) <= 0
}

#[inline]
pub fn blknum_diff(a: Blknum, b: Blknum) -> i16 {
    a.wrapping_sub(b) as i16
}

#[inline]
pub fn blknum_lt(a: Blknum, b: Blknum) -> bool {
    blknum_diff(a, b) < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seqnum_wraparound() {
        assert_eq!(seqnum_diff(0, 65535), 1);
        assert_eq!(seqnum_diff(65535, 0), -1);
        assert!(seqnum_lt(65535, 0));
        assert!(!seqnum_lt(0, 65535));
        assert!(seqnum_le(10, 10));
    }

    #[test]
    fn test_seqnum_half_range() {
        // Exactly half the ring apart is ambiguous; i16 says "before"
        assert_eq!(seqnum_diff(0x8000, 0), i16::MIN);
        assert_eq!(seqnum_diff(0x7FFF, 0), i16::MAX);
    }

    #[test]
    fn test_timestamp_wraparound() {
        assert_eq!(timestamp_diff(100, u32::MAX - 99), 200);
        assert!(timestamp_lt(u32::MAX, 0));
        assert!(timestamp_le(5, 5));
    }

    #[test]
    fn test_blknum_ordering() {
        assert!(blknum_lt(65535, 1));
        assert_eq!(blknum_diff(3, 1), 2);
    }
}


/// Kani formal verification proofs
/// Run with: cargo kani --tests
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /// Proves: seqnum_diff never panics and is exact for short forward steps
    #[kani::proof]
    fn seqnum_diff_forward_exact() {
        let a: u16 = kani::any();
        let n: u16 = kani::any();
        kani::assume(n < 0x8000);
        let d = seqnum_diff(a.wrapping_add(n), a);
        kani::assert(d as i32 == n as i32, "forward step must be exact");
    }

    /// Proves: a packet is never before itself
    #[kani::proof]
    fn seqnum_irreflexive() {
        let a: u16 = kani::any();
        kani::assert(!seqnum_lt(a, a), "seqnum_lt must be irreflexive");
    }

    /// Proves: timestamp_diff is antisymmetric away from the half-ring point
    #[kani::proof]
    fn timestamp_diff_antisymmetric() {
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        kani::assume(a.wrapping_sub(b) != 0x8000_0000);
        kani::assert(
            timestamp_diff(a, b) == -timestamp_diff(b, a),
            "timestamp_diff must be antisymmetric",
        );
    }
}
