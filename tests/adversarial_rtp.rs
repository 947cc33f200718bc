//! Adversarial Property-Based Tests for RTP Packet Handling
//!
//! # Attack Plan
//!
//! 1. **Malformed RTP Headers**: Truncated packets, wrong version, CSRC counts
//!    and extension lengths pointing past the end of the datagram.
//!
//! 2. **Padding Abuse**: Padding byte of zero or larger than the payload.
//!
//! 3. **Sequence Number Wraparound**: 65535 -> 0 transition must keep stream
//!    order in the sorted queue.
//!
//! 4. **Reordering Storms**: Arbitrary permutations with duplicates; the
//!    queue must release packets in order and absorb every duplicate.
//!
//! 5. **Memory Exhaustion**: Floods into a bounded queue.
//!
//! 6. **Stream Identity Attacks**: Seqnum and timestamp jumps, foreign SSRCs
//!    injected into an established stream.
//!
//! # Invariants
//!
//! - parse_rtp_header and Parser::parse never panic on any input
//! - parse_rtp_header rejects non-v2 packets
//! - The payload range always lies inside the datagram
//! - Sorted queue output is non-decreasing by modular seqnum
//! - Duplicates are absorbed (first write wins)
//! - A bounded queue never exceeds max_size
//! - Validator rejects seqnum jumps above max_sn_jump

use bytes::Bytes;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;

use netaudio::packet::{seqnum_diff, Packet, PacketFlags, PacketPtr, Rtp, SortedQueue};
use netaudio::rtp::header::{compose_rtp, parse_rtp_header, RtpHeader};
use netaudio::rtp::validator::RejectReason;
use netaudio::rtp::{FormatMap, Parser, Validation, Validator, ValidatorConfig};
use netaudio::ParseError;

// ============================================================================
// ADVERSARIAL GENERATORS
// ============================================================================

/// Generate malformed RTP packets
fn malformed_rtp_packet() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        // Too short
        Just(vec![]),
        Just(vec![0x80]),
        Just(vec![0x80, 0x00, 0x00, 0x01]),
        Just(vec![0x80, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00]), // 11 bytes
        // Wrong version (0, 1, 3)
        Just(vec![0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01]),
        Just(vec![0x40, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01]),
        Just(vec![0xC0, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01]),
        // Max CSRC count (15) but no CSRC data
        Just(vec![0x8F, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01]),
        // Extension bit set but no extension data
        Just(vec![0x90, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01]),
        // Extension claiming 65535 words
        Just(vec![
            0x90, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01,
            0xBE, 0xDE, 0xFF, 0xFF, 0x00,
        ]),
        // Padding bit with zero padding length
        Just(vec![0xA0, 0x0A, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01, 0xAA, 0x00]),
        // Padding longer than the payload
        Just(vec![0xA0, 0x0A, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01, 0xAA, 0x7F]),
        // Random junk with a valid version
        proptest::collection::vec(any::<u8>(), 12..64).prop_map(|mut v| {
            v[0] = (v[0] & 0x3F) | 0x80;
            v
        }),
    ]
}

/// Arrival order: a permutation of a contiguous run plus some duplicates
fn shuffled_stream() -> impl Strategy<Value = (u16, Vec<u16>)> {
    (any::<u16>(), 1usize..60).prop_flat_map(|(start, len)| {
        let offsets: Vec<u16> = (0..len as u16).collect();
        (
            Just(start),
            Just(offsets).prop_shuffle(),
            proptest::collection::vec(0..len as u16, 0..10),
        )
            .prop_map(|(start, mut offsets, dups)| {
                offsets.extend(dups);
                (start, offsets.into_iter().map(|o| start.wrapping_add(o)).collect())
            })
    })
}

fn make_packet(seqnum: u16) -> PacketPtr {
    make_stream_packet(1, seqnum, seqnum as u32 * 160)
}

fn make_stream_packet(ssrc: u32, seqnum: u16, timestamp: u32) -> PacketPtr {
    Packet::new(PacketFlags::SOURCE, Bytes::new())
        .with_rtp(Rtp {
            source_id: ssrc,
            seqnum,
            timestamp,
            duration: 160,
            marker: false,
            payload_type: 0,
            payload: Bytes::new(),
        })
        .into_ptr()
}

// ============================================================================
// INVARIANT: PARSERS NEVER PANIC
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10000))]

    #[test]
    fn prop_parse_rtp_header_never_panics(data in proptest::collection::vec(any::<u8>(), 0..200)) {
        if let Ok((_, range)) = parse_rtp_header(&data) {
            prop_assert!(range.offset + range.len <= data.len());
        }
    }

    #[test]
    fn prop_parse_rtp_header_malformed(data in malformed_rtp_packet()) {
        let _ = parse_rtp_header(&data);
    }

    #[test]
    fn prop_parser_never_panics(data in proptest::collection::vec(any::<u8>(), 0..200)) {
        let parser = Parser::new(Arc::new(FormatMap::default()));
        if let Ok(packet) = parser.parse(Bytes::from(data.clone())) {
            let rtp = packet.rtp().unwrap();
            prop_assert!(rtp.payload.len() <= data.len());
        }
    }
}

// ============================================================================
// INVARIANT: VERSION CHECK
// ============================================================================

#[test]
fn test_rejects_all_non_v2_versions() {
    for version in [0u8, 1, 3] {
        let mut packet = [0x80, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01];
        packet[0] = version << 6;
        assert_eq!(
            parse_rtp_header(&packet),
            Err(ParseError::BadVersion(version)),
            "Version {} should be rejected",
            version
        );
    }
}

#[test]
fn test_accepts_v2() {
    let packet = [0x80, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01];
    assert!(parse_rtp_header(&packet).is_ok());
}

// ============================================================================
// INVARIANT: PAYLOAD OFFSET CALCULATION
// ============================================================================

#[test]
fn test_csrc_offset_calculation() {
    let packet = [0x80, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01];
    let (_, range) = parse_rtp_header(&packet).unwrap();
    assert_eq!(range.offset, 12);
    assert_eq!(range.len, 0);

    // CC=15 (max) -> offset=72
    let mut big_packet = vec![0x8F, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01];
    big_packet.extend(vec![0u8; 60]);
    big_packet.push(0xAA);
    let (header, range) = parse_rtp_header(&big_packet).unwrap();
    assert_eq!(header.csrc_count, 15);
    assert_eq!(range.offset, 12 + 15 * 4);
    assert_eq!(range.len, 1);
}

#[test]
fn test_extension_offset_calculation() {
    let packet = [
        0x90, 0x00, // V=2, X=1, CC=0
        0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01,
        0xBE, 0xDE, // Extension ID
        0x00, 0x01, // Extension length = 1 (4 bytes)
        0x00, 0x00, 0x00, 0x00, // Extension data
        0xAA, // Payload
    ];
    let (_, range) = parse_rtp_header(&packet).unwrap();
    assert_eq!(range.offset, 12 + 4 + 4);
    assert_eq!(range.len, 1);
}

#[test]
fn test_extension_length_overflow_rejected() {
    let packet = vec![
        0x90, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01,
        0xBE, 0xDE, 0xFF, 0xFF, // 65535 words
        0x00,
    ];
    assert!(matches!(
        parse_rtp_header(&packet),
        Err(ParseError::HeaderOverrun { .. })
    ));
}

#[test]
fn test_padding_removed_from_payload() {
    let header = RtpHeader {
        payload_type: 10,
        ..Default::default()
    };
    let mut data = compose_rtp(&header, &[1, 2, 3, 4, 0, 0, 0, 4]);
    data[0] |= 0x20;
    let (_, range) = parse_rtp_header(&data).unwrap();
    assert_eq!(range.len, 4);
}

// ============================================================================
// SORTED QUEUE: ORDERING
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn prop_sorted_queue_orders_any_arrival((start, arrivals) in shuffled_stream()) {
        let mut queue = SortedQueue::new(0);
        let mut accepted = 0usize;
        for &seqnum in &arrivals {
            if queue.write(make_packet(seqnum)) {
                accepted += 1;
            }
        }

        let mut out = Vec::new();
        while let Some(packet) = queue.read() {
            out.push(packet.rtp().unwrap().seqnum);
        }

        // Every distinct seqnum once, duplicates absorbed
        prop_assert_eq!(out.len(), accepted);
        prop_assert_eq!(queue.stats().packets_duplicate as usize, arrivals.len() - accepted);
        prop_assert_eq!(out.first().copied(), Some(start));
        for pair in out.windows(2) {
            prop_assert_eq!(seqnum_diff(pair[1], pair[0]), 1);
        }
    }

    #[test]
    fn prop_sorted_queue_bounded(seqnums in proptest::collection::vec(any::<u16>(), 0..500), max in 1usize..64) {
        let mut queue = SortedQueue::new(max);
        for seqnum in seqnums {
            queue.write(make_packet(seqnum));
            prop_assert!(queue.len() <= max);
        }
    }
}

#[test]
fn test_sorted_queue_wraparound() {
    let mut queue = SortedQueue::new(0);
    for seqnum in [1u16, 65534, 0, 65535] {
        queue.write(make_packet(seqnum));
    }
    let order: Vec<u16> = std::iter::from_fn(|| queue.read())
        .map(|p| p.rtp().unwrap().seqnum)
        .collect();
    assert_eq!(order, vec![65534, 65535, 0, 1]);
}

#[test]
fn test_sorted_queue_first_write_wins() {
    let mut queue = SortedQueue::new(0);
    let first = make_stream_packet(1, 10, 1600);
    let second = make_stream_packet(2, 10, 9999);
    assert!(queue.write(first));
    assert!(!queue.write(second));
    assert_eq!(queue.read().unwrap().rtp().unwrap().source_id, 1);
}

// ============================================================================
// VALIDATOR: STREAM IDENTITY
// ============================================================================

fn validator() -> Validator<VecDeque<PacketPtr>> {
    Validator::new(VecDeque::new(), ValidatorConfig::default(), 0, 8000)
}

#[test]
fn test_validator_rejects_seqnum_jump() {
    let mut v = validator();
    assert_eq!(v.validate(&make_stream_packet(1, 100, 16000)), Validation::Accept);
    assert_eq!(v.validate(&make_stream_packet(1, 101, 16160)), Validation::Accept);
    assert_eq!(v.validate(&make_stream_packet(1, 200, 16320)), Validation::Accept);
    assert_eq!(
        v.validate(&make_stream_packet(1, 400, 16480)),
        Validation::Reject(RejectReason::SeqnumJump(200))
    );
    assert_eq!(v.stats().rejected, 1);
}

#[test]
fn test_validator_rejects_timestamp_jump() {
    let mut v = validator();
    v.validate(&make_stream_packet(1, 1, 0));
    // Two seconds at 8 kHz
    assert!(matches!(
        v.validate(&make_stream_packet(1, 2, 16000)),
        Validation::Reject(RejectReason::TimestampJump(_))
    ));
}

#[test]
fn test_validator_foreign_source_breaks_stream() {
    let mut v = validator();
    v.validate(&make_stream_packet(1, 1, 0));
    for i in 0..50u16 {
        assert!(matches!(
            v.validate(&make_stream_packet(2, 2 + i, 160 * (i as u32 + 1))),
            Validation::Reject(RejectReason::SourceId { .. })
        ));
    }
    assert!(v.is_broken());
}

#[test]
fn test_validator_resyncs_after_continuous_run() {
    let mut v = validator();
    v.validate(&make_stream_packet(1, 0, 0));
    let mut last = Validation::Accept;
    for i in 0..8u16 {
        last = v.validate(&make_stream_packet(1, 5000 + i, 160 * i as u32));
    }
    assert_eq!(last, Validation::Accept);
    assert_eq!(v.stats().resyncs, 1);
    assert_eq!(v.validate(&make_stream_packet(1, 5008, 160 * 8)), Validation::Accept);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn prop_validator_never_panics(
        packets in proptest::collection::vec((0u32..3, any::<u16>(), any::<u32>()), 0..100)
    ) {
        let mut v = validator();
        for (ssrc, seqnum, ts) in packets {
            let _ = v.validate(&make_stream_packet(ssrc, seqnum, ts));
        }
        let stats = v.stats();
        prop_assert!(stats.accepted + stats.rejected <= 100);
    }
}
