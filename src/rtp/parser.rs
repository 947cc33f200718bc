use bytes::Bytes;
use std::sync::Arc;

use super::format::FormatMap;
use super::header::parse_rtp_header;
use crate::error::ParseError;
use crate::packet::{Packet, PacketFlags, Rtp};

/// Turns RTP datagrams into source packets
///
/// The payload is a zero-copy slice of the datagram. Duration is looked up
/// through the format map; unknown payload types parse with duration 0 and
/// are left for the validator and depacketizer to refuse.
#[derive(Debug, Clone)]
pub struct Parser {
    format_map: Arc<FormatMap>,
}

impl Parser {
    pub fn new(format_map: Arc<FormatMap>) -> Self {
        Self { format_map }
    }

    pub fn parse(&self, data: Bytes) -> Result<Packet, ParseError> {
        let rtp = self.parse_rtp(&data)?;
        Ok(Packet::new(PacketFlags::SOURCE, data).with_rtp(rtp))
    }

    /// Parse RTP fields from `data` without building a packet
    pub fn parse_rtp(&self, data: &Bytes) -> Result<Rtp, ParseError> {
        let (header, range) = parse_rtp_header(data)?;
        let payload = data.slice(range.offset..range.offset + range.len);
        let duration = self
            .format_map
            .find(header.payload_type)
            .map(|format| format.duration(payload.len()))
            .unwrap_or(0);

        Ok(Rtp {
            source_id: header.ssrc,
            seqnum: header.sequence,
            timestamp: header.timestamp,
            duration,
            marker: header.marker,
            payload_type: header.payload_type,
            payload,
        })
    }
}
