/// RTP fixed header parsing and composition (RFC 3550, version 2)
///
/// The parser checks every length field against the buffer before using it:
/// CSRC count, extension length and padding can all claim more bytes than
/// the datagram holds.

use crate::error::ParseError;
use crate::packet::{Seqnum, SourceId, Timestamp};

pub const RTP_VERSION: u8 = 2;
pub const RTP_HEADER_LEN: usize = 12;

/// Decoded RTP header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtpHeader {
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: Seqnum,
    pub timestamp: Timestamp,
    pub ssrc: SourceId,
}

/// Location of the payload inside a parsed datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadRange {
    pub offset: usize,
    pub len: usize,
}

/// Parse an RTP header and locate the payload
pub fn parse_rtp_header(data: &[u8]) -> Result<(RtpHeader, PayloadRange), ParseError> {
    if data.len() < RTP_HEADER_LEN {
        return Err(ParseError::TooShort(data.len()));
    }

    let version = (data[0] >> 6) & 0x03;
    if version != RTP_VERSION {
        return Err(ParseError::BadVersion(version));
    }

    let header = RtpHeader {
        padding: (data[0] & 0x20) != 0,
        extension: (data[0] & 0x10) != 0,
        csrc_count: data[0] & 0x0F,
        marker: (data[1] & 0x80) != 0,
        payload_type: data[1] & 0x7F,
        sequence: u16::from_be_bytes([data[2], data[3]]),
        timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
        ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
    };

    let mut offset = RTP_HEADER_LEN + header.csrc_count as usize * 4;
    if offset > data.len() {
        return Err(ParseError::HeaderOverrun {
            needed: offset,
            len: data.len(),
        });
    }

    if header.extension {
        if offset + 4 > data.len() {
            return Err(ParseError::HeaderOverrun {
                needed: offset + 4,
                len: data.len(),
            });
        }
        let ext_words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
        offset += 4 + ext_words * 4;
        if offset > data.len() {
            return Err(ParseError::HeaderOverrun {
                needed: offset,
                len: data.len(),
            });
        }
    }

    let mut len = data.len() - offset;
    if header.padding {
        let padding = data[data.len() - 1] as usize;
        if padding == 0 || padding > len {
            return Err(ParseError::BadPadding { padding, len });
        }
        len -= padding;
    }

    Ok((header, PayloadRange { offset, len }))
}

/// Append a minimal RTP header (no CSRCs, no extension, no padding)
pub fn compose_rtp_header(header: &RtpHeader, out: &mut Vec<u8>) {
    out.push(RTP_VERSION << 6);
    out.push(((header.marker as u8) << 7) | (header.payload_type & 0x7F));
    out.extend_from_slice(&header.sequence.to_be_bytes());
    out.extend_from_slice(&header.timestamp.to_be_bytes());
    out.extend_from_slice(&header.ssrc.to_be_bytes());
}

/// Compose a full RTP packet
pub fn compose_rtp(header: &RtpHeader, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RTP_HEADER_LEN + payload.len());
    compose_rtp_header(header, &mut out);
    out.extend_from_slice(payload);
    out
}
