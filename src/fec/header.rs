/// FEC payload ID wire format
///
/// Source packets carry a 6-byte footer after the RTP bytes:
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     source block number       |     encoding symbol id        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   source block length (k)     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Repair packets start with an 8-byte header (the same three fields plus
/// the block length `n`) followed by the repair symbol. All fields are big
/// endian.

use bytes::Bytes;

use crate::error::ParseError;
use crate::packet::{Blknum, Fec};

pub const SOURCE_FOOTER_LEN: usize = 6;
pub const REPAIR_HEADER_LEN: usize = 8;

/// Split a source datagram into its RTP bytes and FEC payload ID
///
/// The returned `Fec::payload` is the encoding symbol, i.e. the RTP bytes.
pub fn parse_source_footer(data: &Bytes) -> Result<Fec, ParseError> {
    if data.len() < SOURCE_FOOTER_LEN {
        return Err(ParseError::TooShort(data.len()));
    }
    let split = data.len() - SOURCE_FOOTER_LEN;
    let footer = &data[split..];
    let sbn = u16::from_be_bytes([footer[0], footer[1]]);
    let esi = u16::from_be_bytes([footer[2], footer[3]]);
    let k = u16::from_be_bytes([footer[4], footer[5]]);

    if k == 0 {
        return Err(ParseError::BadPayloadId("zero source block length"));
    }
    if esi >= k {
        return Err(ParseError::BadPayloadId("source symbol id out of block"));
    }

    Ok(Fec {
        source_block_number: sbn,
        encoding_symbol_id: esi,
        source_block_length: k,
        block_length: 0,
        payload: data.slice(..split),
    })
}

pub fn parse_repair_header(data: &Bytes) -> Result<Fec, ParseError> {
    if data.len() < REPAIR_HEADER_LEN {
        return Err(ParseError::TooShort(data.len()));
    }
    let sbn = u16::from_be_bytes([data[0], data[1]]);
    let esi = u16::from_be_bytes([data[2], data[3]]);
    let k = u16::from_be_bytes([data[4], data[5]]);
    let n = u16::from_be_bytes([data[6], data[7]]);

    if k == 0 || n <= k {
        return Err(ParseError::BadPayloadId("inconsistent block layout"));
    }
    if esi < k || esi >= n {
        return Err(ParseError::BadPayloadId("repair symbol id out of block"));
    }

    Ok(Fec {
        source_block_number: sbn,
        encoding_symbol_id: esi,
        source_block_length: k,
        block_length: n,
        payload: data.slice(REPAIR_HEADER_LEN..),
    })
}

/// Append the source footer to RTP bytes
pub fn compose_source(rtp: &[u8], sbn: Blknum, esi: u16, k: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(rtp.len() + SOURCE_FOOTER_LEN);
    out.extend_from_slice(rtp);
    out.extend_from_slice(&sbn.to_be_bytes());
    out.extend_from_slice(&esi.to_be_bytes());
    out.extend_from_slice(&k.to_be_bytes());
    out
}

pub fn compose_repair(sbn: Blknum, esi: u16, k: u16, n: u16, symbol: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(REPAIR_HEADER_LEN + symbol.len());
    out.extend_from_slice(&sbn.to_be_bytes());
    out.extend_from_slice(&esi.to_be_bytes());
    out.extend_from_slice(&k.to_be_bytes());
    out.extend_from_slice(&n.to_be_bytes());
    out.extend_from_slice(symbol);
    out
}
