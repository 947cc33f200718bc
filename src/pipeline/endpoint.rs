use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

use crate::error::ParseError;
use crate::fec::header::{parse_repair_header, parse_source_footer};
use crate::fec::FecScheme;
use crate::packet::{Packet, PacketFlags, PacketPtr, Udp};
use crate::rtp::{FormatMap, Parser};

/// Role of a receiving endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointType {
    /// Media packets, with an FEC footer when FEC is enabled
    Source,
    /// FEC repair packets
    Repair,
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointType::Source => write!(f, "source"),
            EndpointType::Repair => write!(f, "repair"),
        }
    }
}

/// Parses datagrams received on one endpoint into packets
#[derive(Debug, Clone)]
pub struct PacketParser {
    endpoint: EndpointType,
    fec_scheme: FecScheme,
    rtp: Parser,
}

impl PacketParser {
    pub fn new(endpoint: EndpointType, fec_scheme: FecScheme, format_map: Arc<FormatMap>) -> Self {
        Self {
            endpoint,
            fec_scheme,
            rtp: Parser::new(format_map),
        }
    }

    pub fn endpoint(&self) -> EndpointType {
        self.endpoint
    }

    pub fn parse(&self, data: Bytes, udp: Option<Udp>) -> Result<PacketPtr, ParseError> {
        let packet = match (self.endpoint, self.fec_scheme.is_enabled()) {
            (EndpointType::Source, false) => self.rtp.parse(data)?,
            (EndpointType::Source, true) => {
                let fec = parse_source_footer(&data)?;
                let rtp = self.rtp.parse_rtp(&fec.payload)?;
                Packet::new(PacketFlags::SOURCE, data).with_rtp(rtp).with_fec(fec)
            }
            (EndpointType::Repair, true) => {
                let fec = parse_repair_header(&data)?;
                Packet::new(PacketFlags::REPAIR, data).with_fec(fec)
            }
            (EndpointType::Repair, false) => {
                return Err(ParseError::BadPayloadId("repair packet with FEC disabled"))
            }
        };
        let packet = match udp {
            Some(udp) => packet.with_udp(udp),
            None => packet,
        };
        Ok(packet.into_ptr())
    }
}
