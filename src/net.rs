/// UDP receiving endpoints
///
/// Each endpoint owns one socket, parses datagrams as source or repair
/// packets and routes them into a session group until cancelled.

use anyhow::{Context, Result};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::packet::Udp;
use crate::pipeline::{EndpointType, PacketParser, SessionGroup};

const MAX_DATAGRAM: usize = 2048;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointStats {
    pub received: u64,
    pub malformed: u64,
    pub routed: u64,
    pub dropped: u64,
}

pub struct Endpoint {
    socket: UdpSocket,
    parser: PacketParser,
    stats: EndpointStats,
}

impl Endpoint {
    /// Bind to `addr` (port 0 picks a free port)
    pub async fn bind(addr: SocketAddr, parser: PacketParser) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .context(format!("Failed to bind {} socket on {}", parser.endpoint(), addr))?;
        debug!("{} endpoint bound to {}", parser.endpoint(), addr);
        Ok(Self::from_socket(socket, parser))
    }

    /// Create from an already-bound socket
    pub fn from_socket(socket: UdpSocket, parser: PacketParser) -> Self {
        Self {
            socket,
            parser,
            stats: EndpointStats::default(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn endpoint_type(&self) -> EndpointType {
        self.parser.endpoint()
    }

    pub fn stats(&self) -> EndpointStats {
        self.stats
    }

    /// Receive and route packets until `cancel_token` fires
    pub async fn run(&mut self, group: Arc<SessionGroup>, cancel_token: CancellationToken) -> Result<EndpointStats> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let local_addr = self.local_addr()?;
        let mut first_packet_logged = false;

        info!("{} endpoint listening on {}", self.endpoint_type(), local_addr);

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            tokio::select! {
                result = timeout(Duration::from_millis(100), self.socket.recv_from(&mut buf)) => {
                    match result {
                        Ok(Ok((len, src_addr))) => {
                            if !first_packet_logged {
                                info!("First {} packet received: {} bytes from {}", self.endpoint_type(), len, src_addr);
                                first_packet_logged = true;
                            }
                            self.process_datagram(&buf[..len], src_addr, local_addr, &group);
                        }
                        Ok(Err(e)) => {
                            warn!("{} receive error: {}", self.endpoint_type(), e);
                        }
                        Err(_) => {}
                    }
                }
                _ = cancel_token.cancelled() => {
                    debug!("{} endpoint cancelled by shutdown signal", self.endpoint_type());
                    break;
                }
            }
        }

        info!(
            "{} endpoint done: {} received, {} routed, {} malformed, {} dropped",
            self.endpoint_type(),
            self.stats.received,
            self.stats.routed,
            self.stats.malformed,
            self.stats.dropped
        );
        Ok(self.stats)
    }

    fn process_datagram(&mut self, data: &[u8], src_addr: SocketAddr, dst_addr: SocketAddr, group: &SessionGroup) {
        self.stats.received += 1;
        let udp = Udp { src_addr, dst_addr };
        let packet = match self.parser.parse(Bytes::copy_from_slice(data), Some(udp)) {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.malformed += 1;
                trace!("{} endpoint: dropping malformed packet from {}: {}", self.endpoint_type(), src_addr, e);
                return;
            }
        };
        if group.route(&packet) {
            self.stats.routed += 1;
        } else {
            self.stats.dropped += 1;
        }
    }
}
