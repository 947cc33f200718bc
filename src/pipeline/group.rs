use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::{CommonConfig, SessionConfig};
use super::pump::Source;
use super::session::ReceiverSession;
use crate::audio::{AudioReader, Frame, FrameFlags, Sample, SampleSpec};
use crate::packet::{Nanoseconds, PacketFlags, PacketPtr};
use crate::rtp::FormatMap;

/// Set of sessions fed from one receiving endpoint pair
///
/// Packets from an unknown sender open a new session; terminated sessions
/// are dropped on the next `update`.
pub struct SessionGroup {
    session_config: SessionConfig,
    common_config: CommonConfig,
    format_map: Arc<FormatMap>,
    sessions: Mutex<Vec<Arc<ReceiverSession>>>,
}

impl SessionGroup {
    pub fn new(
        session_config: SessionConfig,
        common_config: CommonConfig,
        format_map: Arc<FormatMap>,
    ) -> Self {
        Self {
            session_config,
            common_config,
            format_map,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn output_spec(&self) -> SampleSpec {
        self.common_config.output_spec()
    }

    pub fn common_config(&self) -> &CommonConfig {
        &self.common_config
    }

    /// Offer a packet to the live sessions, creating one for a new sender
    pub fn route(&self, packet: &PacketPtr) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.iter().any(|s| s.handle(packet)) {
            return true;
        }

        if !packet.has_flags(PacketFlags::SOURCE) {
            debug!("session group: no session for repair packet, dropping");
            return false;
        }
        let Some(src_address) = packet.udp().map(|u| u.src_addr) else {
            debug!("session group: packet without source address, dropping");
            return false;
        };

        let max = self.common_config.max_sessions;
        if max > 0 && sessions.len() >= max {
            warn!(
                "session group: session limit reached ({}), dropping packet from {}",
                max, src_address
            );
            return false;
        }

        let session = self.create_session(src_address);
        if !session.is_valid() {
            return false;
        }
        let accepted = session.handle(packet);
        sessions.push(session);
        info!("session group: {} active session(s)", sessions.len());
        accepted
    }

    fn create_session(&self, src_address: SocketAddr) -> Arc<ReceiverSession> {
        Arc::new(ReceiverSession::new(
            &self.session_config,
            &self.common_config,
            src_address,
            &self.format_map,
        ))
    }

    /// Run housekeeping on every session, dropping the ones that ended
    pub fn update(&self, time: Nanoseconds) {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|s| s.update(time));
        if sessions.len() != before {
            info!(
                "session group: removed {} session(s), {} remaining",
                before - sessions.len(),
                sessions.len()
            );
        }
    }

    pub fn sessions(&self) -> Vec<Arc<ReceiverSession>> {
        self.sessions.lock().clone()
    }

    pub fn num_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn reader(self: &Arc<Self>) -> GroupReader {
        GroupReader::new(Arc::clone(self))
    }
}

/// Mixes every live session into the output frame
///
/// Silence when there is no session. The reader keeps its own clock in
/// output samples and runs `SessionGroup::update` after every frame.
pub struct GroupReader {
    group: Arc<SessionGroup>,
    spec: SampleSpec,
    active: Vec<Arc<ReceiverSession>>,
    scratch: Vec<Sample>,
    /// Output samples per channel produced so far
    position: i64,
}

impl GroupReader {
    pub fn new(group: Arc<SessionGroup>) -> Self {
        let spec = group.output_spec();
        let frame_size = group.common_config().frame_size();
        let max_sessions = group.common_config().max_sessions;
        Self {
            group,
            spec,
            active: Vec::with_capacity(max_sessions),
            scratch: vec![0.0; frame_size],
            position: 0,
        }
    }

    pub fn group(&self) -> &Arc<SessionGroup> {
        &self.group
    }

    pub fn time(&self) -> Nanoseconds {
        self.spec.samples_to_ns(self.position)
    }
}

impl AudioReader for GroupReader {
    fn read(&mut self, frame: &mut Frame<'_>) -> bool {
        self.active.clear();
        self.active.extend(self.group.sessions.lock().iter().cloned());

        let len = frame.len();
        if self.scratch.len() < len {
            self.scratch.resize(len, 0.0);
        }

        frame.samples_mut().fill(0.0);
        let mut flags = FrameFlags::empty();
        for session in &self.active {
            let mut part = Frame::new(&mut self.scratch[..len]);
            if !session.read(&mut part) {
                continue;
            }
            flags.insert(part.flags());
            for (out, &s) in frame.samples_mut().iter_mut().zip(part.samples()) {
                *out += s;
            }
        }
        if self.active.len() > 1 {
            for s in frame.samples_mut() {
                *s = s.clamp(-1.0, 1.0);
            }
        }
        frame.set_flags(flags);

        self.position += (len / self.spec.num_channels().max(1)) as i64;
        self.group.update(self.time());
        true
    }
}

impl Source for GroupReader {
    fn is_playing(&self) -> bool {
        self.group.num_sessions() > 0
    }
}
