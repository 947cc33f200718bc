/// Receiver pipeline
///
/// Wires the packet and audio stages into sessions, groups sessions per
/// endpoint and pumps the mixed output into a sink.

pub mod config;
pub mod endpoint;
pub mod group;
pub mod pump;
pub mod session;

pub use config::{CommonConfig, SessionConfig};
pub use endpoint::{EndpointType, PacketParser};
pub use group::{GroupReader, SessionGroup};
pub use pump::{Pump, PumpMode, PumpStats, Source};
pub use session::{ReceiverSession, SessionReader, SessionState, SessionStats, TerminationReason};
